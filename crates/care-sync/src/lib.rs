//! Keeps home-care interventions on a citizen's care pathway in step with the
//! calendar: stale grants are closed, and citizens without an active booking get
//! a cross-disciplinary follow-up task.

pub mod config;
pub mod error;
pub mod reference_data;
pub mod telemetry;
pub mod workflows;
