pub mod assignments;
pub mod queue;
