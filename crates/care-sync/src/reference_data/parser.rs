use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::io::Read;

#[derive(Debug, Deserialize)]
pub(crate) struct NameRow {
    #[serde(alias = "navn", deserialize_with = "trimmed")]
    pub(crate) name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlacementRow {
    #[serde(alias = "navn", deserialize_with = "trimmed")]
    pub(crate) placement: String,
    #[serde(alias = "ansvarlig_organisation", deserialize_with = "trimmed")]
    pub(crate) organization: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExcludedCitizenRow {
    #[serde(alias = "cpr", deserialize_with = "trimmed")]
    pub(crate) national_id: String,
}

/// Reads every row of a headed CSV export, skipping rows whose first field is blank.
pub(crate) fn parse_rows<T, R>(reader: R) -> Result<Vec<T>, csv::Error>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut rows = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        if record.get(0).map(str::is_empty).unwrap_or(true) {
            continue;
        }
        rows.push(record.deserialize(Some(&headers))?);
    }

    Ok(rows)
}

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().trim_start_matches('\u{feff}').to_string())
}
