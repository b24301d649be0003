use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use std::io::Read;

use super::LabResultsError;
use crate::workflows::water_assessment::WaterSourceId;

/// Lines preceding the first data row.
const HEADER_LINES: usize = 1;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LabSample {
    pub(crate) water_source_id: WaterSourceId,
    pub(crate) sampled_on: NaiveDate,
    pub(crate) ecoli_cfu_per_100ml: f64,
}

pub(crate) fn parse_samples<R: Read>(reader: R) -> Result<Vec<LabSample>, LabResultsError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut samples = Vec::new();

    for (index, record) in csv_reader.deserialize::<LabRow>().enumerate() {
        let row = record?;
        let line = index + HEADER_LINES + 1;
        let Some(raw_result) = row.ecoli_cfu_per_100ml else {
            continue;
        };

        let water_source_id = row
            .water_source_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(LabResultsError::MissingSource { line })?;
        let sampled_on = row
            .sampled_on
            .as_deref()
            .and_then(parse_date)
            .ok_or_else(|| LabResultsError::InvalidDate {
                line,
                value: row.sampled_on.clone().unwrap_or_default(),
            })?;
        let value = raw_result
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite() && *value >= 0.0)
            .ok_or_else(|| LabResultsError::InvalidResult {
                line,
                value: raw_result.clone(),
            })?;

        samples.push(LabSample {
            water_source_id: WaterSourceId(water_source_id),
            sampled_on,
            ecoli_cfu_per_100ml: value,
        });
    }

    Ok(samples)
}

#[derive(Debug, Deserialize)]
struct LabRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    water_source_id: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    sampled_on: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    ecoli_cfu_per_100ml: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}
