//! Import of raw E. coli sample results into per-source water quality profiles.

mod parser;

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::workflows::water_assessment::thresholds::{GM_THRESHOLD, STV_THRESHOLD};
use crate::workflows::water_assessment::{SourceConditionInput, WaterSourceId};
use parser::LabSample;

/// Value substituted for non-detect results before taking logarithms.
const NON_DETECT_SUBSTITUTE: f64 = 1.0;
/// One-sided 90th percentile z-score used for the statistical threshold value.
const STV_Z_SCORE: f64 = 1.282;

#[derive(Debug)]
pub enum LabResultsError {
    Io(std::io::Error),
    Csv(csv::Error),
    MissingSource { line: usize },
    InvalidDate { line: usize, value: String },
    InvalidResult { line: usize, value: String },
}

impl std::fmt::Display for LabResultsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabResultsError::Io(err) => write!(f, "failed to read lab results: {}", err),
            LabResultsError::Csv(err) => write!(f, "invalid lab results CSV: {}", err),
            LabResultsError::MissingSource { line } => {
                write!(f, "line {}: water_source_id is required", line)
            }
            LabResultsError::InvalidDate { line, value } => write!(
                f,
                "line {}: sampled_on '{}' is not a YYYY-MM-DD date",
                line, value
            ),
            LabResultsError::InvalidResult { line, value } => write!(
                f,
                "line {}: E. coli result '{}' must be a non-negative number",
                line, value
            ),
        }
    }
}

impl std::error::Error for LabResultsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LabResultsError::Io(err) => Some(err),
            LabResultsError::Csv(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LabResultsError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for LabResultsError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Summary statistics for one water source's samples, in CFU/100mL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterQualityProfile {
    pub water_source_id: WaterSourceId,
    pub sample_count: u32,
    pub non_detects: u32,
    pub geometric_mean: f64,
    /// `None` until at least two samples exist.
    pub statistical_threshold_value: Option<f64>,
    pub first_sampled_on: NaiveDate,
    pub last_sampled_on: NaiveDate,
}

impl WaterQualityProfile {
    pub fn meets_gm_threshold(&self) -> bool {
        self.geometric_mean <= GM_THRESHOLD
    }

    pub fn meets_stv_threshold(&self) -> bool {
        self.statistical_threshold_value
            .map_or(true, |stv| stv <= STV_THRESHOLD)
    }

    /// Copy the lab-derived values onto a source condition input.
    pub fn apply_to(&self, input: &mut SourceConditionInput) {
        input.ecoli_gm = Some(self.geometric_mean);
        input.ecoli_stv = self.statistical_threshold_value;
        input.sample_count = Some(self.sample_count);
    }
}

pub struct LabResultsImporter;

impl LabResultsImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<WaterQualityProfile>, LabResultsError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Profiles are returned ordered by water source id.
    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<WaterQualityProfile>, LabResultsError> {
        let mut by_source: BTreeMap<WaterSourceId, Vec<LabSample>> = BTreeMap::new();
        for sample in parser::parse_samples(reader)? {
            by_source
                .entry(sample.water_source_id.clone())
                .or_default()
                .push(sample);
        }

        let profiles: Vec<WaterQualityProfile> = by_source
            .into_iter()
            .filter_map(|(source, samples)| summarize(source, &samples))
            .collect();
        debug!(sources = profiles.len(), "lab results summarized");
        Ok(profiles)
    }
}

fn summarize(water_source_id: WaterSourceId, samples: &[LabSample]) -> Option<WaterQualityProfile> {
    let first_sampled_on = samples.iter().map(|sample| sample.sampled_on).min()?;
    let last_sampled_on = samples.iter().map(|sample| sample.sampled_on).max()?;

    let logs: Vec<f64> = samples
        .iter()
        .map(|sample| sample.ecoli_cfu_per_100ml.max(NON_DETECT_SUBSTITUTE).log10())
        .collect();
    let n = logs.len() as f64;
    let mean = logs.iter().sum::<f64>() / n;

    let statistical_threshold_value = (logs.len() >= 2).then(|| {
        let variance = logs
            .iter()
            .map(|value| (value - mean).powi(2))
            .sum::<f64>()
            / (n - 1.0);
        10f64.powf(mean + STV_Z_SCORE * variance.sqrt())
    });

    Some(WaterQualityProfile {
        water_source_id,
        sample_count: u32::try_from(samples.len()).unwrap_or(u32::MAX),
        non_detects: samples
            .iter()
            .filter(|sample| sample.ecoli_cfu_per_100ml < NON_DETECT_SUBSTITUTE)
            .count() as u32,
        geometric_mean: 10f64.powf(mean),
        statistical_threshold_value,
        first_sampled_on,
        last_sampled_on,
    })
}
