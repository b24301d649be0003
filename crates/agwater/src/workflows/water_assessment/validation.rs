use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::{
    AssessmentUpdate, EnvironmentalInput, FieldPracticeInput, NewAssessment, Signature,
    SourceConditionInput,
};

const MIN_SEASON_YEAR: i32 = 2000;
const MAX_SEASON_YEAR: i32 = 2100;

/// Field-level message reported inline to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Collection of field errors for one rejected input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub fields: Vec<FieldError>,
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed: {}", self.summary())
    }
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn summary(&self) -> String {
        self.fields
            .iter()
            .map(|error| format!("{}: {}", error.field, error.message))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

fn check_season_year(errors: &mut ValidationErrors, year: i32) {
    if !(MIN_SEASON_YEAR..=MAX_SEASON_YEAR).contains(&year) {
        errors.push(
            "season_year",
            format!("must be between {MIN_SEASON_YEAR} and {MAX_SEASON_YEAR}"),
        );
    }
}

fn check_lab_value(errors: &mut ValidationErrors, field: &str, value: Option<f64>) {
    if let Some(value) = value {
        if !value.is_finite() || value <= 0.0 {
            errors.push(field, "must be a positive CFU/100mL value");
        }
    }
}

pub(crate) fn validate_new_assessment(input: &NewAssessment) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if input.farm_id.as_str().trim().is_empty() {
        errors.push("farm_id", "a farm must be selected");
    }
    check_season_year(&mut errors, input.season_year);
    errors.into_result()
}

pub(crate) fn validate_assessment_update(input: &AssessmentUpdate) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if let Some(farm_id) = &input.farm_id {
        if farm_id.as_str().trim().is_empty() {
            errors.push("farm_id", "a farm must be selected");
        }
    }
    if let Some(year) = input.season_year {
        check_season_year(&mut errors, year);
    }
    errors.into_result()
}

pub(crate) fn validate_source_input(input: &SourceConditionInput) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_lab_value(&mut errors, "ecoli_gm", input.ecoli_gm);
    check_lab_value(&mut errors, "ecoli_stv", input.ecoli_stv);
    if input
        .contamination_risks
        .iter()
        .any(|risk| risk.trim().is_empty())
    {
        errors.push("contamination_risks", "risk tags must not be blank");
    }
    errors.into_result()
}

/// Returns the harvest interval narrowed to an unsigned day count.
pub(crate) fn validate_field_input(
    input: &FieldPracticeInput,
) -> Result<Option<u32>, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let days = match input.typical_days_before_harvest {
        Some(days) => match u32::try_from(days) {
            Ok(days) => Some(days),
            Err(_) => {
                errors.push(
                    "typical_days_before_harvest",
                    "must be zero or a positive number of days",
                );
                None
            }
        },
        None => None,
    };
    errors.into_result().map(|_| days)
}

pub(crate) fn validate_environmental_input(
    input: &EnvironmentalInput,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if let Some(distance) = input.nearest_animal_operation_ft {
        if !distance.is_finite() || distance < 0.0 {
            errors.push(
                "nearest_animal_operation_ft",
                "must be a non-negative distance in feet",
            );
        }
    }
    if input.additional_risks.iter().any(|risk| risk.trim().is_empty()) {
        errors.push("additional_risks", "identified risks must not be blank");
    }
    errors.into_result()
}

pub(crate) fn validate_signature(signature: &Signature) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if signature.signer_name.trim().is_empty() {
        errors.push("signer_name", "the assessor must be named");
    }
    if signature.signature_blob.trim().is_empty() {
        errors.push("signature_blob", "a signature must be captured");
    }
    errors.into_result()
}
