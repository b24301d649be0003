use serde::Serialize;

use super::domain::{
    Assessment, AssessmentId, EnvironmentalAssessment, FieldAssessment, FieldAssessmentId,
    SourceAssessment, SourceAssessmentId,
};

/// Storage abstraction so the service and workflow can be exercised in isolation.
///
/// Saves are upserts keyed by the record id; a store never assigns ids.
pub trait AssessmentStore: Send + Sync {
    fn insert_assessment(&self, assessment: Assessment) -> Result<Assessment, StoreError>;
    fn update_assessment(&self, assessment: Assessment) -> Result<(), StoreError>;
    fn fetch_assessment(&self, id: &AssessmentId) -> Result<Option<Assessment>, StoreError>;

    fn save_source(&self, source: SourceAssessment) -> Result<SourceAssessment, StoreError>;
    fn fetch_source(
        &self,
        id: &SourceAssessmentId,
    ) -> Result<Option<SourceAssessment>, StoreError>;
    fn sources_for(&self, assessment: &AssessmentId) -> Result<Vec<SourceAssessment>, StoreError>;

    fn save_field(&self, field: FieldAssessment) -> Result<FieldAssessment, StoreError>;
    fn fetch_field(&self, id: &FieldAssessmentId) -> Result<Option<FieldAssessment>, StoreError>;
    fn fields_for(&self, assessment: &AssessmentId) -> Result<Vec<FieldAssessment>, StoreError>;

    fn save_environmental(
        &self,
        environment: EnvironmentalAssessment,
    ) -> Result<EnvironmentalAssessment, StoreError>;
    fn environmental_for(
        &self,
        assessment: &AssessmentId,
    ) -> Result<Option<EnvironmentalAssessment>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("assessment store unavailable: {0}")]
    Unavailable(String),
}

/// Assessment header with every stored sub-entity, as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentRecord {
    pub assessment: Assessment,
    pub sources: Vec<SourceAssessment>,
    pub fields: Vec<FieldAssessment>,
    pub environmental: Option<EnvironmentalAssessment>,
}

impl AssessmentRecord {
    pub fn status_view(&self) -> AssessmentStatusView {
        let risk = self.assessment.risk_score.as_ref();
        AssessmentStatusView {
            assessment_id: self.assessment.id.clone(),
            status: self.assessment.status.label(),
            source_count: self.sources.len(),
            field_count: self.fields.len(),
            has_environmental: self.environmental.is_some(),
            overall_risk_score: risk.and_then(|result| result.overall_risk_score),
            determination: risk
                .map(|result| result.summary())
                .unwrap_or_else(|| "risk not yet calculated".to_string()),
        }
    }
}

/// Compact representation of an assessment's progress.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentStatusView {
    pub assessment_id: AssessmentId,
    pub status: &'static str,
    pub source_count: usize,
    pub field_count: usize,
    pub has_environmental: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_risk_score: Option<f64>,
    pub determination: String,
}
