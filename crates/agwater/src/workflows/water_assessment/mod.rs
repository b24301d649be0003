//! Agricultural water risk assessment: scoring engine, assessment service,
//! and the eight-step collection wizard.

pub mod domain;
pub(crate) mod evaluation;
pub mod repository;
pub mod router;
pub mod service;
pub mod thresholds;
pub(crate) mod validation;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use domain::{
    ActionPriority, AdjacentLandUse, ApplicationMethod, Assessment, AssessmentId,
    AssessmentStatus, AssessmentUpdate, CropContactType, DataQualityWarning,
    EnvironmentalAssessment, EnvironmentalAssessmentId, EnvironmentalInput, FarmId,
    FdaDetermination, FieldAssessment, FieldAssessmentId, FieldId, FieldPracticeInput,
    MitigationAction, NewAssessment, PhysicalCondition, RiskCategory, RiskFactor, RiskLevel,
    RiskScoreResult, ScoreComponent, Signature, SourceAssessment, SourceAssessmentId,
    SourceConditionInput, TestingFrequency, WaterSourceId, WildlifePressure,
};
pub use evaluation::{
    aggregate, estimate_die_off, evaluate_environment, evaluate_field_practice, evaluate_source,
    evaluate_timing, required_die_off_days, required_stv_die_off_days, source_die_off_days,
    worst_of, AggregateScore, CategoryEvaluation, CategoryScores, DieOffEstimate,
    EvaluationConfig, RiskEngine, RiskInputs,
};
pub use repository::{AssessmentRecord, AssessmentStatusView, AssessmentStore, StoreError};
pub use router::assessment_router;
pub use service::{AssessmentError, AssessmentService};
pub use validation::{FieldError, ValidationErrors};
pub use wizard::{
    AssessmentWorkflow, FieldDraft, SaveOutcome, SaveResult, StepSaveReport, WizardAction,
    WizardState, WizardStep, WorkflowError,
};
