use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::domain::{
    Assessment, AssessmentId, AssessmentStatus, AssessmentUpdate, EnvironmentalAssessment,
    EnvironmentalAssessmentId, EnvironmentalInput, FieldAssessment, FieldAssessmentId, FieldId,
    FieldPracticeInput, NewAssessment, RiskScoreResult, Signature, SourceAssessment,
    SourceAssessmentId, SourceConditionInput, WaterSourceId,
};
use super::evaluation::{EvaluationConfig, RiskEngine, RiskInputs};
use super::repository::{AssessmentRecord, AssessmentStore, StoreError};
use super::validation::{
    validate_assessment_update, validate_environmental_input, validate_field_input,
    validate_new_assessment, validate_signature, validate_source_input, ValidationErrors,
};

static RECORD_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let id = RECORD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{id:06}")
}

/// Error raised by the assessment service.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("incomplete data: {0}")]
    IncompleteData(String),
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("assessment '{0}' is approved and can no longer be changed")]
    ImmutableState(AssessmentId),
    #[error("assessment cannot move from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
    #[error("assessment store failure: {0}")]
    Persistence(String),
}

impl From<StoreError> for AssessmentError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => Self::NotFound {
                entity: "record",
                id: "unknown".to_string(),
            },
            StoreError::Conflict => Self::Persistence("conflicting write".to_string()),
            StoreError::Unavailable(reason) => Self::Persistence(reason),
        }
    }
}

impl AssessmentError {
    fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Service composing the assessment store and the risk engine.
pub struct AssessmentService<S> {
    store: Arc<S>,
    engine: RiskEngine,
}

impl<S> AssessmentService<S>
where
    S: AssessmentStore + 'static,
{
    pub fn new(store: Arc<S>, config: EvaluationConfig) -> Self {
        Self {
            store,
            engine: RiskEngine::new(config),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Open a new draft assessment for a farm and season.
    pub fn create_assessment(&self, input: NewAssessment) -> Result<Assessment, AssessmentError> {
        validate_new_assessment(&input)?;

        let assessment = Assessment {
            id: AssessmentId(next_id("wra")),
            farm_id: input.farm_id,
            season_year: input.season_year,
            assessment_date: input.assessment_date,
            notes: input.notes,
            status: AssessmentStatus::Draft,
            risk_score: None,
            mitigation_actions: Vec::new(),
            signature: None,
            submitted_at: None,
            approved_by: None,
            approved_at: None,
        };

        let stored = self.store.insert_assessment(assessment)?;
        info!(
            assessment_id = %stored.id,
            farm_id = %stored.farm_id,
            season_year = stored.season_year,
            "water assessment created"
        );
        Ok(stored)
    }

    pub fn update_assessment(
        &self,
        id: &AssessmentId,
        update: AssessmentUpdate,
    ) -> Result<Assessment, AssessmentError> {
        validate_assessment_update(&update)?;
        let mut assessment = self.editable_assessment(id)?;

        if let Some(farm_id) = update.farm_id {
            assessment.farm_id = farm_id;
        }
        if let Some(year) = update.season_year {
            assessment.season_year = year;
        }
        if let Some(date) = update.assessment_date {
            assessment.assessment_date = date;
        }
        if let Some(notes) = update.notes {
            assessment.notes = Some(notes);
        }
        discard_risk(&mut assessment);

        self.store.update_assessment(assessment.clone())?;
        debug!(assessment_id = %id, "water assessment updated");
        Ok(assessment)
    }

    /// Create or update the condition record for one water source.
    ///
    /// Without an explicit id the record is matched on the water source, so
    /// repeating the same call never produces a duplicate.
    pub fn upsert_source_assessment(
        &self,
        assessment_id: &AssessmentId,
        water_source_id: WaterSourceId,
        input: SourceConditionInput,
    ) -> Result<SourceAssessment, AssessmentError> {
        let assessment = self.editable_assessment(assessment_id)?;
        validate_source_input(&input)?;

        let existing = match &input.id {
            Some(id) => Some(
                self.store
                    .fetch_source(id)?
                    .filter(|source| &source.assessment_id == assessment_id)
                    .ok_or_else(|| AssessmentError::not_found("source assessment", id))?,
            ),
            None => self
                .store
                .sources_for(assessment_id)?
                .into_iter()
                .find(|source| source.water_source_id == water_source_id),
        };

        let record = match existing {
            Some(mut record) => {
                record.water_source_id = water_source_id;
                record.apply(input);
                record
            }
            None => SourceAssessment::new(
                SourceAssessmentId(next_id("src")),
                assessment_id.clone(),
                water_source_id,
                input,
            ),
        };

        let saved = self.store.save_source(record)?;
        self.mark_in_progress(assessment)?;
        debug!(
            assessment_id = %assessment_id,
            source_assessment_id = %saved.id,
            water_source_id = %saved.water_source_id,
            "source assessment saved"
        );
        Ok(saved)
    }

    /// Create or update the practice record for one field, matched like sources.
    pub fn upsert_field_assessment(
        &self,
        assessment_id: &AssessmentId,
        field_id: FieldId,
        input: FieldPracticeInput,
    ) -> Result<FieldAssessment, AssessmentError> {
        let assessment = self.editable_assessment(assessment_id)?;
        let typical_days_before_harvest = validate_field_input(&input)?;

        let existing = match &input.id {
            Some(id) => Some(
                self.store
                    .fetch_field(id)?
                    .filter(|field| &field.assessment_id == assessment_id)
                    .ok_or_else(|| AssessmentError::not_found("field assessment", id))?,
            ),
            None => self
                .store
                .fields_for(assessment_id)?
                .into_iter()
                .find(|field| field.field_id == field_id),
        };

        let id = existing
            .map(|field| field.id)
            .unwrap_or_else(|| FieldAssessmentId(next_id("fld")));
        let record = FieldAssessment {
            id,
            assessment_id: assessment_id.clone(),
            field_id,
            water_source_id: input.water_source_id,
            application_method: input.application_method,
            crop_contact_type: input.crop_contact_type,
            typical_days_before_harvest,
            die_off_period_adequate: input.die_off_period_adequate,
        };

        let saved = self.store.save_field(record)?;
        self.mark_in_progress(assessment)?;
        debug!(
            assessment_id = %assessment_id,
            field_assessment_id = %saved.id,
            field_id = %saved.field_id,
            "field assessment saved"
        );
        Ok(saved)
    }

    /// Create or replace the single environmental record of an assessment.
    pub fn upsert_environmental_assessment(
        &self,
        assessment_id: &AssessmentId,
        input: EnvironmentalInput,
    ) -> Result<EnvironmentalAssessment, AssessmentError> {
        let assessment = self.editable_assessment(assessment_id)?;
        validate_environmental_input(&input)?;

        let current = self.store.environmental_for(assessment_id)?;
        let id = match (&input.id, current) {
            (Some(requested), Some(current)) if &current.id == requested => current.id,
            (Some(requested), _) => {
                return Err(AssessmentError::not_found(
                    "environmental assessment",
                    requested,
                ))
            }
            (None, Some(current)) => current.id,
            (None, None) => EnvironmentalAssessmentId(next_id("env")),
        };

        let saved = self.store.save_environmental(EnvironmentalAssessment::new(
            id,
            assessment_id.clone(),
            input,
        ))?;
        self.mark_in_progress(assessment)?;
        debug!(
            assessment_id = %assessment_id,
            environmental_assessment_id = %saved.id,
            "environmental assessment saved"
        );
        Ok(saved)
    }

    /// Run the risk engine over the stored sub-entities and persist the result.
    pub fn compute_risk(&self, id: &AssessmentId) -> Result<RiskScoreResult, AssessmentError> {
        self.compute_risk_at(id, Utc::now())
    }

    pub fn compute_risk_at(
        &self,
        id: &AssessmentId,
        now: DateTime<Utc>,
    ) -> Result<RiskScoreResult, AssessmentError> {
        let mut assessment = self.editable_assessment(id)?;

        let sources = self.store.sources_for(id)?;
        if sources.is_empty() {
            return Err(AssessmentError::IncompleteData(
                "at least one water source assessment is required".to_string(),
            ));
        }
        let fields = self.store.fields_for(id)?;
        if fields.is_empty() {
            return Err(AssessmentError::IncompleteData(
                "at least one field assessment is required".to_string(),
            ));
        }
        let environment = self.store.environmental_for(id)?;

        let result = self.engine.score(
            RiskInputs {
                sources: &sources,
                fields: &fields,
                environment: environment.as_ref(),
            },
            now.date_naive(),
            now,
        )?;

        assessment.mitigation_actions = result.mitigation_actions.clone();
        assessment.risk_score = Some(result.clone());
        self.store.update_assessment(assessment)?;

        info!(
            assessment_id = %id,
            overall = ?result.overall_risk_score,
            determination = result.fda_determination.label(),
            actions = result.mitigation_actions.len(),
            "water risk calculated"
        );
        Ok(result)
    }

    /// Sign and submit; requires a complete risk result.
    pub fn submit_assessment(
        &self,
        id: &AssessmentId,
        signature: Signature,
    ) -> Result<Assessment, AssessmentError> {
        let mut assessment = self.editable_assessment(id)?;
        if !matches!(
            assessment.status,
            AssessmentStatus::Draft | AssessmentStatus::InProgress
        ) {
            return Err(AssessmentError::InvalidTransition {
                from: assessment.status.label(),
                to: AssessmentStatus::Submitted.label(),
            });
        }
        validate_signature(&signature)?;
        if !assessment
            .risk_score
            .as_ref()
            .is_some_and(RiskScoreResult::is_complete)
        {
            return Err(AssessmentError::IncompleteData(
                "risk must be calculated before submission".to_string(),
            ));
        }

        assessment.status = AssessmentStatus::Submitted;
        assessment.signature = Some(signature);
        assessment.submitted_at = Some(Utc::now());
        self.store.update_assessment(assessment.clone())?;

        info!(assessment_id = %id, "water assessment submitted");
        Ok(assessment)
    }

    pub fn approve_assessment(
        &self,
        id: &AssessmentId,
        approver: &str,
    ) -> Result<Assessment, AssessmentError> {
        let mut assessment = self.editable_assessment(id)?;
        if assessment.status != AssessmentStatus::Submitted {
            return Err(AssessmentError::InvalidTransition {
                from: assessment.status.label(),
                to: AssessmentStatus::Approved.label(),
            });
        }
        if approver.trim().is_empty() {
            return Err(ValidationErrors::single("approver", "an approver must be named").into());
        }

        assessment.status = AssessmentStatus::Approved;
        assessment.approved_by = Some(approver.trim().to_string());
        assessment.approved_at = Some(Utc::now());
        self.store.update_assessment(assessment.clone())?;

        info!(assessment_id = %id, approver = approver.trim(), "water assessment approved");
        Ok(assessment)
    }

    /// Fetch an assessment with its sub-entities for API responses and resumption.
    pub fn get_assessment(&self, id: &AssessmentId) -> Result<AssessmentRecord, AssessmentError> {
        let assessment = self
            .store
            .fetch_assessment(id)?
            .ok_or_else(|| AssessmentError::not_found("assessment", id))?;
        Ok(AssessmentRecord {
            sources: self.store.sources_for(id)?,
            fields: self.store.fields_for(id)?,
            environmental: self.store.environmental_for(id)?,
            assessment,
        })
    }

    fn editable_assessment(&self, id: &AssessmentId) -> Result<Assessment, AssessmentError> {
        let assessment = self
            .store
            .fetch_assessment(id)?
            .ok_or_else(|| AssessmentError::not_found("assessment", id))?;
        if !assessment.status.is_editable() {
            return Err(AssessmentError::ImmutableState(id.clone()));
        }
        Ok(assessment)
    }

    /// Every sub-entity save moves a draft forward and voids the stored risk
    /// result, so submission needs a fresh calculation.
    fn mark_in_progress(&self, mut assessment: Assessment) -> Result<(), AssessmentError> {
        let had_risk = discard_risk(&mut assessment);
        if assessment.status == AssessmentStatus::Draft {
            assessment.status = AssessmentStatus::InProgress;
        } else if !had_risk {
            return Ok(());
        }
        self.store.update_assessment(assessment)?;
        Ok(())
    }
}

fn discard_risk(assessment: &mut Assessment) -> bool {
    let had_risk = assessment.risk_score.is_some() || !assessment.mitigation_actions.is_empty();
    assessment.risk_score = None;
    assessment.mitigation_actions.clear();
    had_risk
}
