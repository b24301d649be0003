//! Eight-step data-collection workflow over the assessment service.
//!
//! The wizard state is a plain serializable value so a front end can hold it
//! between requests; every transition goes through [`AssessmentWorkflow`],
//! which enforces the step gates and persists drafts as steps are left.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    ApplicationMethod, Assessment, AssessmentId, AssessmentStatus, AssessmentUpdate,
    CropContactType, DataQualityWarning, EnvironmentalAssessment, EnvironmentalInput, FarmId, FieldAssessment,
    FieldAssessmentId, FieldId, FieldPracticeInput, NewAssessment, RiskScoreResult, Signature,
    SourceAssessment, SourceConditionInput, WaterSourceId,
};
use super::repository::AssessmentStore;
use super::service::{AssessmentError, AssessmentService};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    #[default]
    FarmSelection,
    SourceSelection,
    SourceConditions,
    FieldSelection,
    FieldPractices,
    Environmental,
    RiskReview,
    SignSubmit,
}

impl WizardStep {
    const ALL: [Self; 8] = [
        Self::FarmSelection,
        Self::SourceSelection,
        Self::SourceConditions,
        Self::FieldSelection,
        Self::FieldPractices,
        Self::Environmental,
        Self::RiskReview,
        Self::SignSubmit,
    ];

    /// One-based position shown to the operator.
    pub fn number(self) -> u8 {
        match self {
            Self::FarmSelection => 1,
            Self::SourceSelection => 2,
            Self::SourceConditions => 3,
            Self::FieldSelection => 4,
            Self::FieldPractices => 5,
            Self::Environmental => 6,
            Self::RiskReview => 7,
            Self::SignSubmit => 8,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::FarmSelection => "farm selection",
            Self::SourceSelection => "water source selection",
            Self::SourceConditions => "water source conditions",
            Self::FieldSelection => "field selection",
            Self::FieldPractices => "field practices",
            Self::Environmental => "environmental hazards",
            Self::RiskReview => "risk review",
            Self::SignSubmit => "sign and submit",
        }
    }

    pub fn next(self) -> Option<Self> {
        Self::ALL.get(usize::from(self.number())).copied()
    }

    pub fn previous(self) -> Option<Self> {
        usize::from(self.number())
            .checked_sub(2)
            .and_then(|index| Self::ALL.get(index).copied())
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({})", self.number(), self.label())
    }
}

/// Field practice draft; method and contact stay optional until the operator picks them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDraft {
    #[serde(default)]
    pub id: Option<FieldAssessmentId>,
    #[serde(default)]
    pub water_source_id: Option<WaterSourceId>,
    #[serde(default)]
    pub application_method: Option<ApplicationMethod>,
    #[serde(default)]
    pub crop_contact_type: Option<CropContactType>,
    #[serde(default)]
    pub typical_days_before_harvest: Option<i64>,
    #[serde(default)]
    pub die_off_period_adequate: Option<bool>,
}

impl FieldDraft {
    pub fn is_complete(&self) -> bool {
        self.application_method.is_some() && self.crop_contact_type.is_some()
    }

    fn to_input(&self) -> Option<FieldPracticeInput> {
        Some(FieldPracticeInput {
            id: self.id.clone(),
            water_source_id: self.water_source_id.clone(),
            application_method: self.application_method?,
            crop_contact_type: self.crop_contact_type?,
            typical_days_before_harvest: self.typical_days_before_harvest,
            die_off_period_adequate: self.die_off_period_adequate,
        })
    }
}

impl From<&FieldAssessment> for FieldDraft {
    fn from(field: &FieldAssessment) -> Self {
        Self {
            id: Some(field.id.clone()),
            water_source_id: field.water_source_id.clone(),
            application_method: Some(field.application_method),
            crop_contact_type: Some(field.crop_contact_type),
            typical_days_before_harvest: field.typical_days_before_harvest.map(i64::from),
            die_off_period_adequate: field.die_off_period_adequate,
        }
    }
}

impl From<&SourceAssessment> for SourceConditionInput {
    fn from(source: &SourceAssessment) -> Self {
        Self {
            id: Some(source.id.clone()),
            physical_condition: source.physical_condition,
            testing_frequency: source.testing_frequency,
            ecoli_gm: source.ecoli_gm,
            ecoli_stv: source.ecoli_stv,
            sample_count: source.sample_count,
            contamination_risks: source.contamination_risks.clone(),
        }
    }
}

impl From<&EnvironmentalAssessment> for EnvironmentalInput {
    fn from(environment: &EnvironmentalAssessment) -> Self {
        Self {
            id: Some(environment.id.clone()),
            cafo_within_1000ft: environment.cafo_within_1000ft,
            nearest_animal_operation_ft: environment.nearest_animal_operation_ft,
            flooding_history: environment.flooding_history,
            flooding_last_12_months: environment.flooding_last_12_months,
            septic_nearby: environment.septic_nearby,
            wildlife_pressure: environment.wildlife_pressure,
            adjacent_land_uses: environment.adjacent_land_uses.clone(),
            additional_risks: environment.additional_risks.clone(),
        }
    }
}

/// Everything the operator has entered so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WizardState {
    #[serde(default)]
    pub step: WizardStep,
    #[serde(default)]
    pub assessment_id: Option<AssessmentId>,
    #[serde(default)]
    pub status: Option<AssessmentStatus>,
    #[serde(default)]
    pub farm_id: Option<FarmId>,
    #[serde(default)]
    pub season_year: Option<i32>,
    #[serde(default)]
    pub assessment_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub selected_sources: Vec<WaterSourceId>,
    #[serde(default)]
    pub source_drafts: BTreeMap<WaterSourceId, SourceConditionInput>,
    #[serde(default)]
    pub selected_fields: Vec<FieldId>,
    #[serde(default)]
    pub field_drafts: BTreeMap<FieldId, FieldDraft>,
    #[serde(default)]
    pub environmental: Option<EnvironmentalInput>,
    #[serde(default)]
    pub risk: Option<RiskScoreResult>,
    #[serde(default)]
    pub signature: Option<Signature>,
}

impl WizardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_farm(&mut self, farm_id: FarmId, season_year: i32) {
        self.farm_id = Some(farm_id);
        self.season_year = Some(season_year);
    }

    pub fn set_assessment_date(&mut self, date: NaiveDate) {
        self.assessment_date = Some(date);
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = Some(notes.into());
    }

    pub fn select_source(&mut self, source: WaterSourceId) {
        if !self.selected_sources.contains(&source) {
            self.selected_sources.push(source);
        }
    }

    /// Removes the selection only; any draft is kept in case it is reselected.
    pub fn deselect_source(&mut self, source: &WaterSourceId) {
        self.selected_sources.retain(|selected| selected != source);
    }

    /// Record a source draft, selecting the source when needed. A saved id is kept.
    pub fn set_source_draft(&mut self, source: WaterSourceId, mut input: SourceConditionInput) {
        if input.id.is_none() {
            input.id = self
                .source_drafts
                .get(&source)
                .and_then(|draft| draft.id.clone());
        }
        self.select_source(source.clone());
        self.source_drafts.insert(source, input);
    }

    pub fn select_field(&mut self, field: FieldId) {
        if !self.selected_fields.contains(&field) {
            self.selected_fields.push(field);
        }
    }

    pub fn deselect_field(&mut self, field: &FieldId) {
        self.selected_fields.retain(|selected| selected != field);
    }

    pub fn set_field_draft(&mut self, field: FieldId, mut draft: FieldDraft) {
        if draft.id.is_none() {
            draft.id = self.field_drafts.get(&field).and_then(|current| current.id.clone());
        }
        self.select_field(field.clone());
        self.field_drafts.insert(field, draft);
    }

    pub fn set_environmental(&mut self, mut input: EnvironmentalInput) {
        if input.id.is_none() {
            input.id = self
                .environmental
                .as_ref()
                .and_then(|current| current.id.clone());
        }
        self.environmental = Some(input);
    }

    pub fn capture_signature(&mut self, signature: Signature) {
        self.signature = Some(signature);
    }

    pub fn risk_is_complete(&self) -> bool {
        self.risk.as_ref().is_some_and(RiskScoreResult::is_complete)
    }
}

/// Result of persisting one item while leaving a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SaveResult {
    Saved { id: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub subject: String,
    pub result: SaveResult,
}

/// Per-item outcomes of one step's best-effort save batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSaveReport {
    pub step: WizardStep,
    pub outcomes: Vec<SaveOutcome>,
}

impl StepSaveReport {
    fn new(step: WizardStep) -> Self {
        Self {
            step,
            outcomes: Vec::new(),
        }
    }

    fn record<T, F>(&mut self, subject: &str, result: Result<T, AssessmentError>, id: F) -> Option<T>
    where
        F: FnOnce(&T) -> String,
    {
        let (saved, result) = match result {
            Ok(value) => {
                let result = SaveResult::Saved { id: id(&value) };
                (Some(value), result)
            }
            Err(error) => (
                None,
                SaveResult::Failed {
                    error: error.to_string(),
                },
            ),
        };
        self.outcomes.push(SaveOutcome {
            subject: subject.to_string(),
            result,
        });
        saved
    }

    pub fn failures(&self) -> impl Iterator<Item = &SaveOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.result, SaveResult::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    fn saved_any(&self) -> bool {
        self.outcomes
            .iter()
            .any(|outcome| matches!(outcome.result, SaveResult::Saved { .. }))
    }
}

impl fmt::Display for StepSaveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed: Vec<&str> = self
            .failures()
            .map(|outcome| outcome.subject.as_str())
            .collect();
        write!(
            f,
            "{} of {} item(s) failed to save on {}: {}",
            failed.len(),
            self.outcomes.len(),
            self.step,
            failed.join(", ")
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("cannot leave {step}: {reason}")]
    Gate { step: WizardStep, reason: String },
    #[error("{0}")]
    StepSave(StepSaveReport),
    #[error("risk calculation failed: {0}")]
    Risk(#[source] AssessmentError),
    #[error("submission failed: {0}")]
    Submit(#[source] AssessmentError),
    #[error("could not resume assessment: {0}")]
    Resume(#[source] AssessmentError),
}

impl WorkflowError {
    fn gate(step: WizardStep, reason: impl Into<String>) -> Self {
        Self::Gate {
            step,
            reason: reason.into(),
        }
    }
}

/// Operation posted to the wizard endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WizardAction {
    Advance,
    Back,
    ComputeRisk,
    Submit,
    Resume { assessment_id: AssessmentId },
}

pub struct AssessmentWorkflow<S> {
    service: Arc<AssessmentService<S>>,
}

impl<S> AssessmentWorkflow<S>
where
    S: AssessmentStore + 'static,
{
    pub fn new(service: Arc<AssessmentService<S>>) -> Self {
        Self { service }
    }

    /// Apply one posted action, returning the resulting state.
    pub fn apply(
        &self,
        mut state: WizardState,
        action: WizardAction,
    ) -> Result<WizardState, (WizardState, WorkflowError)> {
        let outcome = match action {
            WizardAction::Advance => self.advance(&mut state).map(|_| ()),
            WizardAction::Back => {
                self.back(&mut state);
                Ok(())
            }
            WizardAction::ComputeRisk => self.compute_risk(&mut state).map(|_| ()),
            WizardAction::Submit => self.submit(&mut state).map(|_| ()),
            WizardAction::Resume { assessment_id } => {
                self.resume(&assessment_id).map(|resumed| state = resumed)
            }
        };
        match outcome {
            Ok(()) => Ok(state),
            Err(error) => Err((state, error)),
        }
    }

    /// Check the current step's gate, persist its data, and move forward.
    ///
    /// On any failure the state stays on the current step.
    pub fn advance(&self, state: &mut WizardState) -> Result<WizardStep, WorkflowError> {
        let step = state.step;
        match step {
            WizardStep::FarmSelection => self.save_farm(state)?,
            WizardStep::SourceSelection => {
                if state.selected_sources.is_empty() {
                    return Err(WorkflowError::gate(step, "select at least one water source"));
                }
            }
            WizardStep::SourceConditions => self.save_sources(state)?,
            WizardStep::FieldSelection => {
                if state.selected_fields.is_empty() {
                    return Err(WorkflowError::gate(step, "select at least one field"));
                }
            }
            WizardStep::FieldPractices => self.save_fields(state)?,
            WizardStep::Environmental => self.save_environmental(state)?,
            WizardStep::RiskReview => {
                if !state.risk_is_complete() {
                    return Err(WorkflowError::gate(
                        step,
                        "an overall risk score must be calculated",
                    ));
                }
            }
            WizardStep::SignSubmit => {
                return Err(WorkflowError::gate(step, "final step; submit the assessment"));
            }
        }

        let next = step.next().unwrap_or(step);
        state.step = next;
        info!(
            assessment_id = ?state.assessment_id.as_ref().map(AssessmentId::as_str),
            step = next.number(),
            "wizard advanced"
        );
        Ok(next)
    }

    /// Move one step back without discarding anything.
    pub fn back(&self, state: &mut WizardState) -> WizardStep {
        if let Some(previous) = state.step.previous() {
            state.step = previous;
        }
        state.step
    }

    pub fn compute_risk<'s>(
        &self,
        state: &'s mut WizardState,
    ) -> Result<&'s RiskScoreResult, WorkflowError> {
        state.risk = None;
        let id = Self::require_assessment(state)?;
        match self.service.compute_risk(&id) {
            Ok(mut result) => {
                result
                    .warnings
                    .extend(self.unselected_record_warnings(state, &id));
                let result: &RiskScoreResult = state.risk.insert(result);
                Ok(result)
            }
            Err(error) => {
                warn!(assessment_id = %id, error = %error, "wizard risk calculation failed");
                Err(WorkflowError::Risk(error))
            }
        }
    }

    pub fn submit(&self, state: &mut WizardState) -> Result<Assessment, WorkflowError> {
        let step = state.step;
        if step != WizardStep::SignSubmit {
            return Err(WorkflowError::gate(step, "submission happens on the final step"));
        }
        let Some(signature) = state.signature.clone() else {
            return Err(WorkflowError::gate(step, "a signature must be captured"));
        };
        let id = Self::require_assessment(state)?;
        let assessment = self
            .service
            .submit_assessment(&id, signature)
            .map_err(WorkflowError::Submit)?;
        state.status = Some(assessment.status);
        Ok(assessment)
    }

    /// Rebuild a wizard session from stored records.
    pub fn resume(&self, id: &AssessmentId) -> Result<WizardState, WorkflowError> {
        let record = self
            .service
            .get_assessment(id)
            .map_err(WorkflowError::Resume)?;
        let assessment = record.assessment;

        let mut state = WizardState {
            assessment_id: Some(assessment.id.clone()),
            status: Some(assessment.status),
            farm_id: Some(assessment.farm_id),
            season_year: Some(assessment.season_year),
            assessment_date: Some(assessment.assessment_date),
            notes: assessment.notes,
            risk: assessment.risk_score,
            signature: assessment.signature,
            environmental: record.environmental.as_ref().map(EnvironmentalInput::from),
            ..WizardState::default()
        };
        for source in &record.sources {
            state.set_source_draft(source.water_source_id.clone(), source.into());
        }
        for field in &record.fields {
            state.set_field_draft(field.field_id.clone(), field.into());
        }

        state.step = if matches!(
            assessment.status,
            AssessmentStatus::Submitted | AssessmentStatus::Approved
        ) {
            WizardStep::SignSubmit
        } else if state.selected_sources.is_empty() {
            WizardStep::SourceSelection
        } else if state.selected_fields.is_empty() {
            WizardStep::FieldSelection
        } else if state.environmental.is_none() {
            WizardStep::Environmental
        } else {
            WizardStep::RiskReview
        };

        info!(assessment_id = %id, step = state.step.number(), "wizard resumed");
        Ok(state)
    }

    fn require_assessment(state: &WizardState) -> Result<AssessmentId, WorkflowError> {
        state
            .assessment_id
            .clone()
            .ok_or_else(|| WorkflowError::gate(state.step, "the assessment has not been created"))
    }

    fn finish_save(state: &mut WizardState, report: StepSaveReport) -> Result<(), WorkflowError> {
        if report.saved_any() {
            state.risk = None;
        }
        if report.has_failures() {
            warn!(
                assessment_id = ?state.assessment_id.as_ref().map(AssessmentId::as_str),
                step = report.step.number(),
                failed = report.failures().count(),
                "wizard step save failed"
            );
            return Err(WorkflowError::StepSave(report));
        }
        Ok(())
    }

    fn save_farm(&self, state: &mut WizardState) -> Result<(), WorkflowError> {
        let step = WizardStep::FarmSelection;
        let (Some(farm_id), Some(season_year)) = (state.farm_id.clone(), state.season_year) else {
            return Err(WorkflowError::gate(step, "select a farm and season year"));
        };
        let assessment_date = state
            .assessment_date
            .unwrap_or_else(|| Utc::now().date_naive());

        let saved = match &state.assessment_id {
            None => self.service.create_assessment(NewAssessment {
                farm_id,
                season_year,
                assessment_date,
                notes: state.notes.clone(),
            }),
            Some(id) => self.service.update_assessment(
                id,
                AssessmentUpdate {
                    farm_id: Some(farm_id),
                    season_year: Some(season_year),
                    assessment_date: Some(assessment_date),
                    notes: state.notes.clone(),
                },
            ),
        };

        let mut report = StepSaveReport::new(step);
        if let Some(assessment) = report.record("assessment", saved, |a| a.id.to_string()) {
            state.assessment_id = Some(assessment.id);
            state.status = Some(assessment.status);
            state.assessment_date = Some(assessment.assessment_date);
        }
        Self::finish_save(state, report)
    }

    fn save_sources(&self, state: &mut WizardState) -> Result<(), WorkflowError> {
        let step = WizardStep::SourceConditions;
        if let Some(missing) = state
            .selected_sources
            .iter()
            .find(|source| !state.source_drafts.contains_key(*source))
        {
            return Err(WorkflowError::gate(
                step,
                format!("record the condition of water source {missing}"),
            ));
        }
        let id = Self::require_assessment(state)?;

        let mut report = StepSaveReport::new(step);
        for source in state.selected_sources.clone() {
            let Some(draft) = state.source_drafts.get(&source).cloned() else {
                continue;
            };
            let result = self.service.upsert_source_assessment(&id, source.clone(), draft);
            if let Some(saved) = report.record(source.as_str(), result, |s| s.id.to_string()) {
                if let Some(draft) = state.source_drafts.get_mut(&source) {
                    draft.id = Some(saved.id);
                }
            }
        }
        Self::finish_save(state, report)
    }

    fn save_fields(&self, state: &mut WizardState) -> Result<(), WorkflowError> {
        let step = WizardStep::FieldPractices;
        if let Some(incomplete) = state.selected_fields.iter().find(|field| {
            !state
                .field_drafts
                .get(*field)
                .is_some_and(FieldDraft::is_complete)
        }) {
            return Err(WorkflowError::gate(
                step,
                format!("choose the application method and crop contact for field {incomplete}"),
            ));
        }
        let id = Self::require_assessment(state)?;

        let mut report = StepSaveReport::new(step);
        for field in state.selected_fields.clone() {
            let Some(input) = state.field_drafts.get(&field).and_then(FieldDraft::to_input) else {
                continue;
            };
            let result = self.service.upsert_field_assessment(&id, field.clone(), input);
            if let Some(saved) = report.record(field.as_str(), result, |f| f.id.to_string()) {
                if let Some(draft) = state.field_drafts.get_mut(&field) {
                    draft.id = Some(saved.id);
                }
            }
        }
        Self::finish_save(state, report)
    }

    /// Without a draft the step records that nothing was observed.
    fn save_environmental(&self, state: &mut WizardState) -> Result<(), WorkflowError> {
        let id = Self::require_assessment(state)?;
        let input = state.environmental.clone().unwrap_or_default();

        let mut report = StepSaveReport::new(WizardStep::Environmental);
        let result = self.service.upsert_environmental_assessment(&id, input.clone());
        if let Some(saved) = report.record("environment", result, |e| e.id.to_string()) {
            state.environmental = Some(EnvironmentalInput {
                id: Some(saved.id),
                ..input
            });
        }
        Self::finish_save(state, report)
    }

    /// Stored sources and fields that are no longer selected still feed the score.
    fn unselected_record_warnings(
        &self,
        state: &WizardState,
        id: &AssessmentId,
    ) -> Vec<DataQualityWarning> {
        let record = match self.service.get_assessment(id) {
            Ok(record) => record,
            Err(error) => {
                warn!(assessment_id = %id, error = %error, "wizard selection check skipped");
                return Vec::new();
            }
        };
        let sources = record
            .sources
            .iter()
            .filter(|source| !state.selected_sources.contains(&source.water_source_id))
            .map(|source| DataQualityWarning {
                subject: source.water_source_id.to_string(),
                message: "water source was deselected but its stored record is still scored"
                    .to_string(),
            });
        let fields = record
            .fields
            .iter()
            .filter(|field| !state.selected_fields.contains(&field.field_id))
            .map(|field| DataQualityWarning {
                subject: field.field_id.to_string(),
                message: "field was deselected but its stored record is still scored".to_string(),
            });
        sources.chain(fields).collect()
    }
}
