use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::water_assessment::domain::{
    ApplicationMethod, Assessment, AssessmentId, CropContactType, EnvironmentalAssessment,
    EnvironmentalInput, FarmId, FieldAssessment, FieldAssessmentId, FieldPracticeInput,
    NewAssessment, PhysicalCondition, SourceAssessment, SourceAssessmentId, SourceConditionInput,
    TestingFrequency, WaterSourceId,
};
use crate::workflows::water_assessment::repository::{AssessmentStore, StoreError};
use crate::workflows::water_assessment::{
    assessment_router, AssessmentService, AssessmentWorkflow, EvaluationConfig,
};

pub(super) fn evaluation_config() -> EvaluationConfig {
    EvaluationConfig::default()
}

pub(super) fn reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, 1).expect("valid date")
}

pub(super) fn calculated_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 15, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn new_assessment() -> NewAssessment {
    NewAssessment {
        farm_id: FarmId::from("farm-17"),
        season_year: 2025,
        assessment_date: reference_date(),
        notes: Some("Spring pre-season review".to_string()),
    }
}

pub(super) fn source_input(
    physical_condition: PhysicalCondition,
    testing_frequency: TestingFrequency,
    ecoli_gm: Option<f64>,
    ecoli_stv: Option<f64>,
) -> SourceConditionInput {
    SourceConditionInput {
        id: None,
        physical_condition,
        testing_frequency,
        ecoli_gm,
        ecoli_stv,
        sample_count: ecoli_gm.map(|_| 5),
        contamination_risks: BTreeSet::new(),
    }
}

pub(super) fn compliant_source() -> SourceConditionInput {
    source_input(
        PhysicalCondition::Excellent,
        TestingFrequency::Monthly,
        Some(40.0),
        Some(120.0),
    )
}

pub(super) fn field_input(
    application_method: ApplicationMethod,
    crop_contact_type: CropContactType,
    typical_days_before_harvest: Option<i64>,
    die_off_period_adequate: Option<bool>,
) -> FieldPracticeInput {
    FieldPracticeInput {
        id: None,
        water_source_id: None,
        application_method,
        crop_contact_type,
        typical_days_before_harvest,
        die_off_period_adequate,
    }
}

pub(super) fn drip_field() -> FieldPracticeInput {
    field_input(
        ApplicationMethod::Drip,
        CropContactType::SoilOnly,
        Some(14),
        Some(true),
    )
}

pub(super) fn quiet_environment() -> EnvironmentalInput {
    EnvironmentalInput::default()
}

pub(super) fn source_record(water_source: &str, input: SourceConditionInput) -> SourceAssessment {
    SourceAssessment::new(
        SourceAssessmentId(format!("src-{water_source}")),
        AssessmentId::from("wra-test"),
        WaterSourceId::from(water_source),
        input,
    )
}

pub(super) fn field_record(field: &str, input: FieldPracticeInput) -> FieldAssessment {
    FieldAssessment {
        id: FieldAssessmentId(format!("fld-{field}")),
        assessment_id: AssessmentId::from("wra-test"),
        field_id: field.into(),
        water_source_id: input.water_source_id,
        application_method: input.application_method,
        crop_contact_type: input.crop_contact_type,
        typical_days_before_harvest: input
            .typical_days_before_harvest
            .map(|days| u32::try_from(days).expect("non-negative days")),
        die_off_period_adequate: input.die_off_period_adequate,
    }
}

pub(super) fn environment_record(input: EnvironmentalInput) -> EnvironmentalAssessment {
    EnvironmentalAssessment::new("env-test".into(), AssessmentId::from("wra-test"), input)
}

pub(super) fn build_service() -> (AssessmentService<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::default());
    let service = AssessmentService::new(store.clone(), evaluation_config());
    (service, store)
}

pub(super) fn build_workflow() -> (AssessmentWorkflow<MemoryStore>, Arc<MemoryStore>) {
    let (service, store) = build_service();
    (AssessmentWorkflow::new(Arc::new(service)), store)
}

pub(super) fn assessment_router_with_service<S>(service: AssessmentService<S>) -> axum::Router
where
    S: AssessmentStore + 'static,
{
    assessment_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[derive(Default, Clone)]
pub(super) struct MemoryStore {
    assessments: Arc<Mutex<HashMap<AssessmentId, Assessment>>>,
    sources: Arc<Mutex<HashMap<SourceAssessmentId, SourceAssessment>>>,
    fields: Arc<Mutex<HashMap<FieldAssessmentId, FieldAssessment>>>,
    environmental: Arc<Mutex<HashMap<AssessmentId, EnvironmentalAssessment>>>,
}

impl MemoryStore {
    pub(super) fn source_count(&self) -> usize {
        self.sources.lock().expect("store mutex poisoned").len()
    }

    pub(super) fn field_count(&self) -> usize {
        self.fields.lock().expect("store mutex poisoned").len()
    }
}

impl AssessmentStore for MemoryStore {
    fn insert_assessment(&self, assessment: Assessment) -> Result<Assessment, StoreError> {
        let mut guard = self.assessments.lock().expect("store mutex poisoned");
        if guard.contains_key(&assessment.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(assessment.id.clone(), assessment.clone());
        Ok(assessment)
    }

    fn update_assessment(&self, assessment: Assessment) -> Result<(), StoreError> {
        let mut guard = self.assessments.lock().expect("store mutex poisoned");
        if !guard.contains_key(&assessment.id) {
            return Err(StoreError::NotFound);
        }
        guard.insert(assessment.id.clone(), assessment);
        Ok(())
    }

    fn fetch_assessment(&self, id: &AssessmentId) -> Result<Option<Assessment>, StoreError> {
        let guard = self.assessments.lock().expect("store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn save_source(&self, source: SourceAssessment) -> Result<SourceAssessment, StoreError> {
        let mut guard = self.sources.lock().expect("store mutex poisoned");
        guard.insert(source.id.clone(), source.clone());
        Ok(source)
    }

    fn fetch_source(
        &self,
        id: &SourceAssessmentId,
    ) -> Result<Option<SourceAssessment>, StoreError> {
        let guard = self.sources.lock().expect("store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn sources_for(&self, assessment: &AssessmentId) -> Result<Vec<SourceAssessment>, StoreError> {
        let guard = self.sources.lock().expect("store mutex poisoned");
        let mut sources: Vec<SourceAssessment> = guard
            .values()
            .filter(|source| &source.assessment_id == assessment)
            .cloned()
            .collect();
        sources.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(sources)
    }

    fn save_field(&self, field: FieldAssessment) -> Result<FieldAssessment, StoreError> {
        let mut guard = self.fields.lock().expect("store mutex poisoned");
        guard.insert(field.id.clone(), field.clone());
        Ok(field)
    }

    fn fetch_field(&self, id: &FieldAssessmentId) -> Result<Option<FieldAssessment>, StoreError> {
        let guard = self.fields.lock().expect("store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn fields_for(&self, assessment: &AssessmentId) -> Result<Vec<FieldAssessment>, StoreError> {
        let guard = self.fields.lock().expect("store mutex poisoned");
        let mut fields: Vec<FieldAssessment> = guard
            .values()
            .filter(|field| &field.assessment_id == assessment)
            .cloned()
            .collect();
        fields.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(fields)
    }

    fn save_environmental(
        &self,
        environment: EnvironmentalAssessment,
    ) -> Result<EnvironmentalAssessment, StoreError> {
        let mut guard = self.environmental.lock().expect("store mutex poisoned");
        guard.insert(environment.assessment_id.clone(), environment.clone());
        Ok(environment)
    }

    fn environmental_for(
        &self,
        assessment: &AssessmentId,
    ) -> Result<Option<EnvironmentalAssessment>, StoreError> {
        let guard = self.environmental.lock().expect("store mutex poisoned");
        Ok(guard.get(assessment).cloned())
    }
}

/// Memory store whose source saves fail for selected water sources until healed.
#[derive(Default)]
pub(super) struct FlakyStore {
    pub(super) inner: MemoryStore,
    failing_sources: Mutex<HashSet<WaterSourceId>>,
}

impl FlakyStore {
    pub(super) fn failing_for(source: &str) -> Self {
        let store = Self::default();
        store
            .failing_sources
            .lock()
            .expect("store mutex poisoned")
            .insert(WaterSourceId::from(source));
        store
    }

    pub(super) fn heal(&self) {
        self.failing_sources
            .lock()
            .expect("store mutex poisoned")
            .clear();
    }
}

impl AssessmentStore for FlakyStore {
    fn insert_assessment(&self, assessment: Assessment) -> Result<Assessment, StoreError> {
        self.inner.insert_assessment(assessment)
    }

    fn update_assessment(&self, assessment: Assessment) -> Result<(), StoreError> {
        self.inner.update_assessment(assessment)
    }

    fn fetch_assessment(&self, id: &AssessmentId) -> Result<Option<Assessment>, StoreError> {
        self.inner.fetch_assessment(id)
    }

    fn save_source(&self, source: SourceAssessment) -> Result<SourceAssessment, StoreError> {
        let failing = self
            .failing_sources
            .lock()
            .expect("store mutex poisoned")
            .contains(&source.water_source_id);
        if failing {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.save_source(source)
    }

    fn fetch_source(
        &self,
        id: &SourceAssessmentId,
    ) -> Result<Option<SourceAssessment>, StoreError> {
        self.inner.fetch_source(id)
    }

    fn sources_for(&self, assessment: &AssessmentId) -> Result<Vec<SourceAssessment>, StoreError> {
        self.inner.sources_for(assessment)
    }

    fn save_field(&self, field: FieldAssessment) -> Result<FieldAssessment, StoreError> {
        self.inner.save_field(field)
    }

    fn fetch_field(&self, id: &FieldAssessmentId) -> Result<Option<FieldAssessment>, StoreError> {
        self.inner.fetch_field(id)
    }

    fn fields_for(&self, assessment: &AssessmentId) -> Result<Vec<FieldAssessment>, StoreError> {
        self.inner.fields_for(assessment)
    }

    fn save_environmental(
        &self,
        environment: EnvironmentalAssessment,
    ) -> Result<EnvironmentalAssessment, StoreError> {
        self.inner.save_environmental(environment)
    }

    fn environmental_for(
        &self,
        assessment: &AssessmentId,
    ) -> Result<Option<EnvironmentalAssessment>, StoreError> {
        self.inner.environmental_for(assessment)
    }
}

pub(super) struct UnavailableStore;

impl AssessmentStore for UnavailableStore {
    fn insert_assessment(&self, _assessment: Assessment) -> Result<Assessment, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn update_assessment(&self, _assessment: Assessment) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn fetch_assessment(&self, _id: &AssessmentId) -> Result<Option<Assessment>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn save_source(&self, _source: SourceAssessment) -> Result<SourceAssessment, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn fetch_source(
        &self,
        _id: &SourceAssessmentId,
    ) -> Result<Option<SourceAssessment>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn sources_for(&self, _assessment: &AssessmentId) -> Result<Vec<SourceAssessment>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn save_field(&self, _field: FieldAssessment) -> Result<FieldAssessment, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn fetch_field(&self, _id: &FieldAssessmentId) -> Result<Option<FieldAssessment>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn fields_for(&self, _assessment: &AssessmentId) -> Result<Vec<FieldAssessment>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn save_environmental(
        &self,
        _environment: EnvironmentalAssessment,
    ) -> Result<EnvironmentalAssessment, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn environmental_for(
        &self,
        _assessment: &AssessmentId,
    ) -> Result<Option<EnvironmentalAssessment>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}
