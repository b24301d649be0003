use agwater::workflows::water_assessment::{
    Assessment, AssessmentId, AssessmentStore, EnvironmentalAssessment, FieldAssessment,
    FieldAssessmentId, SourceAssessment, SourceAssessmentId, StoreError,
};
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local store used by the server and the CLI demo.
#[derive(Default, Clone)]
pub(crate) struct InMemoryAssessmentStore {
    assessments: Arc<Mutex<HashMap<AssessmentId, Assessment>>>,
    sources: Arc<Mutex<HashMap<SourceAssessmentId, SourceAssessment>>>,
    fields: Arc<Mutex<HashMap<FieldAssessmentId, FieldAssessment>>>,
    environmental: Arc<Mutex<HashMap<AssessmentId, EnvironmentalAssessment>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))
}

impl AssessmentStore for InMemoryAssessmentStore {
    fn insert_assessment(&self, assessment: Assessment) -> Result<Assessment, StoreError> {
        let mut guard = lock(&self.assessments)?;
        if guard.contains_key(&assessment.id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(assessment.id.clone(), assessment.clone());
        Ok(assessment)
    }

    fn update_assessment(&self, assessment: Assessment) -> Result<(), StoreError> {
        let mut guard = lock(&self.assessments)?;
        if guard.contains_key(&assessment.id) {
            guard.insert(assessment.id.clone(), assessment);
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }

    fn fetch_assessment(&self, id: &AssessmentId) -> Result<Option<Assessment>, StoreError> {
        Ok(lock(&self.assessments)?.get(id).cloned())
    }

    fn save_source(&self, source: SourceAssessment) -> Result<SourceAssessment, StoreError> {
        lock(&self.sources)?.insert(source.id.clone(), source.clone());
        Ok(source)
    }

    fn fetch_source(
        &self,
        id: &SourceAssessmentId,
    ) -> Result<Option<SourceAssessment>, StoreError> {
        Ok(lock(&self.sources)?.get(id).cloned())
    }

    fn sources_for(&self, assessment: &AssessmentId) -> Result<Vec<SourceAssessment>, StoreError> {
        let mut sources: Vec<SourceAssessment> = lock(&self.sources)?
            .values()
            .filter(|source| &source.assessment_id == assessment)
            .cloned()
            .collect();
        sources.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(sources)
    }

    fn save_field(&self, field: FieldAssessment) -> Result<FieldAssessment, StoreError> {
        lock(&self.fields)?.insert(field.id.clone(), field.clone());
        Ok(field)
    }

    fn fetch_field(&self, id: &FieldAssessmentId) -> Result<Option<FieldAssessment>, StoreError> {
        Ok(lock(&self.fields)?.get(id).cloned())
    }

    fn fields_for(&self, assessment: &AssessmentId) -> Result<Vec<FieldAssessment>, StoreError> {
        let mut fields: Vec<FieldAssessment> = lock(&self.fields)?
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
        lock(&self.environmental)?.insert(environment.assessment_id.clone(), environment.clone());
        Ok(environment)
    }

    fn environmental_for(
        &self,
        assessment: &AssessmentId,
    ) -> Result<Option<EnvironmentalAssessment>, StoreError> {
        Ok(lock(&self.environmental)?.get(assessment).cloned())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agwater::workflows::water_assessment::{
        PhysicalCondition, SourceConditionInput, TestingFrequency, WaterSourceId,
    };

    fn source(id: &str, assessment: &str) -> SourceAssessment {
        SourceAssessment::new(
            SourceAssessmentId::from(id),
            AssessmentId::from(assessment),
            WaterSourceId::from("well-1"),
            SourceConditionInput {
                id: None,
                physical_condition: PhysicalCondition::Good,
                testing_frequency: TestingFrequency::Monthly,
                ecoli_gm: Some(12.0),
                ecoli_stv: None,
                sample_count: None,
                contamination_risks: Default::default(),
            },
        )
    }

    #[test]
    fn source_saves_are_upserts_scoped_to_their_assessment() {
        let store = InMemoryAssessmentStore::default();
        store.save_source(source("src-000002", "wra-a")).expect("save");
        store.save_source(source("src-000001", "wra-a")).expect("save");
        store.save_source(source("src-000001", "wra-a")).expect("resave");
        store.save_source(source("src-000003", "wra-b")).expect("save");

        let ids: Vec<String> = store
            .sources_for(&AssessmentId::from("wra-a"))
            .expect("sources")
            .into_iter()
            .map(|source| source.id.to_string())
            .collect();
        assert_eq!(ids, vec!["src-000001", "src-000002"]);
    }

    #[test]
    fn parse_date_reports_the_raw_value() {
        assert_eq!(
            parse_date(" 2025-05-01 "),
            Ok(NaiveDate::from_ymd_opt(2025, 5, 1).expect("valid date"))
        );
        let error = parse_date("05/01/2025").expect_err("wrong format");
        assert!(error.contains("05/01/2025"));
    }
}
