use super::super::domain::{
    PhysicalCondition, RiskCategory, RiskFactor, SourceAssessment, TestingFrequency,
};
use super::super::thresholds::{GM_THRESHOLD, STV_THRESHOLD};
use super::{CategoryEvaluation, ScoreSheet};

const GM_BREACH_POINTS: f64 = 20.0;
const STV_BREACH_POINTS: f64 = 15.0;
const SEVERE_RISK_POINTS: f64 = 8.0;
const MINOR_RISK_POINTS: f64 = 4.0;
const CONTAMINATION_CAP: f64 = 25.0;

/// Tags mentioning these pathways are treated as severe fecal hazards.
const SEVERE_RISK_KEYWORDS: [&str; 10] = [
    "animal", "livestock", "manure", "compost", "fecal", "sewage", "septic", "runoff", "flood",
    "wildlife",
];

const fn condition_points(condition: PhysicalCondition) -> f64 {
    match condition {
        PhysicalCondition::Excellent => 0.0,
        PhysicalCondition::Good => 10.0,
        PhysicalCondition::Fair => 25.0,
        PhysicalCondition::Poor => 40.0,
    }
}

const fn testing_points(frequency: TestingFrequency) -> f64 {
    match frequency {
        TestingFrequency::Monthly => 0.0,
        TestingFrequency::Quarterly => 5.0,
        TestingFrequency::Annual => 10.0,
        TestingFrequency::NotTested => 20.0,
    }
}

fn is_severe(risk: &str) -> bool {
    let lowered = risk.to_ascii_lowercase();
    SEVERE_RISK_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// Score one water source's condition, testing cadence, lab results, and risk tags.
pub fn evaluate_source(source: &SourceAssessment) -> CategoryEvaluation {
    let mut sheet = ScoreSheet::new(RiskCategory::Source, source.water_source_id.as_str());

    sheet.add(
        RiskFactor::PhysicalCondition,
        condition_points(source.physical_condition),
        format!("{} physical condition", source.physical_condition.label()),
    );
    sheet.add(
        RiskFactor::TestingFrequency,
        testing_points(source.testing_frequency),
        format!("{} testing", source.testing_frequency.label()),
    );

    if let Some(gm) = source.ecoli_gm.filter(|_| !source.meets_gm_threshold) {
        sheet.add(
            RiskFactor::GmExceedance,
            GM_BREACH_POINTS,
            format!("E. coli GM {gm:.0} exceeds {GM_THRESHOLD:.0} CFU/100mL"),
        );
    }
    if let Some(stv) = source.ecoli_stv.filter(|_| !source.meets_stv_threshold) {
        sheet.add(
            RiskFactor::StvExceedance,
            STV_BREACH_POINTS,
            format!("E. coli STV {stv:.0} exceeds {STV_THRESHOLD:.0} CFU/100mL"),
        );
    }

    if !source.contamination_risks.is_empty() {
        let raw: f64 = source
            .contamination_risks
            .iter()
            .map(|risk| {
                if is_severe(risk) {
                    SEVERE_RISK_POINTS
                } else {
                    MINOR_RISK_POINTS
                }
            })
            .sum();
        let tags: Vec<&str> = source
            .contamination_risks
            .iter()
            .map(String::as_str)
            .collect();
        sheet.add(
            RiskFactor::ContaminationRisk,
            raw.min(CONTAMINATION_CAP),
            format!("contamination risks: {}", tags.join(", ")),
        );
    }

    if source.lab_data_missing() {
        sheet.warn("no E. coli GM or STV results recorded; water testing is required");
    }

    sheet.finish()
}

#[cfg(test)]
mod tests {
    use super::super::super::domain::{
        AssessmentId, SourceAssessment, SourceAssessmentId, SourceConditionInput, WaterSourceId,
    };
    use super::*;
    use std::collections::BTreeSet;

    fn source(input: SourceConditionInput) -> SourceAssessment {
        SourceAssessment::new(
            SourceAssessmentId::from("sa-1"),
            AssessmentId::from("wra-1"),
            WaterSourceId::from("well-north"),
            input,
        )
    }

    fn input(condition: PhysicalCondition, testing: TestingFrequency) -> SourceConditionInput {
        SourceConditionInput {
            id: None,
            physical_condition: condition,
            testing_frequency: testing,
            ecoli_gm: Some(20.0),
            ecoli_stv: Some(80.0),
            sample_count: None,
            contamination_risks: BTreeSet::new(),
        }
    }

    #[test]
    fn well_kept_source_scores_low() {
        let evaluation = evaluate_source(&source(input(
            PhysicalCondition::Excellent,
            TestingFrequency::Monthly,
        )));
        assert_eq!(evaluation.score, 0.0);
        assert!(evaluation.top_factor().is_none());
        assert!(evaluation.warnings.is_empty());
    }

    #[test]
    fn breaches_and_condition_accumulate() {
        let mut raw = input(PhysicalCondition::Poor, TestingFrequency::NotTested);
        raw.ecoli_gm = Some(300.0);
        raw.ecoli_stv = Some(900.0);
        let evaluation = evaluate_source(&source(raw));

        assert_eq!(evaluation.score, 40.0 + 20.0 + 20.0 + 15.0);
        let top = evaluation.top_factor().expect("top factor present");
        assert_eq!(top.factor, RiskFactor::PhysicalCondition);
    }

    #[test]
    fn contamination_points_weigh_severity_and_cap() {
        let mut raw = input(PhysicalCondition::Excellent, TestingFrequency::Monthly);
        raw.contamination_risks = ["Cattle runoff", "algae"]
            .into_iter()
            .map(str::to_string)
            .collect();
        assert_eq!(evaluate_source(&source(raw.clone())).score, 12.0);

        raw.contamination_risks = ["manure pile", "septic field", "sewage outfall", "flood plain"]
            .into_iter()
            .map(str::to_string)
            .collect();
        assert_eq!(evaluate_source(&source(raw)).score, CONTAMINATION_CAP);
    }

    #[test]
    fn missing_lab_data_is_not_a_breach_but_is_flagged() {
        let mut raw = input(PhysicalCondition::Good, TestingFrequency::Annual);
        raw.ecoli_gm = None;
        raw.ecoli_stv = None;
        let evaluation = evaluate_source(&source(raw));

        assert_eq!(evaluation.score, 20.0);
        assert_eq!(evaluation.warnings.len(), 1);
        assert!(evaluation
            .components
            .iter()
            .all(|component| component.factor != RiskFactor::GmExceedance));
    }

    #[test]
    fn score_saturates_at_one_hundred() {
        let mut raw = input(PhysicalCondition::Poor, TestingFrequency::NotTested);
        raw.ecoli_gm = Some(5_000.0);
        raw.ecoli_stv = Some(9_000.0);
        raw.contamination_risks = ["manure", "sewage", "septic", "runoff"]
            .into_iter()
            .map(str::to_string)
            .collect();
        assert_eq!(evaluate_source(&source(raw)).score, 100.0);
    }
}
