use serde::{Deserialize, Serialize};

use super::super::domain::SourceAssessment;
use super::super::thresholds::{DIE_OFF_LOG_REDUCTION_PER_DAY, GM_THRESHOLD, STV_THRESHOLD};
use super::super::validation::ValidationErrors;

/// Days of die-off required before harvest for a source's E. coli geometric mean.
///
/// `None` when no GM was recorded. The log reduction above the 126 CFU/100mL
/// limit is divided by the 0.5 log/day die-off rate and rounded up once.
pub fn required_die_off_days(ecoli_gm: Option<f64>) -> Result<Option<u32>, ValidationErrors> {
    ecoli_gm
        .map(|gm| interval_days("ecoli_gm", gm, GM_THRESHOLD))
        .transpose()
}

/// Same interval computed against the 410 CFU/100mL STV limit.
pub fn required_stv_die_off_days(ecoli_stv: Option<f64>) -> Result<Option<u32>, ValidationErrors> {
    ecoli_stv
        .map(|stv| interval_days("ecoli_stv", stv, STV_THRESHOLD))
        .transpose()
}

/// Harvest interval for a source, taken from its GM. An invalid STV is still rejected.
pub fn source_die_off_days(source: &SourceAssessment) -> Result<Option<u32>, ValidationErrors> {
    if let Some(stv) = source.ecoli_stv {
        interval_days("ecoli_stv", stv, STV_THRESHOLD)?;
    }
    required_die_off_days(source.ecoli_gm)
}

/// Stand-alone die-off lookup for a lab result. `required_die_off_days`
/// follows the GM; `stv_die_off_days` is reported alongside for reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DieOffEstimate {
    pub ecoli_gm: f64,
    pub ecoli_stv: Option<f64>,
    pub gm_die_off_days: u32,
    pub stv_die_off_days: Option<u32>,
    pub required_die_off_days: u32,
}

pub fn estimate_die_off(
    ecoli_gm: f64,
    ecoli_stv: Option<f64>,
) -> Result<DieOffEstimate, ValidationErrors> {
    let gm_die_off_days = interval_days("ecoli_gm", ecoli_gm, GM_THRESHOLD)?;
    let stv_die_off_days = required_stv_die_off_days(ecoli_stv)?;
    Ok(DieOffEstimate {
        ecoli_gm,
        ecoli_stv,
        gm_die_off_days,
        stv_die_off_days,
        required_die_off_days: gm_die_off_days,
    })
}

fn interval_days(field: &str, value: f64, threshold: f64) -> Result<u32, ValidationErrors> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationErrors::single(
            field,
            "must be a positive CFU/100mL value",
        ));
    }
    if value <= threshold {
        return Ok(0);
    }

    // log10(value) - log10(threshold), taken as a single quotient so exact
    // decades (e.g. 1260 vs 126) stay exact.
    let log_reduction = (value / threshold).log10();
    let days = (log_reduction / DIE_OFF_LOG_REDUCTION_PER_DAY).ceil();
    Ok(days as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::water_assessment::domain::{
        AssessmentId, PhysicalCondition, SourceAssessmentId, SourceConditionInput,
        TestingFrequency, WaterSourceId,
    };
    use std::collections::BTreeSet;

    fn sample_source() -> SourceAssessment {
        SourceAssessment::new(
            SourceAssessmentId("src-canal".to_string()),
            AssessmentId::from("wra-test"),
            WaterSourceId::from("canal"),
            SourceConditionInput {
                id: None,
                physical_condition: PhysicalCondition::Good,
                testing_frequency: TestingFrequency::Monthly,
                ecoli_gm: Some(100.0),
                ecoli_stv: None,
                sample_count: Some(5),
                contamination_risks: BTreeSet::new(),
            },
        )
    }

    #[test]
    fn compliant_gm_needs_no_interval() {
        for gm in [0.5, 1.0, 10.0, 125.9, 126.0] {
            assert_eq!(required_die_off_days(Some(gm)).expect("valid gm"), Some(0));
        }
    }

    #[test]
    fn exceedances_round_up_to_whole_days() {
        assert_eq!(required_die_off_days(Some(252.0)).unwrap(), Some(1));
        assert_eq!(required_die_off_days(Some(500.0)).unwrap(), Some(2));
        assert_eq!(required_die_off_days(Some(1260.0)).unwrap(), Some(2));
        assert_eq!(required_die_off_days(Some(126.01)).unwrap(), Some(1));
        assert_eq!(required_die_off_days(Some(12_600.0)).unwrap(), Some(4));
    }

    #[test]
    fn interval_is_monotonic_in_gm() {
        let mut previous = 0;
        let mut gm = 1.0;
        while gm < 200_000.0 {
            let days = required_die_off_days(Some(gm))
                .expect("valid gm")
                .expect("gm present");
            assert!(days >= previous, "interval dropped at gm {gm}");
            previous = days;
            gm *= 1.07;
        }
    }

    #[test]
    fn missing_gm_yields_none() {
        assert_eq!(required_die_off_days(None).unwrap(), None);
    }

    #[test]
    fn non_positive_gm_is_rejected() {
        for gm in [0.0, -4.0, f64::NAN] {
            let err = required_die_off_days(Some(gm)).expect_err("invalid gm rejected");
            assert_eq!(err.fields[0].field, "ecoli_gm");
        }
    }

    #[test]
    fn stv_interval_uses_its_own_limit() {
        assert_eq!(required_stv_die_off_days(Some(410.0)).unwrap(), Some(0));
        assert_eq!(required_stv_die_off_days(Some(820.0)).unwrap(), Some(1));
    }

    #[test]
    fn estimate_requires_the_gm_interval_and_reports_stv() {
        let estimate = estimate_die_off(252.0, Some(4_100.0)).expect("valid lab values");
        assert_eq!(estimate.gm_die_off_days, 1);
        assert_eq!(estimate.stv_die_off_days, Some(2));
        assert_eq!(estimate.required_die_off_days, 1);

        let gm_only = estimate_die_off(100.0, None).expect("valid gm");
        assert_eq!(gm_only.required_die_off_days, 0);
        assert!(estimate_die_off(0.0, None).is_err());
    }

    #[test]
    fn source_interval_ignores_a_dominant_stv() {
        let source = SourceAssessment {
            ecoli_gm: Some(500.0),
            ecoli_stv: Some(5_000.0),
            ..sample_source()
        };
        assert_eq!(source_die_off_days(&source).unwrap(), Some(2));

        let bad_stv = SourceAssessment {
            ecoli_stv: Some(-1.0),
            ..sample_source()
        };
        let err = source_die_off_days(&bad_stv).expect_err("invalid stv rejected");
        assert_eq!(err.fields[0].field, "ecoli_stv");
    }
}
