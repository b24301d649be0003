use super::super::domain::{
    ApplicationMethod, CropContactType, FieldAssessment, RiskCategory, RiskFactor,
};
use super::super::thresholds::{crop_contact_tier, irrigation_tier};
use super::{CategoryEvaluation, ScoreSheet};

/// Crop contact decides produce exposure, so it outweighs the delivery method.
const METHOD_SHARE: f64 = 0.4;
const CONTACT_SHARE: f64 = 0.6;

const INADEQUATE_INTERVAL_POINTS: f64 = 80.0;
const SHORTFALL_POINTS_PER_DAY: f64 = 5.0;
const UNKNOWN_INTERVAL_POINTS: f64 = 60.0;
const UNTESTED_WATER_POINTS: f64 = 30.0;
const RESIDUAL_INTERVAL_POINTS: f64 = 10.0;

/// Score one field's irrigation method and crop contact exposure.
pub fn evaluate_field_practice(field: &FieldAssessment) -> CategoryEvaluation {
    let mut sheet = ScoreSheet::new(RiskCategory::Application, field.field_id.as_str());

    let method_tier = irrigation_tier(field.application_method);
    let contact_tier = crop_contact_tier(field.crop_contact_type);

    sheet.add(
        RiskFactor::IrrigationMethod,
        METHOD_SHARE * method_tier.weight(),
        format!(
            "{} irrigation ({:?} tier)",
            field.application_method.label(),
            method_tier
        ),
    );
    sheet.add(
        RiskFactor::CropContact,
        CONTACT_SHARE * contact_tier.weight(),
        format!(
            "{} crop contact ({:?} tier)",
            field.crop_contact_type.label(),
            contact_tier
        ),
    );

    if field.application_method == ApplicationMethod::NoIrrigation
        && field.crop_contact_type == CropContactType::Direct
    {
        sheet.warn("no irrigation recorded but crop contact is direct; confirm the application method");
    }

    sheet.finish()
}

/// Score one field's harvest interval against the die-off its water requires.
///
/// `required_days` is the worst interval across the sources the field draws
/// from, or `None` when those sources have no lab data.
pub fn evaluate_timing(field: &FieldAssessment, required_days: Option<u32>) -> CategoryEvaluation {
    let mut sheet = ScoreSheet::new(RiskCategory::Timing, field.field_id.as_str());
    let shortfall = match (required_days, field.typical_days_before_harvest) {
        (Some(required), Some(typical)) => required.saturating_sub(typical),
        _ => 0,
    };
    let shortfall_points = f64::from(shortfall) * SHORTFALL_POINTS_PER_DAY;

    let (points, notes) = match (field.die_off_period_adequate, required_days) {
        (Some(false), _) => (
            INADEQUATE_INTERVAL_POINTS + shortfall_points,
            "die-off period recorded as inadequate".to_string(),
        ),
        (_, Some(0)) => (0.0, "water meets criteria; no die-off interval needed".to_string()),
        (Some(true), Some(required)) => (
            RESIDUAL_INTERVAL_POINTS,
            format!("adequate die-off recorded against {required} required day(s)"),
        ),
        (None, Some(required)) => match field.typical_days_before_harvest {
            Some(typical) if typical >= required => (
                RESIDUAL_INTERVAL_POINTS,
                format!("{typical} day(s) before harvest covers {required} required"),
            ),
            Some(typical) => (
                INADEQUATE_INTERVAL_POINTS + shortfall_points,
                format!("{typical} day(s) before harvest is short of {required} required"),
            ),
            None => (
                UNKNOWN_INTERVAL_POINTS,
                format!("harvest interval unknown against {required} required day(s)"),
            ),
        },
        (Some(true), None) => (
            RESIDUAL_INTERVAL_POINTS,
            "adequate die-off recorded; water untested".to_string(),
        ),
        (None, None) => (
            UNTESTED_WATER_POINTS,
            "required die-off unknown without water test results".to_string(),
        ),
    };

    sheet.add(RiskFactor::HarvestInterval, points, notes);
    sheet.finish()
}

#[cfg(test)]
mod tests {
    use super::super::super::domain::{AssessmentId, FieldAssessmentId, FieldId};
    use super::*;

    fn field(method: ApplicationMethod, contact: CropContactType) -> FieldAssessment {
        FieldAssessment {
            id: FieldAssessmentId::from("fa-1"),
            assessment_id: AssessmentId::from("wra-1"),
            field_id: FieldId::from("block-7"),
            water_source_id: None,
            application_method: method,
            crop_contact_type: contact,
            typical_days_before_harvest: None,
            die_off_period_adequate: None,
        }
    }

    #[test]
    fn contact_is_weighted_more_than_method() {
        let drip_direct = evaluate_field_practice(&field(
            ApplicationMethod::Drip,
            CropContactType::Direct,
        ));
        let overhead_soil = evaluate_field_practice(&field(
            ApplicationMethod::Overhead,
            CropContactType::SoilOnly,
        ));
        assert!((drip_direct.score - 58.0).abs() < 1e-9);
        assert!((overhead_soil.score - 42.0).abs() < 1e-9);
        assert_eq!(
            drip_direct.top_factor().map(|component| component.factor),
            Some(RiskFactor::CropContact)
        );
    }

    #[test]
    fn worst_practice_is_high_band() {
        let evaluation = evaluate_field_practice(&field(
            ApplicationMethod::Overhead,
            CropContactType::Direct,
        ));
        assert!((evaluation.score - 90.0).abs() < 1e-9);
    }

    #[test]
    fn contradictory_no_irrigation_with_direct_contact_is_flagged() {
        let evaluation = evaluate_field_practice(&field(
            ApplicationMethod::NoIrrigation,
            CropContactType::Direct,
        ));
        assert_eq!(evaluation.warnings.len(), 1);
        assert_eq!(evaluation.warnings[0].subject, "block-7");
        assert!(evaluation.score > 0.0);
    }

    #[test]
    fn timing_reflects_interval_against_requirement() {
        let mut subject = field(ApplicationMethod::Drip, CropContactType::Direct);
        assert_eq!(evaluate_timing(&subject, Some(0)).score, 0.0);
        assert_eq!(evaluate_timing(&subject, Some(2)).score, 60.0);
        assert_eq!(evaluate_timing(&subject, None).score, 30.0);

        subject.typical_days_before_harvest = Some(1);
        assert_eq!(evaluate_timing(&subject, Some(3)).score, 90.0);
        subject.typical_days_before_harvest = Some(4);
        assert_eq!(evaluate_timing(&subject, Some(3)).score, 10.0);

        subject.die_off_period_adequate = Some(false);
        assert_eq!(evaluate_timing(&subject, Some(0)).score, 80.0);
        subject.die_off_period_adequate = Some(true);
        assert_eq!(evaluate_timing(&subject, Some(3)).score, 10.0);
    }
}
