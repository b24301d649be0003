use super::super::domain::{
    EnvironmentalAssessment, RiskCategory, RiskFactor, WildlifePressure,
};
use super::{CategoryEvaluation, ScoreSheet};

pub const ENVIRONMENT_SUBJECT: &str = "environment";

const CAFO_POINTS: f64 = 30.0;
const NEAR_FIELD_FT: f64 = 400.0;
const FAR_FIELD_FT: f64 = 1000.0;
const NEAR_FIELD_POINTS: f64 = 20.0;
const RECENT_FLOOD_POINTS: f64 = 20.0;
const HISTORIC_FLOOD_POINTS: f64 = 8.0;
const SEPTIC_POINTS: f64 = 10.0;
const ELEVATED_LAND_USE_POINTS: f64 = 8.0;
const ORDINARY_LAND_USE_POINTS: f64 = 2.0;
const ADDITIONAL_RISK_POINTS: f64 = 3.0;
const ADDITIONAL_RISK_CAP: f64 = 15.0;

const fn wildlife_points(pressure: WildlifePressure) -> f64 {
    match pressure {
        WildlifePressure::Low => 0.0,
        WildlifePressure::Medium => 8.0,
        WildlifePressure::High => 15.0,
    }
}

/// Inverse-distance points; full weight inside the near-field cutoff, none past 1000 ft.
fn distance_points(distance_ft: f64) -> f64 {
    if distance_ft < NEAR_FIELD_FT {
        NEAR_FIELD_POINTS
    } else if distance_ft < FAR_FIELD_FT {
        (NEAR_FIELD_POINTS * NEAR_FIELD_FT / distance_ft).round()
    } else {
        0.0
    }
}

/// Score assessment-wide hazards around the growing area.
pub fn evaluate_environment(environment: &EnvironmentalAssessment) -> CategoryEvaluation {
    let mut sheet = ScoreSheet::new(RiskCategory::Environmental, ENVIRONMENT_SUBJECT);

    if environment.cafo_within_1000ft {
        sheet.add(
            RiskFactor::CafoProximity,
            CAFO_POINTS,
            "CAFO within 1000 ft".to_string(),
        );
    }

    if let Some(distance) = environment.nearest_animal_operation_ft {
        let points = distance_points(distance);
        if points > 0.0 {
            let notes = if distance < NEAR_FIELD_FT {
                format!("animal operation {distance:.0} ft away, inside the {NEAR_FIELD_FT:.0} ft near field")
            } else {
                format!("animal operation {distance:.0} ft away")
            };
            sheet.add(RiskFactor::AnimalOperationDistance, points, notes);
        }
    }

    if environment.flooding_last_12_months {
        sheet.add(
            RiskFactor::Flooding,
            RECENT_FLOOD_POINTS,
            "flooding within the last 12 months".to_string(),
        );
    } else if environment.flooding_history {
        sheet.add(
            RiskFactor::Flooding,
            HISTORIC_FLOOD_POINTS,
            "historic flooding".to_string(),
        );
    }

    if environment.septic_nearby {
        sheet.add(
            RiskFactor::SepticProximity,
            SEPTIC_POINTS,
            "septic system nearby".to_string(),
        );
    }

    let wildlife = wildlife_points(environment.wildlife_pressure);
    if wildlife > 0.0 {
        sheet.add(
            RiskFactor::WildlifePressure,
            wildlife,
            format!("{:?} wildlife pressure", environment.wildlife_pressure).to_lowercase(),
        );
    }

    if !environment.adjacent_land_uses.is_empty() {
        let points: f64 = environment
            .adjacent_land_uses
            .iter()
            .map(|land_use| {
                if land_use.is_elevated() {
                    ELEVATED_LAND_USE_POINTS
                } else {
                    ORDINARY_LAND_USE_POINTS
                }
            })
            .sum();
        let labels: Vec<&str> = environment
            .adjacent_land_uses
            .iter()
            .map(|land_use| land_use.label())
            .collect();
        sheet.add(
            RiskFactor::AdjacentLandUse,
            points,
            format!("adjacent land use: {}", labels.join(", ")),
        );
    }

    if !environment.additional_risks.is_empty() {
        let points = (environment.additional_risks.len() as f64 * ADDITIONAL_RISK_POINTS)
            .min(ADDITIONAL_RISK_CAP);
        sheet.add(
            RiskFactor::AdditionalRisk,
            points,
            format!(
                "additional risks: {}",
                environment.additional_risks.join(", ")
            ),
        );
    }

    sheet.finish()
}
