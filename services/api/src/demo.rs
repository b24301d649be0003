use crate::infra::InMemoryAssessmentStore;
use agwater::error::AppError;
use agwater::workflows::lab_results::{LabResultsImporter, WaterQualityProfile};
use agwater::workflows::water_assessment::{
    estimate_die_off, AdjacentLandUse, ApplicationMethod, AssessmentError, AssessmentService,
    AssessmentWorkflow, CropContactType, EnvironmentalInput, EvaluationConfig, FarmId,
    FieldDraft, FieldId, PhysicalCondition, RiskScoreResult, Signature, SourceConditionInput,
    TestingFrequency, WaterSourceId, WildlifePressure, WizardState, WorkflowError,
};
use chrono::{Datelike, Local, NaiveDate};
use clap::Args;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DieOffArgs {
    /// E. coli geometric mean in CFU/100mL
    #[arg(long)]
    pub(crate) ecoli_gm: f64,
    /// Optional statistical threshold value in CFU/100mL
    #[arg(long)]
    pub(crate) ecoli_stv: Option<f64>,
}

#[derive(Args, Debug)]
pub(crate) struct LabSummaryArgs {
    /// Lab results export with water_source_id, sampled_on, ecoli_cfu_per_100ml columns
    #[arg(long)]
    pub(crate) csv: PathBuf,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Assessment date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) assessment_date: Option<NaiveDate>,
    /// Optional lab results CSV used to fill in the demo well's E. coli values
    #[arg(long)]
    pub(crate) lab_csv: Option<PathBuf>,
    /// Print the final wizard state as JSON
    #[arg(long)]
    pub(crate) show_state: bool,
}

pub(crate) fn run_die_off(args: DieOffArgs) -> Result<(), AppError> {
    let estimate =
        estimate_die_off(args.ecoli_gm, args.ecoli_stv).map_err(AssessmentError::from)?;

    println!("Die-off estimate");
    println!(
        "- GM {:.1} CFU/100mL -> {} day(s)",
        estimate.ecoli_gm, estimate.gm_die_off_days
    );
    if let (Some(stv), Some(days)) = (estimate.ecoli_stv, estimate.stv_die_off_days) {
        println!("- STV {:.1} CFU/100mL -> {} day(s)", stv, days);
    }
    if estimate.required_die_off_days == 0 {
        println!("- Water meets microbial criteria; no die-off interval required");
    } else {
        println!(
            "- Allow at least {} day(s) between the last application and harvest",
            estimate.required_die_off_days
        );
    }
    Ok(())
}

pub(crate) fn run_lab_summary(args: LabSummaryArgs) -> Result<(), AppError> {
    let profiles = LabResultsImporter::from_path(&args.csv)?;
    println!("Lab results summary ({} source(s))", profiles.len());
    for profile in &profiles {
        render_profile(profile);
    }
    Ok(())
}

fn render_profile(profile: &WaterQualityProfile) {
    let stv = profile
        .statistical_threshold_value
        .map(|value| format!("{value:.1}"))
        .unwrap_or_else(|| "n/a".to_string());
    println!(
        "- {}: {} sample(s), {} non-detect(s) | GM {:.1} ({}) | STV {} ({}) | {} to {}",
        profile.water_source_id,
        profile.sample_count,
        profile.non_detects,
        profile.geometric_mean,
        pass_label(profile.meets_gm_threshold()),
        stv,
        pass_label(profile.meets_stv_threshold()),
        profile.first_sampled_on,
        profile.last_sampled_on
    );
}

fn pass_label(passes: bool) -> &'static str {
    if passes {
        "meets criteria"
    } else {
        "exceeds criteria"
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        assessment_date,
        lab_csv,
        show_state,
    } = args;

    let assessment_date = assessment_date.unwrap_or_else(|| Local::now().date_naive());
    let profiles = match lab_csv {
        Some(path) => LabResultsImporter::from_path(path)?,
        None => Vec::new(),
    };

    let store = Arc::new(InMemoryAssessmentStore::default());
    let service = Arc::new(AssessmentService::new(store, EvaluationConfig::default()));
    let workflow = AssessmentWorkflow::new(service.clone());

    println!("Agricultural water risk assessment demo");
    let mut state = WizardState::new();
    if let Err(err) = drive_wizard(&workflow, &mut state, assessment_date, &profiles) {
        println!("  Wizard stopped at {}: {}", state.step, err);
        return Ok(());
    }

    let Some(assessment_id) = state.assessment_id.clone() else {
        println!("  Wizard finished without an assessment");
        return Ok(());
    };
    let record = match service.get_assessment(&assessment_id) {
        Ok(record) => record,
        Err(err) => {
            println!("  Assessment lookup failed: {}", err);
            return Ok(());
        }
    };
    println!(
        "\nSubmitted assessment {} -> status {}",
        record.assessment.id,
        record.assessment.status.label()
    );
    match serde_json::to_string_pretty(&record.status_view()) {
        Ok(json) => println!("  Status payload:\n{}", json),
        Err(err) => println!("  Status payload unavailable: {}", err),
    }
    if show_state {
        match serde_json::to_string_pretty(&state) {
            Ok(json) => println!("  Wizard state:\n{}", json),
            Err(err) => println!("  Wizard state unavailable: {}", err),
        }
    }

    Ok(())
}

/// Fills every wizard step for a two-source, two-field farm and submits it.
fn drive_wizard(
    workflow: &AssessmentWorkflow<InMemoryAssessmentStore>,
    state: &mut WizardState,
    assessment_date: NaiveDate,
    profiles: &[WaterQualityProfile],
) -> Result<(), WorkflowError> {
    state.select_farm(FarmId::from("demo-farm"), assessment_date.year());
    state.set_assessment_date(assessment_date);
    state.set_notes("Pre-season review of irrigation water");
    step(workflow, state)?;

    let well = WaterSourceId::from("well-1");
    let canal = WaterSourceId::from("canal");
    state.select_source(well.clone());
    state.select_source(canal.clone());
    step(workflow, state)?;

    let mut well_input = demo_source(PhysicalCondition::Good, TestingFrequency::Quarterly);
    well_input.ecoli_gm = Some(48.0);
    well_input.ecoli_stv = Some(180.0);
    if let Some(profile) = profiles.iter().find(|profile| profile.water_source_id == well) {
        println!("  Using lab results for {}", profile.water_source_id);
        profile.apply_to(&mut well_input);
    }
    let mut canal_input = demo_source(PhysicalCondition::Fair, TestingFrequency::Monthly);
    canal_input.ecoli_gm = Some(310.0);
    canal_input.ecoli_stv = Some(1900.0);
    canal_input.contamination_risks = BTreeSet::from(["upstream grazing".to_string()]);
    state.set_source_draft(well.clone(), well_input);
    state.set_source_draft(canal.clone(), canal_input);
    step(workflow, state)?;

    let lettuce = FieldId::from("north-lettuce");
    let squash = FieldId::from("south-squash");
    state.select_field(lettuce.clone());
    state.select_field(squash.clone());
    step(workflow, state)?;

    state.set_field_draft(
        lettuce,
        FieldDraft {
            water_source_id: Some(canal),
            application_method: Some(ApplicationMethod::Overhead),
            crop_contact_type: Some(CropContactType::Direct),
            typical_days_before_harvest: Some(1),
            die_off_period_adequate: Some(false),
            ..FieldDraft::default()
        },
    );
    state.set_field_draft(
        squash,
        FieldDraft {
            water_source_id: Some(well),
            application_method: Some(ApplicationMethod::Drip),
            crop_contact_type: Some(CropContactType::Indirect),
            typical_days_before_harvest: Some(10),
            die_off_period_adequate: Some(true),
            ..FieldDraft::default()
        },
    );
    step(workflow, state)?;

    state.set_environmental(EnvironmentalInput {
        nearest_animal_operation_ft: Some(2400.0),
        flooding_history: true,
        wildlife_pressure: WildlifePressure::Medium,
        adjacent_land_uses: BTreeSet::from([AdjacentLandUse::Grazing]),
        ..EnvironmentalInput::default()
    });
    step(workflow, state)?;

    render_risk(workflow.compute_risk(state)?);
    step(workflow, state)?;

    state.capture_signature(Signature {
        signer_name: "Demo Food Safety Lead".to_string(),
        signature_blob: "demo-signature".to_string(),
    });
    workflow.submit(state)?;
    Ok(())
}

fn step(
    workflow: &AssessmentWorkflow<InMemoryAssessmentStore>,
    state: &mut WizardState,
) -> Result<(), WorkflowError> {
    let from = state.step;
    let to = workflow.advance(state)?;
    println!("- Completed {} -> {}", from, to);
    Ok(())
}

fn demo_source(
    physical_condition: PhysicalCondition,
    testing_frequency: TestingFrequency,
) -> SourceConditionInput {
    SourceConditionInput {
        id: None,
        physical_condition,
        testing_frequency,
        ecoli_gm: None,
        ecoli_stv: None,
        sample_count: None,
        contamination_risks: BTreeSet::new(),
    }
}

fn render_risk(result: &RiskScoreResult) {
    println!("\nRisk review");
    println!("- {}", result.summary());
    let categories = [
        ("source", result.source_risk_score),
        ("application", result.application_risk_score),
        ("environmental", result.environmental_risk_score),
        ("timing", result.timing_risk_score),
    ];
    for (name, score) in categories {
        match score {
            Some(score) => println!("  - {name}: {score:.1}"),
            None => println!("  - {name}: not scored"),
        }
    }
    for warning in &result.warnings {
        println!("  ! {}: {}", warning.subject, warning.message);
    }
    if result.mitigation_actions.is_empty() {
        println!("  Mitigation actions: none");
    } else {
        println!("  Mitigation actions:");
        for action in &result.mitigation_actions {
            let due = action
                .due_date
                .map(|date| format!(" (due {date})"))
                .unwrap_or_default();
            println!(
                "    - [{:?}] {}{}",
                action.priority,
                action.action_description,
                due
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::parse_date;

    #[test]
    fn demo_completes_without_lab_results() {
        let args = DemoArgs {
            assessment_date: Some(parse_date("2025-05-01").expect("valid date")),
            lab_csv: None,
            show_state: false,
        };
        run_demo(args).expect("demo runs");
    }

    #[test]
    fn die_off_rejects_non_positive_gm() {
        let error = run_die_off(DieOffArgs {
            ecoli_gm: 0.0,
            ecoli_stv: None,
        })
        .expect_err("gm must be positive");
        assert!(error.to_string().contains("ecoli_gm"));
    }

    #[test]
    fn lab_summary_reports_missing_files() {
        let error = run_lab_summary(LabSummaryArgs {
            csv: PathBuf::from("./no-such-lab-export.csv"),
        })
        .expect_err("missing file");
        assert!(matches!(error, AppError::LabImport(_)));
    }
}
