use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::super::domain::{
    ActionPriority, FdaDetermination, FieldAssessment, MitigationAction, RiskCategory,
    RiskLevel, ScoreComponent, SourceAssessment,
};
use super::super::thresholds::risk_level_for;
use super::aggregate::{AggregateScore, CategoryScores};
use super::config::EvaluationConfig;

/// Lab-derived facts about one source that the determination depends on.
pub(crate) struct SourceSignal<'a> {
    pub source: &'a SourceAssessment,
    pub die_off_days: Option<u32>,
}

pub(crate) struct DeterminationInputs<'a> {
    pub sources: &'a [SourceSignal<'a>],
    pub fields: &'a [FieldAssessment],
    pub aggregate: AggregateScore,
    pub category_scores: CategoryScores,
    pub top_factors: &'a BTreeMap<RiskCategory, ScoreComponent>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Determination {
    pub fda_determination: FdaDetermination,
    pub required_die_off_days: Option<u32>,
    pub actions: Vec<MitigationAction>,
}

struct ActionPlanner<'a> {
    config: &'a EvaluationConfig,
    reference_date: NaiveDate,
    actions: Vec<MitigationAction>,
}

impl ActionPlanner<'_> {
    fn push(
        &mut self,
        category: Option<RiskCategory>,
        priority: ActionPriority,
        action_description: String,
    ) {
        self.actions.push(MitigationAction {
            category,
            action_description,
            priority,
            due_date: self.config.due_date_for(priority, self.reference_date),
        });
    }
}

/// A breaching source needs die-off unless every field it feeds records an adequate interval.
fn needs_die_off(source: &SourceAssessment, fields: &[FieldAssessment]) -> bool {
    let mut drawing = fields
        .iter()
        .filter(|field| field.draws_from(&source.water_source_id))
        .peekable();
    if drawing.peek().is_none() {
        return true;
    }
    drawing.any(|field| field.die_off_period_adequate != Some(true))
}

pub(crate) fn decide_determination(
    inputs: &DeterminationInputs<'_>,
    config: &EvaluationConfig,
    reference_date: NaiveDate,
) -> Determination {
    let mut planner = ActionPlanner {
        config,
        reference_date,
        actions: Vec::new(),
    };

    let die_off_sources: Vec<&SourceSignal<'_>> = inputs
        .sources
        .iter()
        .filter(|signal| signal.source.breaches_threshold())
        .filter(|signal| needs_die_off(signal.source, inputs.fields))
        .collect();

    let (fda_determination, required_die_off_days) = if !die_off_sources.is_empty() {
        let worst = die_off_sources
            .iter()
            .max_by_key(|signal| signal.die_off_days.unwrap_or(0));
        let days = worst.and_then(|signal| signal.die_off_days);
        let source_names: Vec<&str> = die_off_sources
            .iter()
            .map(|signal| signal.source.water_source_id.as_str())
            .collect();
        planner.push(
            Some(RiskCategory::Timing),
            ActionPriority::Critical,
            format!(
                "Observe a die-off interval of at least {} day(s) between the last application of water from {} and harvest",
                days.unwrap_or(0),
                source_names.join(", ")
            ),
        );
        (FdaDetermination::DieOffRequired, days)
    } else if inputs.aggregate.risk_level == Some(RiskLevel::Critical) {
        planner.push(
            None,
            ActionPriority::Critical,
            format!(
                "Treat agricultural water before further application; overall risk {:.1} is critical",
                inputs.aggregate.overall.unwrap_or_default()
            ),
        );
        (FdaDetermination::TreatmentRequired, None)
    } else if inputs
        .sources
        .iter()
        .any(|signal| signal.source.lab_data_missing())
    {
        for signal in inputs
            .sources
            .iter()
            .filter(|signal| signal.source.lab_data_missing())
        {
            planner.push(
                Some(RiskCategory::Source),
                ActionPriority::High,
                format!(
                    "Obtain E. coli water quality tests (GM and STV) for source {}",
                    signal.source.water_source_id
                ),
            );
        }
        (FdaDetermination::TestingRequired, None)
    } else {
        (FdaDetermination::NoTreatment, None)
    };

    for category in RiskCategory::ordered() {
        let Some(score) = inputs.category_scores.get(category) else {
            continue;
        };
        let level = risk_level_for(score);
        if !level.is_elevated() {
            continue;
        }
        if let Some(top) = inputs.top_factors.get(&category) {
            planner.push(
                Some(category),
                ActionPriority::from(level),
                format!(
                    "{}: {} ({} at {})",
                    category.label(),
                    top.factor.remediation(),
                    top.notes,
                    top.subject
                ),
            );
        }
    }

    Determination {
        fda_determination,
        required_die_off_days,
        actions: planner.actions,
    }
}
