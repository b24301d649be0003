mod aggregate;
mod config;
mod die_off;
mod environmental;
mod field;
mod policy;
mod source;

pub use aggregate::{aggregate, worst_of, AggregateScore, CategoryScores};
pub use config::EvaluationConfig;
pub use die_off::{
    estimate_die_off, required_die_off_days, required_stv_die_off_days, source_die_off_days,
    DieOffEstimate,
};
pub use environmental::evaluate_environment;
pub use field::{evaluate_field_practice, evaluate_timing};
pub use source::evaluate_source;

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    DataQualityWarning, EnvironmentalAssessment, FieldAssessment, RiskCategory, RiskFactor,
    RiskScoreResult, ScoreComponent, SourceAssessment,
};
use super::thresholds::clamp_score;
use super::validation::ValidationErrors;
use policy::{decide_determination, DeterminationInputs, SourceSignal};

/// Score for one entity within one category, with its audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEvaluation {
    pub category: RiskCategory,
    pub subject: String,
    pub score: f64,
    pub components: Vec<ScoreComponent>,
    pub warnings: Vec<DataQualityWarning>,
}

impl CategoryEvaluation {
    /// Largest positive contribution, used to phrase mitigation actions.
    pub fn top_factor(&self) -> Option<&ScoreComponent> {
        top_component(self.components.iter())
    }
}

fn top_component<'a, I>(components: I) -> Option<&'a ScoreComponent>
where
    I: IntoIterator<Item = &'a ScoreComponent>,
{
    components
        .into_iter()
        .filter(|component| component.points > 0.0)
        .fold(None, |best: Option<&ScoreComponent>, component| match best {
            Some(current) if current.points >= component.points => Some(current),
            _ => Some(component),
        })
}

/// Additive accumulator shared by the evaluators.
pub(crate) struct ScoreSheet {
    category: RiskCategory,
    subject: String,
    components: Vec<ScoreComponent>,
    warnings: Vec<DataQualityWarning>,
}

impl ScoreSheet {
    pub(crate) fn new(category: RiskCategory, subject: &str) -> Self {
        Self {
            category,
            subject: subject.to_string(),
            components: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, factor: RiskFactor, points: f64, notes: String) {
        self.components.push(ScoreComponent {
            category: self.category,
            subject: self.subject.clone(),
            factor,
            points,
            notes,
        });
    }

    pub(crate) fn warn(&mut self, message: &str) {
        self.warnings.push(DataQualityWarning {
            subject: self.subject.clone(),
            message: message.to_string(),
        });
    }

    pub(crate) fn finish(self) -> CategoryEvaluation {
        let raw: f64 = self.components.iter().map(|component| component.points).sum();
        CategoryEvaluation {
            category: self.category,
            subject: self.subject,
            score: clamp_score(raw),
            components: self.components,
            warnings: self.warnings,
        }
    }
}

/// Sub-entities currently stored for one assessment.
#[derive(Debug, Clone, Copy)]
pub struct RiskInputs<'a> {
    pub sources: &'a [SourceAssessment],
    pub fields: &'a [FieldAssessment],
    pub environment: Option<&'a EnvironmentalAssessment>,
}

/// Combine candidate intervals; an untested source only matters when nothing else needs die-off.
fn combine_required(current: Option<Option<u32>>, next: Option<u32>) -> Option<Option<u32>> {
    Some(match (current, next) {
        (None, next) => next,
        (Some(Some(a)), Some(b)) => Some(a.max(b)),
        (Some(Some(days)), None) | (Some(None), Some(days)) if days > 0 => Some(days),
        _ => None,
    })
}

/// Stateless engine running every evaluator, the aggregator, and the determiner.
#[derive(Debug, Clone, Default)]
pub struct RiskEngine {
    config: EvaluationConfig,
}

impl RiskEngine {
    pub fn new(config: EvaluationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    pub fn score(
        &self,
        inputs: RiskInputs<'_>,
        reference_date: NaiveDate,
        calculated_at: DateTime<Utc>,
    ) -> Result<RiskScoreResult, ValidationErrors> {
        let mut evaluations = Vec::new();
        let mut signals = Vec::with_capacity(inputs.sources.len());

        for source in inputs.sources {
            evaluations.push(evaluate_source(source));
            signals.push(SourceSignal {
                source,
                die_off_days: source_die_off_days(source)?,
            });
        }

        for field in inputs.fields {
            let required = signals
                .iter()
                .filter(|signal| field.draws_from(&signal.source.water_source_id))
                .fold(None, |current, signal| {
                    combine_required(current, signal.die_off_days)
                })
                .flatten();
            evaluations.push(evaluate_field_practice(field));
            evaluations.push(evaluate_timing(field, required));
        }

        let mut warnings = Vec::new();
        match inputs.environment {
            Some(environment) => evaluations.push(evaluate_environment(environment)),
            None => warnings.push(DataQualityWarning {
                subject: environmental::ENVIRONMENT_SUBJECT.to_string(),
                message: "environmental assessment not recorded; overall score withheld"
                    .to_string(),
            }),
        }

        let category_score = |category: RiskCategory| {
            worst_of(
                evaluations
                    .iter()
                    .filter(|evaluation| evaluation.category == category)
                    .map(|evaluation| evaluation.score),
            )
        };
        let category_scores = CategoryScores {
            source: category_score(RiskCategory::Source),
            application: category_score(RiskCategory::Application),
            environmental: category_score(RiskCategory::Environmental),
            timing: category_score(RiskCategory::Timing),
        };
        let aggregate = aggregate(&category_scores);

        let top_factors: BTreeMap<RiskCategory, ScoreComponent> = RiskCategory::ordered()
            .into_iter()
            .filter_map(|category| {
                top_component(
                    evaluations
                        .iter()
                        .filter(|evaluation| evaluation.category == category)
                        .flat_map(|evaluation| evaluation.components.iter()),
                )
                .map(|component| (category, component.clone()))
            })
            .collect();

        let determination = decide_determination(
            &DeterminationInputs {
                sources: &signals,
                fields: inputs.fields,
                aggregate,
                category_scores,
                top_factors: &top_factors,
            },
            &self.config,
            reference_date,
        );

        let mut components = Vec::new();
        for evaluation in evaluations {
            components.extend(evaluation.components);
            warnings.extend(evaluation.warnings);
        }

        Ok(RiskScoreResult {
            source_risk_score: category_scores.source,
            application_risk_score: category_scores.application,
            environmental_risk_score: category_scores.environmental,
            timing_risk_score: category_scores.timing,
            overall_risk_score: aggregate.overall,
            risk_level: aggregate.risk_level,
            fda_determination: determination.fda_determination,
            required_die_off_days: determination.required_die_off_days,
            mitigation_actions: determination.actions,
            components,
            warnings,
            calculated_at,
        })
    }
}
