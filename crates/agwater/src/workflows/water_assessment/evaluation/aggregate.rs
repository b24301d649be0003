use serde::{Deserialize, Serialize};

use super::super::domain::{RiskCategory, RiskLevel};
use super::super::thresholds::{category_weight, clamp_score, risk_level_for};

/// Per-category scores; `None` means the category has not been evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub source: Option<f64>,
    pub application: Option<f64>,
    pub environmental: Option<f64>,
    pub timing: Option<f64>,
}

impl CategoryScores {
    pub fn get(&self, category: RiskCategory) -> Option<f64> {
        match category {
            RiskCategory::Source => self.source,
            RiskCategory::Application => self.application,
            RiskCategory::Environmental => self.environmental,
            RiskCategory::Timing => self.timing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateScore {
    pub overall: Option<f64>,
    pub risk_level: Option<RiskLevel>,
}

/// Worst entity drives the farm-level category score.
pub fn worst_of<I>(scores: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    scores.into_iter().fold(None, |worst, score| match worst {
        Some(current) if current >= score => Some(current),
        _ => Some(score),
    })
}

/// Weighted combination of the four categories; incomplete input yields no score.
pub fn aggregate(scores: &CategoryScores) -> AggregateScore {
    let overall = RiskCategory::ordered()
        .into_iter()
        .try_fold(0.0, |total, category| {
            scores
                .get(category)
                .map(|score| total + category_weight(category) * score)
        })
        .map(clamp_score);

    AggregateScore {
        overall,
        risk_level: overall.map(risk_level_for),
    }
}
