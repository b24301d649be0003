//! Regulatory constants for the current scoring formula.
//!
//! Cut points and category weights follow the produce-safety agricultural
//! water criteria as interpreted by this engine; they are fixed for a given
//! formula version and never read from configuration.

use serde::{Deserialize, Serialize};

use super::domain::{ApplicationMethod, CropContactType, RiskCategory, RiskLevel};

/// E. coli geometric mean limit, CFU/100mL.
pub const GM_THRESHOLD: f64 = 126.0;
/// E. coli statistical threshold value limit, CFU/100mL.
pub const STV_THRESHOLD: f64 = 410.0;
/// Microbial die-off rate assumed between last irrigation and harvest.
pub const DIE_OFF_LOG_REDUCTION_PER_DAY: f64 = 0.5;

pub const LOW_LEVEL_MAX: f64 = 25.0;
pub const MEDIUM_LEVEL_MAX: f64 = 50.0;
pub const HIGH_LEVEL_MAX: f64 = 75.0;

pub const MAX_SCORE: f64 = 100.0;

/// Coarse exposure tier shared by irrigation methods and crop contact types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Numeric weight used by the field practice evaluator.
    pub const fn weight(self) -> f64 {
        match self {
            Self::Low => 10.0,
            Self::Medium => 50.0,
            Self::High => 90.0,
        }
    }
}

pub const fn irrigation_tier(method: ApplicationMethod) -> RiskTier {
    match method {
        ApplicationMethod::Drip | ApplicationMethod::Subsurface | ApplicationMethod::NoIrrigation => {
            RiskTier::Low
        }
        ApplicationMethod::MicroSprinkler | ApplicationMethod::HandWatering => RiskTier::Medium,
        ApplicationMethod::Overhead | ApplicationMethod::Furrow => RiskTier::High,
    }
}

pub const fn crop_contact_tier(contact: CropContactType) -> RiskTier {
    match contact {
        CropContactType::SoilOnly => RiskTier::Low,
        CropContactType::Indirect => RiskTier::Medium,
        CropContactType::Direct => RiskTier::High,
    }
}

pub const fn category_weight(category: RiskCategory) -> f64 {
    match category {
        RiskCategory::Source => 0.30,
        RiskCategory::Application => 0.25,
        RiskCategory::Environmental => 0.25,
        RiskCategory::Timing => 0.20,
    }
}

/// Map a 0-100 score onto its level; each band includes its upper bound.
pub fn risk_level_for(score: f64) -> RiskLevel {
    if score <= LOW_LEVEL_MAX {
        RiskLevel::Low
    } else if score <= MEDIUM_LEVEL_MAX {
        RiskLevel::Medium
    } else if score <= HIGH_LEVEL_MAX {
        RiskLevel::High
    } else {
        RiskLevel::Critical
    }
}

pub(crate) fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, MAX_SCORE)
}
