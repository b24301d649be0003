use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::super::domain::ActionPriority;

/// Scheduling dials for generated mitigation actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub critical_action_due_days: u32,
    pub high_action_due_days: u32,
    pub medium_action_due_days: u32,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            critical_action_due_days: 7,
            high_action_due_days: 30,
            medium_action_due_days: 90,
        }
    }
}

impl EvaluationConfig {
    /// Low-priority actions carry no deadline.
    pub fn due_date_for(&self, priority: ActionPriority, reference: NaiveDate) -> Option<NaiveDate> {
        let days = match priority {
            ActionPriority::Critical => self.critical_action_due_days,
            ActionPriority::High => self.high_action_due_days,
            ActionPriority::Medium => self.medium_action_due_days,
            ActionPriority::Low => return None,
        };
        reference.checked_add_signed(Duration::days(i64::from(days)))
    }
}
