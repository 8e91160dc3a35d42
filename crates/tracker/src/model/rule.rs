use serde::{Deserialize, Serialize};

/// An action produced by evaluating a program rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleAction {
    /// Assigns `value` to a data element or attribute.
    AssignValue { field: String, value: String },
    /// A non-blocking message shown to the user.
    ShowWarning { content: String },
    /// A blocking message; the object is rejected.
    ShowError { content: String },
    /// Sends a notification immediately after commit.
    SendMessage { notification: String },
    /// Schedules a notification for a later date.
    ScheduleMessage { notification: String, date: String },
}

/// An effect of a program rule on an enrollment or event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEffect {
    /// UID of the rule that produced the effect.
    pub rule: String,
    pub action: RuleAction,
}

impl RuleEffect {
    pub fn new(rule: impl Into<String>, action: RuleAction) -> Self {
        Self {
            rule: rule.into(),
            action,
        }
    }

    /// Returns `true` for effects that are carried out after commit.
    pub fn is_side_effect(&self) -> bool {
        matches!(
            self.action,
            RuleAction::SendMessage { .. } | RuleAction::ScheduleMessage { .. }
        )
    }
}
