use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a selection session currently stands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SelectionState {
    Unselected,
    AutoSelected,
    AwaitingManualChoice,
    ManualSelected,
    AwaitingCustomUrl,
    CustomUrlVerifying,
    CustomUrlAccepted,
    CustomUrlRejected,
}

impl SelectionState {
    pub fn can_transition_to(self, next: SelectionState) -> bool {
        use SelectionState::*;
        matches!(
            (self, next),
            (Unselected, AutoSelected)
                | (Unselected, AwaitingManualChoice)
                | (AwaitingManualChoice, ManualSelected)
                | (AwaitingManualChoice, AwaitingCustomUrl)
                | (AwaitingCustomUrl, AwaitingManualChoice)
                | (AwaitingCustomUrl, CustomUrlVerifying)
                | (CustomUrlVerifying, AwaitingCustomUrl)
                | (CustomUrlVerifying, CustomUrlAccepted)
                | (CustomUrlVerifying, CustomUrlRejected)
                | (CustomUrlVerifying, AwaitingManualChoice)
                | (CustomUrlRejected, AwaitingManualChoice)
        )
    }

    /// A server has been chosen and the session is over.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SelectionState::AutoSelected
                | SelectionState::ManualSelected
                | SelectionState::CustomUrlAccepted
        )
    }
}

impl fmt::Display for SelectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SelectionState::Unselected => "unselected",
            SelectionState::AutoSelected => "auto_selected",
            SelectionState::AwaitingManualChoice => "awaiting_manual_choice",
            SelectionState::ManualSelected => "manual_selected",
            SelectionState::AwaitingCustomUrl => "awaiting_custom_url",
            SelectionState::CustomUrlVerifying => "custom_url_verifying",
            SelectionState::CustomUrlAccepted => "custom_url_accepted",
            SelectionState::CustomUrlRejected => "custom_url_rejected",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SelectionSource {
    Auto,
    Manual,
    Custom,
}

/// Persisted selection settings shared by every session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectionPreferences {
    pub auto_detect: bool,
    pub custom_server_url: Option<String>,
    pub selected_server_id: Option<i64>,
    pub custom_server_selected: bool,
    pub custom_server_url_valid: bool,
}

impl Default for SelectionPreferences {
    fn default() -> Self {
        Self {
            auto_detect: true,
            custom_server_url: None,
            selected_server_id: None,
            custom_server_selected: false,
            custom_server_url_valid: false,
        }
    }
}
