//! Per-primitive confirmation state machine.
//!
//! ```text
//!                 confirm
//!   Unconfirmed ───────────► Confirmed
//!       │  │                    │ ▲
//!       │  └─ flag ─► Flagged ──┘ │ confirm
//!       │                         │
//!       └─ correct ─► Corrected ──┘
//! ```
//!
//! Correcting and flagging are allowed from every state; confirming is
//! rejected only when the primitive is already confirmed. The pure
//! transition lives here; committing it together with its provenance entry
//! is the registry's job.

use serde::{Deserialize, Serialize};

use crate::provenance::ProvenanceAction;

use super::HumanIdentity;

/// Where a primitive stands in human review.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStatus {
    #[default]
    Unconfirmed,
    Confirmed,
    Corrected,
    Flagged,
}

impl ConfirmationStatus {
    /// Confirmed and corrected primitives both count toward completion.
    pub fn counts_as_confirmed(self) -> bool {
        matches!(self, Self::Confirmed | Self::Corrected)
    }

    /// Next status after `action`, or `None` when the transition is not allowed.
    pub fn next(self, action: &ConfirmationAction) -> Option<Self> {
        match (self, action) {
            (Self::Confirmed, ConfirmationAction::Confirm) => None,
            (Self::Unconfirmed | Self::Flagged | Self::Corrected, ConfirmationAction::Confirm) => {
                Some(Self::Confirmed)
            }
            (_, ConfirmationAction::Correct { .. }) => Some(Self::Corrected),
            (_, ConfirmationAction::Flag { .. }) => Some(Self::Flagged),
        }
    }
}

impl std::fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unconfirmed => write!(f, "unconfirmed"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Corrected => write!(f, "corrected"),
            Self::Flagged => write!(f, "flagged"),
        }
    }
}

/// A human review action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationAction {
    Confirm,
    Correct { corrected_text: String },
    Flag { reason: String },
}

impl ConfirmationAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Correct { .. } => "correct",
            Self::Flag { .. } => "flag",
        }
    }

    /// The provenance action this review action emits.
    pub fn provenance_action(&self) -> ProvenanceAction {
        match self {
            Self::Confirm => ProvenanceAction::Confirmed,
            Self::Correct { .. } => ProvenanceAction::Corrected,
            Self::Flag { .. } => ProvenanceAction::Flagged,
        }
    }
}

/// Who confirmed what and when.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationRecord {
    pub status: ConfirmationStatus,
    #[serde(default)]
    pub confirmed_by: Option<HumanIdentity>,
    /// Seconds since UNIX epoch.
    #[serde(default)]
    pub confirmed_at: Option<u64>,
    /// Text as first extracted, kept across repeated corrections.
    #[serde(default)]
    pub original_text: Option<String>,
    #[serde(default)]
    pub corrected_text: Option<String>,
    #[serde(default)]
    pub flag_reason: Option<String>,
}

impl ConfirmationRecord {
    /// Apply `action`, producing the record that replaces this one.
    ///
    /// `current_text` is the primitive's principal text before the action;
    /// it becomes `original_text` on the first correction.
    pub fn apply(
        &self,
        action: &ConfirmationAction,
        actor: &HumanIdentity,
        at: u64,
        current_text: &str,
    ) -> Option<Self> {
        let status = self.status.next(action)?;
        let mut next = self.clone();
        next.status = status;
        next.confirmed_by = Some(actor.clone());
        next.confirmed_at = Some(at);
        match action {
            ConfirmationAction::Confirm => {
                next.flag_reason = None;
            }
            ConfirmationAction::Correct { corrected_text } => {
                if next.original_text.is_none() {
                    next.original_text = Some(current_text.to_string());
                }
                next.corrected_text = Some(corrected_text.clone());
                next.flag_reason = None;
            }
            ConfirmationAction::Flag { reason } => {
                next.flag_reason = Some(reason.clone());
            }
        }
        Some(next)
    }
}
