use serde::{Deserialize, Serialize};

use crate::capabilities::LocationOutcome;
use crate::config::LocationPolicy;
use crate::model::{Desk, DeskId, FilterMode, Generation};
use crate::AppError;

pub type FetchResult = Result<Vec<Desk>, AppError>;

// --- Event enum: no None variant, large variants boxed ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Screen
    Started {
        location_policy: LocationPolicy,
    },
    ModeSelected {
        mode: FilterMode,
    },
    RefreshRequested,
    DeskSelected {
        desk_id: DeskId,
    },
    DismissNotification {
        id: String,
    },

    // Capability responses
    LocationResolved {
        generation: Generation,
        outcome: Box<LocationOutcome>,
    },
    ListFetched {
        generation: Generation,
        result: Box<FetchResult>,
    },
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::ModeSelected { .. } => "mode_selected",
            Self::RefreshRequested => "refresh_requested",
            Self::DeskSelected { .. } => "desk_selected",
            Self::DismissNotification { .. } => "dismiss_notification",
            Self::LocationResolved { .. } => "location_resolved",
            Self::ListFetched { .. } => "list_fetched",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::ModeSelected { .. }
                | Self::RefreshRequested
                | Self::DeskSelected { .. }
                | Self::DismissNotification { .. }
        )
    }

    #[must_use]
    pub fn list_fetched(generation: Generation, result: FetchResult) -> Self {
        Self::ListFetched {
            generation,
            result: Box::new(result),
        }
    }

    #[must_use]
    pub fn location_resolved(generation: Generation, outcome: LocationOutcome) -> Self {
        Self::LocationResolved {
            generation,
            outcome: Box::new(outcome),
        }
    }
}
