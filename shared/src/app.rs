//! The desk list state machine.
//!
//! `update` is the only place the [`Model`] changes. It never performs I/O
//! itself: list fetches, location fixes and navigation go out as capability
//! requests, and their answers come back as events.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::capabilities::{Capabilities, LocationOutcome};
use crate::event::{Event, FetchResult};
use crate::model::{
    Coordinate, DeskId, FetchStatus, FilterMode, Model, NavigationIntent, Notification,
};
use crate::ranking::{distance_from, ListSnapshot};
use crate::{format_distance, format_time_ago, get_current_time_ms, AppError, ErrorKind};

#[derive(Default)]
pub struct App;

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        model.now_ms = get_current_time_ms();

        let event_name = event.name();
        if event.is_user_initiated() {
            debug!(event = event_name, "User action");
        }

        match event {
            Event::Started { location_policy } => {
                model.location_policy = location_policy;
                Self::begin_fetch(model, caps);
                Self::begin_location(model, caps);
                caps.render.render();
            }

            Event::ModeSelected { mode } => {
                if mode == model.mode {
                    return;
                }
                info!(from = %model.mode, to = %mode, "Filter mode changed");
                model.mode = mode;

                Self::begin_fetch(model, caps);
                if model.location_policy.wants_location(mode, model.coordinate) {
                    Self::begin_location(model, caps);
                }
                caps.render.render();
            }

            Event::RefreshRequested => {
                if model.is_loading() {
                    debug!(generation = %model.list_generation, "Refresh coalesced into in-flight fetch");
                    return;
                }
                Self::begin_fetch(model, caps);
                caps.render.render();
            }

            Event::LocationResolved {
                generation,
                outcome,
            } => {
                if generation != model.location_generation {
                    debug!(
                        %generation,
                        latest = %model.location_generation,
                        "Dropping superseded location response"
                    );
                    return;
                }
                Self::apply_location(*outcome, model);
                caps.render.render();
            }

            Event::ListFetched { generation, result } => {
                if generation != model.list_generation {
                    debug!(
                        %generation,
                        latest = %model.list_generation,
                        "Dropping superseded list response"
                    );
                    return;
                }
                Self::apply_fetch(*result, model);
                caps.render.render();
            }

            Event::DeskSelected { desk_id } => {
                if let Some(intent) = Self::select(&desk_id, model) {
                    caps.navigation.navigate(intent);
                }
            }

            Event::DismissNotification { id } => {
                if model.dismiss_notification(&id) {
                    caps.render.render();
                }
            }
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        let snapshot = model.snapshot();
        let items = snapshot
            .desks
            .iter()
            .map(|desk| DeskListItem {
                id: desk.id.clone(),
                image_ref: desk.image_ref.clone(),
                developer_name: desk.developer.name.clone(),
                developer_email: desk.developer.email.clone(),
                distance_text: distance_from(desk, model.coordinate).map(format_distance),
                time_ago: format_time_ago(desk.created_at.timestamp_millis(), model.now_ms),
            })
            .collect::<Vec<_>>();

        let modes = FilterMode::ALL
            .iter()
            .map(|&mode| ModeOption {
                mode,
                label: mode.label().to_string(),
                selected: mode == model.mode,
            })
            .collect();

        let status = match &model.status {
            FetchStatus::Idle => StatusView::Idle,
            FetchStatus::Loading => StatusView::Loading,
            FetchStatus::Success => StatusView::Success,
            FetchStatus::Error(e) => StatusView::Error {
                message: e.user_facing_message(),
                error_code: e.code().to_string(),
                is_retryable: e.is_retryable(),
            },
        };

        ViewModel {
            is_empty: matches!(model.status, FetchStatus::Success) && items.is_empty(),
            has_error: model.status.error().is_some(),
            items,
            loading: model.is_loading(),
            mode: model.mode,
            modes,
            status,
            location: LocationView::from(model),
            notification: model.notification.clone(),
            snapshot,
        }
    }
}

impl App {
    /// Desks are left in place so the previous list stays visible while loading.
    fn begin_fetch(model: &mut Model, caps: &Capabilities) {
        model.list_generation = model.list_generation.next();
        model.status = FetchStatus::Loading;

        let generation = model.list_generation;
        caps.list
            .fetch(generation, move |result| Event::list_fetched(generation, result));
    }

    fn begin_location(model: &mut Model, caps: &Capabilities) {
        if model.coordinate.is_denied() {
            return;
        }
        model.location_generation = model.location_generation.next();
        model.location_pending = true;

        let generation = model.location_generation;
        caps.location.acquire(generation, move |outcome| {
            Event::location_resolved(generation, outcome)
        });
    }

    fn apply_location(outcome: LocationOutcome, model: &mut Model) {
        model.location_pending = false;
        match outcome {
            LocationOutcome::Resolved(coord) => {
                model.coordinate = Coordinate::Resolved(coord);
                model.location_issue = None;
            }
            LocationOutcome::Denied => {
                info!("Location denied, distance ordering disabled for this session");
                model.coordinate = Coordinate::Denied;
                model.location_issue = Some(AppError::new(
                    ErrorKind::LocationPermissionDenied,
                    "Permission to access location was denied",
                ));
            }
            LocationOutcome::Unavailable(e) => {
                warn!(error = %e, "Keeping previous coordinate");
                model.location_issue = Some(AppError::from(&e));
            }
        }
    }

    fn apply_fetch(result: FetchResult, model: &mut Model) {
        match result {
            Ok(desks) => {
                debug!(count = desks.len(), "Desk list replaced");
                model.desks = desks;
                model.status = FetchStatus::Success;
            }
            Err(e) => {
                warn!(code = e.code(), error = %e, "Desk list fetch failed");
                model.raise_notification(&e);
                model.status = FetchStatus::Error(e);
            }
        }
    }

    fn select(desk_id: &DeskId, model: &Model) -> Option<NavigationIntent> {
        if model.contains_desk(desk_id) {
            Some(NavigationIntent::OpenDesk {
                desk_id: desk_id.clone(),
            })
        } else {
            warn!(%desk_id, "Selected desk is not in the current list");
            None
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeskListItem {
    pub id: DeskId,
    pub image_ref: String,
    pub developer_name: String,
    pub developer_email: String,
    pub distance_text: Option<String>,
    pub time_ago: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModeOption {
    pub mode: FilterMode,
    pub label: String,
    pub selected: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusView {
    Idle,
    Loading,
    Success,
    Error {
        message: String,
        error_code: String,
        is_retryable: bool,
    },
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LocationState {
    Unknown,
    Pending,
    Resolved,
    Denied,
    Unavailable,
}

/// Passive location indicator. Location problems never raise a notification.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocationView {
    pub state: LocationState,
    pub message: Option<String>,
}

impl From<&Model> for LocationView {
    fn from(model: &Model) -> Self {
        let state = match (model.coordinate, &model.location_issue) {
            (Coordinate::Denied, _) => LocationState::Denied,
            (_, _) if model.location_pending => LocationState::Pending,
            (_, Some(issue)) if issue.kind.is_location_issue() => LocationState::Unavailable,
            (Coordinate::Resolved(_), _) => LocationState::Resolved,
            (Coordinate::Unset, _) => LocationState::Unknown,
        };
        Self {
            state,
            message: model
                .location_issue
                .as_ref()
                .map(AppError::user_facing_message),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub items: Vec<DeskListItem>,
    pub loading: bool,
    pub mode: FilterMode,
    pub modes: Vec<ModeOption>,
    pub status: StatusView,
    pub location: LocationView,
    pub is_empty: bool,
    pub has_error: bool,
    /// Pending alert, shown once and then dismissed by id.
    pub notification: Option<Notification>,
    /// The ranked list the items were built from, with its inputs.
    pub snapshot: ListSnapshot,
}
