use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::{Generation, ValidatedCoordinate};
use crate::{AppError, ErrorKind};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
}

impl PermissionStatus {
    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum LocationError {
    #[error("permission to access location was denied")]
    PermissionDenied,

    #[error("location unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("no location fix within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("location fix is invalid: {reason}")]
    InvalidFix { reason: String },
}

impl From<&LocationError> for AppError {
    fn from(e: &LocationError) -> Self {
        let kind = match e {
            LocationError::PermissionDenied => ErrorKind::LocationPermissionDenied,
            LocationError::Unavailable { .. }
            | LocationError::Timeout { .. }
            | LocationError::InvalidFix { .. } => ErrorKind::Location,
        };
        AppError::new(kind, e.to_string())
    }
}

/// Device location as seen by the core. Implemented by the platform shell.
///
/// `request_permission` is always awaited before `current_position`.
#[async_trait::async_trait]
pub trait LocationProvider: Send + Sync {
    async fn request_permission(&self) -> PermissionStatus;

    /// Returns `(latitude, longitude)` in degrees.
    async fn current_position(&self) -> Result<(f64, f64), LocationError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum LocationOutcome {
    Resolved(ValidatedCoordinate),
    Denied,
    Unavailable(LocationError),
}

/// Asks the shell to run the permission-then-fix sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AcquireLocationOperation {
    pub generation: Generation,
}

impl Operation for AcquireLocationOperation {
    type Output = LocationOutcome;
}

pub struct Location<E> {
    context: CapabilityContext<AcquireLocationOperation, E>,
}

impl<Ev> Capability<Ev> for Location<Ev> {
    type Operation = AcquireLocationOperation;
    type MappedSelf<MappedEv> = Location<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static,
    {
        Location::new(self.context.map_event(f))
    }
}

impl<E> Location<E>
where
    E: 'static,
{
    pub fn new(context: CapabilityContext<AcquireLocationOperation, E>) -> Self {
        Self { context }
    }

    pub fn acquire<F>(&self, generation: Generation, callback: F)
    where
        F: FnOnce(LocationOutcome) -> E + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let outcome = ctx
                .request_from_shell(AcquireLocationOperation { generation })
                .await;
            ctx.update_app(callback(outcome));
        });
    }
}

/// Asks for permission, then for a fix. `timeout` bounds the whole sequence,
/// including a permission prompt that never answers.
///
/// A denial skips the fix entirely.
pub async fn acquire_location<L>(provider: &L, timeout: Duration) -> LocationOutcome
where
    L: LocationProvider + ?Sized,
{
    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);

    let sequence = async {
        if !provider.request_permission().await.is_granted() {
            info!("Location permission denied");
            return LocationOutcome::Denied;
        }

        match provider.current_position().await {
            Ok((lat, lon)) => match ValidatedCoordinate::new(lat, lon) {
                Ok(coord) => {
                    debug!("Location fix acquired");
                    LocationOutcome::Resolved(coord)
                }
                Err(e) => {
                    warn!(lat, lon, "Discarding invalid location fix");
                    LocationOutcome::Unavailable(LocationError::InvalidFix {
                        reason: e.to_string(),
                    })
                }
            },
            Err(LocationError::PermissionDenied) => LocationOutcome::Denied,
            Err(e) => {
                warn!(error = %e, "Location fix failed");
                LocationOutcome::Unavailable(e)
            }
        }
    };

    if let Ok(outcome) = tokio::time::timeout(timeout, sequence).await {
        outcome
    } else {
        warn!(timeout_ms, "Location request timed out");
        LocationOutcome::Unavailable(LocationError::Timeout { timeout_ms })
    }
}
