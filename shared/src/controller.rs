//! Shell around the Crux [`Core`].
//!
//! The core owns the [`Model`](crate::model::Model); the controller only feeds
//! it events and answers its requests. List fetches and location fixes are
//! resolved against the [`ListSource`] and [`LocationProvider`] ports, side by
//! side, and every render request republishes the view.

use crux_core::Core;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::app::{App, StatusView, ViewModel};
use crate::capabilities::{
    acquire_location, Capabilities, Effect, ListSource, ListSourceError, LocationOutcome, LocationProvider,
};
use crate::config::{ConfigError, ControllerConfig};
use crate::event::{Event, FetchResult};
use crate::model::{Coordinate, Desk, DeskId, FilterMode, Generation, NavigationIntent, Notification};
use crate::ranking::ListSnapshot;

type Settled<'a> = Pin<Box<dyn Future<Output = Option<NavigationIntent>> + Send + 'a>>;

pub struct ViewController<S: ListSource, L: LocationProvider> {
    core: Core<Effect, App>,
    list_source: Arc<S>,
    location: Arc<L>,
    config: ControllerConfig,
    view_tx: watch::Sender<ViewModel>,
}

impl<S: ListSource, L: LocationProvider> ViewController<S, L> {
    pub fn new(
        list_source: Arc<S>,
        location: Arc<L>,
        config: ControllerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let core = Core::new::<Capabilities>();
        let (view_tx, _) = watch::channel(core.view());

        Ok(Self {
            core,
            list_source,
            location,
            config,
            view_tx,
        })
    }

    /// Initial load on screen mount. Resolves once both requests have settled.
    #[instrument(skip(self))]
    pub async fn start(&self) {
        self.dispatch(Event::Started {
            location_policy: self.config.location_policy,
        })
        .await;
    }

    #[instrument(skip(self))]
    pub async fn set_mode(&self, mode: FilterMode) {
        self.dispatch(Event::ModeSelected { mode }).await;
    }

    /// Pull-to-refresh. Joins the in-flight fetch instead of starting another.
    #[instrument(skip(self))]
    pub async fn refresh(&self) {
        self.dispatch(Event::RefreshRequested).await;
    }

    pub async fn on_location_resolved(&self, generation: Generation, outcome: LocationOutcome) {
        self.dispatch(Event::location_resolved(generation, outcome)).await;
    }

    pub async fn on_list_fetched(&self, generation: Generation, result: FetchResult) {
        self.dispatch(Event::list_fetched(generation, result)).await;
    }

    pub async fn select(&self, desk_id: DeskId) -> Option<NavigationIntent> {
        self.dispatch(Event::DeskSelected { desk_id }).await
    }

    /// Hands out the pending alert. A second call returns `None`.
    pub async fn take_notification(&self) -> Option<Notification> {
        let notification = self.core.view().notification?;
        self.dispatch(Event::DismissNotification {
            id: notification.id.clone(),
        })
        .await;
        Some(notification)
    }

    #[must_use]
    pub fn current_view(&self) -> Vec<Desk> {
        self.snapshot().desks
    }

    #[must_use]
    pub fn snapshot(&self) -> ListSnapshot {
        self.core.view().snapshot
    }

    #[must_use]
    pub fn view(&self) -> ViewModel {
        self.core.view()
    }

    #[must_use]
    pub fn status(&self) -> StatusView {
        self.core.view().status
    }

    #[must_use]
    pub fn coordinate(&self) -> Coordinate {
        self.core.view().snapshot.coordinate
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewModel> {
        self.view_tx.subscribe()
    }

    async fn dispatch(&self, event: Event) -> Option<NavigationIntent> {
        let effects = self.core.process_event(event);
        self.run(effects).await
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.core.view());
    }

    /// Runs list fetches and location fixes side by side. Each answer is
    /// resolved back into the core as soon as it arrives, in whichever order
    /// they finish.
    fn run(&self, effects: Vec<Effect>) -> Settled<'_> {
        Box::pin(async move {
            let mut fetches = Vec::new();
            let mut fixes = Vec::new();
            let mut navigate = None;

            for effect in effects {
                match effect {
                    Effect::Render(_) => self.publish(),
                    Effect::ListFetch(request) => fetches.push(request),
                    Effect::Location(request) => fixes.push(request),
                    Effect::Navigation(request) => {
                        navigate = Some(request.operation.clone());
                    }
                }
            }

            let fetch_task = async {
                let mut navigate = None;
                for mut request in fetches {
                    let result = self.fetch_list(request.operation.generation).await;
                    let effects = self.core.resolve(&mut request, result);
                    navigate = self.run(effects).await.or(navigate);
                }
                navigate
            };

            let locate_task = async {
                let mut navigate = None;
                for mut request in fixes {
                    debug!(generation = %request.operation.generation, "Acquiring location");
                    let outcome =
                        acquire_location(self.location.as_ref(), self.config.location_timeout())
                            .await;
                    let effects = self.core.resolve(&mut request, outcome);
                    navigate = self.run(effects).await.or(navigate);
                }
                navigate
            };

            let (fetched, located) = tokio::join!(fetch_task, locate_task);
            navigate.or(fetched).or(located)
        })
    }

    async fn fetch_list(&self, generation: Generation) -> FetchResult {
        debug!(%generation, "Fetching desk list");
        match tokio::time::timeout(self.config.fetch_timeout(), self.list_source.fetch()).await {
            Ok(Ok(desks)) => Ok(desks),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                warn!(%generation, timeout_ms = self.config.fetch_timeout_ms, "Desk list fetch timed out");
                Err(ListSourceError::Timeout {
                    timeout_ms: self.config.fetch_timeout_ms,
                }
                .into())
            }
        }
    }
}
