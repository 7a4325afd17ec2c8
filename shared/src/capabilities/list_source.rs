use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::event::FetchResult;
use crate::model::{Desk, Generation};
use crate::{AppError, ErrorKind};

/// Anything that can hand back the current page of desks.
#[async_trait::async_trait]
pub trait ListSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Desk>, ListSourceError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ListSourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("server responded with status {status}")]
    Status { status: u16, body: Option<String> },

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

impl From<ListSourceError> for AppError {
    fn from(e: ListSourceError) -> Self {
        match e {
            ListSourceError::Network(message) => {
                AppError::new(ErrorKind::Network, "Network request failed").with_internal(message)
            }
            ListSourceError::Timeout { timeout_ms } => {
                AppError::new(ErrorKind::Timeout, "Desk list request timed out")
                    .with_context("timeout_ms", timeout_ms.to_string())
            }
            ListSourceError::Status { status, body } => {
                AppError::from_http_status(status, body.as_deref().map(str::as_bytes))
            }
            ListSourceError::Decode(reason) => {
                AppError::new(ErrorKind::Deserialization, "Malformed desk list")
                    .with_internal(reason)
            }
            ListSourceError::Other(message) => AppError::new(ErrorKind::Unknown, message),
        }
    }
}

/// Asks the shell for the current page of desks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchListOperation {
    pub generation: Generation,
}

impl Operation for FetchListOperation {
    type Output = FetchResult;
}

pub struct ListFetch<E> {
    context: CapabilityContext<FetchListOperation, E>,
}

impl<Ev> Capability<Ev> for ListFetch<Ev> {
    type Operation = FetchListOperation;
    type MappedSelf<MappedEv> = ListFetch<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static,
    {
        ListFetch::new(self.context.map_event(f))
    }
}

impl<E> ListFetch<E>
where
    E: 'static,
{
    pub fn new(context: CapabilityContext<FetchListOperation, E>) -> Self {
        Self { context }
    }

    pub fn fetch<F>(&self, generation: Generation, callback: F)
    where
        F: FnOnce(FetchResult) -> E + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx
                .request_from_shell(FetchListOperation { generation })
                .await;
            ctx.update_app(callback(result));
        });
    }
}

#[derive(Deserialize)]
struct RawListResponse {
    results: Vec<serde_json::Value>,
}

/// Decodes a `{ "results": [...] }` body.
///
/// Entries that do not decode are skipped with a warning so one bad listing
/// cannot hide the rest of the page.
pub fn decode_list_response(body: &[u8]) -> Result<Vec<Desk>, ListSourceError> {
    let raw: RawListResponse =
        serde_json::from_slice(body).map_err(|e| ListSourceError::Decode(e.to_string()))?;

    let total = raw.results.len();
    let desks: Vec<Desk> = raw
        .results
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<Desk>(value) {
            Ok(desk) => Some(desk),
            Err(e) => {
                warn!(index, error = %e, "Skipping undecodable desk");
                None
            }
        })
        .collect();

    if desks.len() < total {
        warn!("Decoded {} of {} desks", desks.len(), total);
    }

    Ok(desks)
}
