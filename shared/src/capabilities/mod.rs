//! Capabilities and the ports behind them.
//!
//! The core never talks to the network or the GPS itself. `update` asks
//! through the Crux capabilities below, and the shell answers each request
//! by calling the matching port trait.

mod http;
mod list_source;
mod location;
mod navigation;

use crux_core::render::Render;

use crate::app::App;
use crate::event::Event;

pub use self::http::{
    HttpError, HttpListSource, HttpListSourceConfig, HttpRequest, HttpResponse, HttpTransport,
    ValidatedUrl,
};
pub use self::list_source::{
    decode_list_response, FetchListOperation, ListFetch, ListSource, ListSourceError,
};
pub use self::location::{
    acquire_location, AcquireLocationOperation, Location, LocationError, LocationOutcome,
    LocationProvider, PermissionStatus,
};
pub use self::navigation::Navigation;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub render: Render<Event>,
    pub list: ListFetch<Event>,
    pub location: Location<Event>,
    pub navigation: Navigation<Event>,
}
