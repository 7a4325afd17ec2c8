use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::config::LocationPolicy;
use crate::ranking::{rank, ListSnapshot};
use crate::AppError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoordinateError {
    #[error("Latitude {0} is out of valid range [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("Longitude {0} is out of valid range [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("Coordinate value is not finite (NaN or Infinity)")]
    NonFinite,
}

impl From<CoordinateError> for AppError {
    fn from(e: CoordinateError) -> Self {
        AppError::new(crate::ErrorKind::Validation, e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct ValidatedCoordinate {
    lat: f64,
    lon: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lon: f64,
}

impl TryFrom<RawCoordinate> for ValidatedCoordinate {
    type Error = CoordinateError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Self::new(raw.lat, raw.lon)
    }
}

impl ValidatedCoordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(CoordinateError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::LongitudeOutOfRange(lon));
        }
        Ok(Self { lat, lon })
    }

    #[must_use]
    pub const fn lat(self) -> f64 {
        self.lat
    }

    #[must_use]
    pub const fn lon(self) -> f64 {
        self.lon
    }
}

/// Last known device position as far as the list is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Coordinate {
    #[default]
    Unset,
    Denied,
    Resolved(ValidatedCoordinate),
}

impl Coordinate {
    #[must_use]
    pub const fn resolved(self) -> Option<ValidatedCoordinate> {
        match self {
            Self::Resolved(coord) => Some(coord),
            Self::Unset | Self::Denied => None,
        }
    }

    #[must_use]
    pub const fn is_denied(self) -> bool {
        matches!(self, Self::Denied)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    Newest,
    Trending,
    NearMe,
}

impl FilterMode {
    pub const ALL: [Self; 3] = [Self::Newest, Self::Trending, Self::NearMe];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Trending => "trending",
            Self::NearMe => "near_me",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Newest => "Newest",
            Self::Trending => "Trending",
            Self::NearMe => "Near me",
        }
    }

    #[must_use]
    pub const fn uses_location(self) -> bool {
        matches!(self, Self::NearMe)
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server ids arrive either as JSON numbers or strings; both are kept as text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DeskId(String);

impl DeskId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DeskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => Self(n.to_string()),
            RawId::Text(s) => Self(s),
        })
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Developer {
    pub name: String,
    pub email: String,
}

// Redact debug output because the email is personal data.
impl fmt::Debug for Developer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Developer")
            .field("name", &self.name)
            .field("email_present", &!self.email.is_empty())
            .finish()
    }
}

/// One listing as returned by the desks endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Desk {
    pub id: DeskId,
    #[serde(deserialize_with = "deserialize_created_at")]
    pub created_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub developer: Developer,
    #[serde(rename = "uri")]
    pub image_ref: String,
}

impl Desk {
    pub fn coordinate(&self) -> Result<ValidatedCoordinate, CoordinateError> {
        ValidatedCoordinate::new(self.latitude, self.longitude)
    }
}

/// Parses the timestamp shapes the desks endpoint has been seen to emit.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn deserialize_created_at<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DateTime<Utc>, D::Error> {
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Millis(i64),
        Text(String),
    }

    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Millis(ms) => DateTime::from_timestamp_millis(ms)
            .ok_or_else(|| D::Error::custom(format!("timestamp {ms} is out of range"))),
        RawTimestamp::Text(text) => parse_timestamp(&text)
            .ok_or_else(|| D::Error::custom(format!("unrecognised timestamp {text:?}"))),
    }
}

/// Request tag used to drop responses that a newer request has superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Generation(u64);

impl Generation {
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error(AppError),
}

impl FetchStatus {
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    #[must_use]
    pub const fn error(&self) -> Option<&AppError> {
        match self {
            Self::Error(e) => Some(e),
            Self::Idle | Self::Loading | Self::Success => None,
        }
    }
}

/// One-shot alert raised for a failed list fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub message: String,
    pub error_code: String,
    pub is_retryable: bool,
}

impl From<&AppError> for Notification {
    fn from(e: &AppError) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            message: e.user_facing_message(),
            error_code: e.code().to_string(),
            is_retryable: e.is_retryable(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NavigationIntent {
    OpenDesk { desk_id: DeskId },
}

#[derive(Debug, Clone, Default)]
pub struct Model {
    pub location_policy: LocationPolicy,
    /// Wall clock at the last update, used for relative timestamps.
    pub now_ms: i64,
    pub mode: FilterMode,
    pub coordinate: Coordinate,
    pub status: FetchStatus,
    pub desks: Vec<Desk>,
    pub list_generation: Generation,
    pub location_generation: Generation,
    pub location_pending: bool,
    pub location_issue: Option<AppError>,
    pub notification: Option<Notification>,
}

impl Model {
    /// Ordered desks for the current inputs. Always derived, never stored.
    #[must_use]
    pub fn current_view(&self) -> Vec<Desk> {
        rank(&self.desks, self.mode, self.coordinate)
    }

    #[must_use]
    pub fn snapshot(&self) -> ListSnapshot {
        ListSnapshot::build(&self.desks, self.mode, self.coordinate)
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.status.is_loading()
    }

    pub fn raise_notification(&mut self, error: &AppError) {
        self.notification = Some(Notification::from(error));
    }

    pub fn take_notification(&mut self) -> Option<Notification> {
        self.notification.take()
    }

    /// Clears the notification only if it is still the one the shell showed.
    pub fn dismiss_notification(&mut self, id: &str) -> bool {
        if self.notification.as_ref().is_some_and(|n| n.id == id) {
            self.notification = None;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn contains_desk(&self, id: &DeskId) -> bool {
        self.desks.iter().any(|d| &d.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod coordinate_tests {
        use super::*;

        #[test]
        fn test_valid_coordinates() {
            assert!(ValidatedCoordinate::new(0.0, 0.0).is_ok());
            assert!(ValidatedCoordinate::new(90.0, 180.0).is_ok());
            assert!(ValidatedCoordinate::new(-90.0, -180.0).is_ok());
        }

        #[test]
        fn test_invalid_coordinates() {
            assert!(matches!(
                ValidatedCoordinate::new(91.0, 0.0),
                Err(CoordinateError::LatitudeOutOfRange(_))
            ));
            assert!(matches!(
                ValidatedCoordinate::new(0.0, -181.0),
                Err(CoordinateError::LongitudeOutOfRange(_))
            ));
            assert!(matches!(
                ValidatedCoordinate::new(f64::NAN, 0.0),
                Err(CoordinateError::NonFinite)
            ));
        }

        #[test]
        fn test_coordinate_states() {
            let here = ValidatedCoordinate::new(52.52, 13.405).unwrap();
            assert_eq!(Coordinate::Resolved(here).resolved(), Some(here));
            assert_eq!(Coordinate::Unset.resolved(), None);
            assert!(Coordinate::Denied.is_denied());
            assert_eq!(Coordinate::default(), Coordinate::Unset);
        }

        #[test]
        fn test_deserialize_rejects_out_of_range() {
            let ok: ValidatedCoordinate =
                serde_json::from_str(r#"{"lat": 52.52, "lon": 13.405}"#).unwrap();
            assert_eq!(ok.lat(), 52.52);

            let err = serde_json::from_str::<ValidatedCoordinate>(r#"{"lat": 200.0, "lon": 0.0}"#)
                .unwrap_err();
            assert!(err.to_string().contains("Latitude 200"));

            let resolved = serde_json::from_str::<Coordinate>(
                r#"{"state": "resolved", "lat": 0.0, "lon": 999.0}"#,
            );
            assert!(resolved.is_err());
        }
    }

    mod desk_tests {
        use super::*;

        #[test]
        fn test_decode_numeric_id_and_date_only() {
            let desk: Desk = serde_json::from_str(
                r#"{
                    "id": 1,
                    "createdAt": "2024-01-01",
                    "latitude": 52.52,
                    "longitude": 13.405,
                    "developer": {"name": "Ada", "email": "ada@example.com"},
                    "uri": "https://img.example.com/1.jpg"
                }"#,
            )
            .unwrap();

            assert_eq!(desk.id.as_str(), "1");
            assert_eq!(desk.created_at.to_rfc3339(), "2024-01-01T00:00:00+00:00");
            assert_eq!(desk.image_ref, "https://img.example.com/1.jpg");
            assert_eq!(desk.developer.name, "Ada");
        }

        #[test]
        fn test_decode_string_id_and_rfc3339() {
            let desk: Desk = serde_json::from_str(
                r#"{
                    "id": "desk-7",
                    "createdAt": "2024-02-01T10:30:00.000Z",
                    "latitude": 0.0,
                    "longitude": 0.0,
                    "developer": {"name": "Lin", "email": "lin@example.com"},
                    "uri": "file:///tmp/7.png"
                }"#,
            )
            .unwrap();

            assert_eq!(desk.id, DeskId::new("desk-7"));
            assert_eq!(desk.created_at.timestamp(), 1_706_783_400);
        }

        #[test]
        fn test_decode_millis_timestamp() {
            let desk: Desk = serde_json::from_str(
                r#"{
                    "id": 3,
                    "createdAt": 1704067200000,
                    "latitude": 1.0,
                    "longitude": 1.0,
                    "developer": {"name": "Kim", "email": "kim@example.com"},
                    "uri": "x"
                }"#,
            )
            .unwrap();

            assert_eq!(desk.created_at, parse_timestamp("2024-01-01").unwrap());
        }

        #[test]
        fn test_decode_rejects_garbage_timestamp() {
            let result: Result<Desk, _> = serde_json::from_str(
                r#"{
                    "id": 3,
                    "createdAt": "yesterday",
                    "latitude": 1.0,
                    "longitude": 1.0,
                    "developer": {"name": "Kim", "email": "kim@example.com"},
                    "uri": "x"
                }"#,
            );
            assert!(result.is_err());
        }

        #[test]
        fn test_parse_naive_datetime_as_utc() {
            let parsed = parse_timestamp("2024-03-05T08:15:00").unwrap();
            assert_eq!(parsed.to_rfc3339(), "2024-03-05T08:15:00+00:00");
        }

        #[test]
        fn test_developer_debug_redacts_email() {
            let dev = Developer {
                name: "Ada".into(),
                email: "ada@example.com".into(),
            };
            let printed = format!("{dev:?}");
            assert!(printed.contains("Ada"));
            assert!(!printed.contains("ada@example.com"));
        }
    }

    mod state_tests {
        use super::*;

        #[test]
        fn test_generation_is_monotonic() {
            let g = Generation::default();
            assert!(g.next() > g);
            assert_eq!(g.next().next().value(), 2);
            assert_eq!(Generation::new(u64::MAX).next().value(), u64::MAX);
        }

        #[test]
        fn test_filter_mode_labels() {
            assert_eq!(FilterMode::default(), FilterMode::Newest);
            let labels: Vec<_> = FilterMode::ALL.iter().map(|m| m.label()).collect();
            assert_eq!(labels, vec!["Newest", "Trending", "Near me"]);
            assert!(FilterMode::NearMe.uses_location());
            assert!(!FilterMode::Trending.uses_location());
        }

        #[test]
        fn test_notification_is_taken_once() {
            let mut model = Model::default();
            model.raise_notification(&AppError::new(crate::ErrorKind::Network, "offline"));
            let first = model.take_notification();
            assert!(first.is_some());
            assert_eq!(first.unwrap().error_code, "NETWORK_ERROR");
            assert!(model.take_notification().is_none());
        }

        #[test]
        fn test_dismiss_matches_id() {
            let mut model = Model::default();
            model.raise_notification(&AppError::new(crate::ErrorKind::Network, "offline"));
            let id = model.notification.as_ref().unwrap().id.clone();

            assert!(!model.dismiss_notification("someone-else"));
            assert!(model.notification.is_some());
            assert!(model.dismiss_notification(&id));
            assert!(model.notification.is_none());
        }
    }
}
