//! Ordering of the desk list for each filter mode.
//!
//! Everything here is pure: the same desks, mode and coordinate always give the
//! same permutation, and desk contents are never touched.

use serde::{Deserialize, Serialize};

use crate::model::{Coordinate, Desk, FilterMode, ValidatedCoordinate};
use crate::EARTH_RADIUS_M;

#[must_use]
pub fn haversine_distance(p1: ValidatedCoordinate, p2: ValidatedCoordinate) -> f64 {
    const EPSILON: f64 = 1e-10;

    if (p1.lat() - p2.lat()).abs() < EPSILON && (p1.lon() - p2.lon()).abs() < EPSILON {
        return 0.0;
    }

    let lat1_rad = p1.lat().to_radians();
    let lat2_rad = p2.lat().to_radians();
    let delta_lat = (p2.lat() - p1.lat()).to_radians();
    let delta_lon = (p2.lon() - p1.lon()).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);

    let a = a.clamp(0.0, 1.0);

    let c = 2.0 * a.sqrt().asin();

    let result = EARTH_RADIUS_M * c;

    if result.is_finite() {
        result
    } else {
        f64::MAX
    }
}

/// Distance in meters from `origin` to the desk, or `None` when either side is unusable.
#[must_use]
pub fn distance_from(desk: &Desk, origin: Coordinate) -> Option<f64> {
    let origin = origin.resolved()?;
    desk.coordinate()
        .ok()
        .map(|coord| haversine_distance(origin, coord))
}

/// Orders `desks` for `mode`. Every branch is a stable permutation of the input.
#[must_use]
pub fn rank(desks: &[Desk], mode: FilterMode, origin: Coordinate) -> Vec<Desk> {
    let mut ranked = desks.to_vec();

    match mode {
        FilterMode::Newest => {
            ranked.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        // No trending score exists yet; the server order is kept.
        FilterMode::Trending => {}
        FilterMode::NearMe => {
            let Some(origin) = origin.resolved() else {
                return ranked;
            };
            // Desks with unusable coordinates sink to the bottom in input order.
            let mut keyed: Vec<(f64, Desk)> = ranked
                .into_iter()
                .map(|desk| {
                    let distance = desk
                        .coordinate()
                        .map_or(f64::INFINITY, |coord| haversine_distance(origin, coord));
                    (distance, desk)
                })
                .collect();
            keyed.sort_by(|(da, _), (db, _)| da.total_cmp(db));
            ranked = keyed.into_iter().map(|(_, desk)| desk).collect();
        }
    }

    ranked
}

/// Ranked desks tagged with the inputs that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListSnapshot {
    pub desks: Vec<Desk>,
    pub mode: FilterMode,
    pub coordinate: Coordinate,
}

impl ListSnapshot {
    #[must_use]
    pub fn build(desks: &[Desk], mode: FilterMode, coordinate: Coordinate) -> Self {
        Self {
            desks: rank(desks, mode, coordinate),
            mode,
            coordinate,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.desks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.desks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{parse_timestamp, DeskId, Developer};
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;

    fn desk(id: u32, created_at: &str, lat: f64, lon: f64) -> Desk {
        Desk {
            id: DeskId::new(id.to_string()),
            created_at: parse_timestamp(created_at).unwrap(),
            latitude: lat,
            longitude: lon,
            developer: Developer {
                name: format!("dev{id}"),
                email: format!("dev{id}@example.com"),
            },
            image_ref: format!("https://img.example.com/{id}.jpg"),
        }
    }

    fn ids(desks: &[Desk]) -> Vec<&str> {
        desks.iter().map(|d| d.id.as_str()).collect()
    }

    fn origin() -> ValidatedCoordinate {
        ValidatedCoordinate::new(52.5200, 13.4050).unwrap()
    }

    /// Point roughly `meters` north of `origin()`.
    fn north_of_origin(meters: f64) -> (f64, f64) {
        let delta_lat = (meters / EARTH_RADIUS_M).to_degrees();
        (origin().lat() + delta_lat, origin().lon())
    }

    mod distance_tests {
        use super::*;

        #[test]
        fn test_same_point_distance() {
            let p = origin();
            assert_eq!(haversine_distance(p, p), 0.0);
        }

        #[test]
        fn test_london_paris_distance() {
            let london = ValidatedCoordinate::new(51.5074, -0.1278).unwrap();
            let paris = ValidatedCoordinate::new(48.8566, 2.3522).unwrap();
            let distance = haversine_distance(london, paris);
            assert!((distance - 343_500.0).abs() < 10_000.0);
        }

        #[test]
        fn test_distance_is_symmetric() {
            let london = ValidatedCoordinate::new(51.5074, -0.1278).unwrap();
            let paris = ValidatedCoordinate::new(48.8566, 2.3522).unwrap();
            let there = haversine_distance(london, paris);
            let back = haversine_distance(paris, london);
            assert!((there - back).abs() < 1e-6);
        }

        #[test]
        fn test_antipodal_distance() {
            let p1 = ValidatedCoordinate::new(0.0, 0.0).unwrap();
            let p2 = ValidatedCoordinate::new(0.0, 180.0).unwrap();
            let expected = std::f64::consts::PI * EARTH_RADIUS_M;
            assert!((haversine_distance(p1, p2) - expected).abs() < 1000.0);
        }

        #[test]
        fn test_distance_from_needs_resolved_origin() {
            let (lat, lon) = north_of_origin(250.0);
            let d = desk(1, "2024-01-01", lat, lon);
            assert!(distance_from(&d, Coordinate::Unset).is_none());
            assert!(distance_from(&d, Coordinate::Denied).is_none());
            let meters = distance_from(&d, Coordinate::Resolved(origin())).unwrap();
            assert!((meters - 250.0).abs() < 1.0);
        }
    }

    mod newest_tests {
        use super::*;

        #[test]
        fn test_newest_first() {
            let desks = vec![desk(1, "2024-01-01", 0.0, 0.0), desk(2, "2024-02-01", 0.0, 0.0)];
            let ranked = rank(&desks, FilterMode::Newest, Coordinate::Unset);
            assert_eq!(ids(&ranked), vec!["2", "1"]);
        }

        #[test]
        fn test_equal_timestamps_keep_input_order() {
            let desks = vec![
                desk(1, "2024-01-01", 0.0, 0.0),
                desk(2, "2024-03-01", 0.0, 0.0),
                desk(3, "2024-01-01", 0.0, 0.0),
                desk(4, "2024-01-01", 0.0, 0.0),
            ];
            let ranked = rank(&desks, FilterMode::Newest, Coordinate::Unset);
            assert_eq!(ids(&ranked), vec!["2", "1", "3", "4"]);
        }

        #[test]
        fn test_empty_input() {
            assert!(rank(&[], FilterMode::Newest, Coordinate::Unset).is_empty());
        }
    }

    mod trending_tests {
        use super::*;

        #[test]
        fn test_trending_keeps_source_order() {
            let desks = vec![
                desk(3, "2024-01-01", 0.0, 0.0),
                desk(1, "2024-05-01", 0.0, 0.0),
                desk(2, "2024-03-01", 0.0, 0.0),
            ];
            let ranked = rank(&desks, FilterMode::Trending, Coordinate::Resolved(origin()));
            assert_eq!(ranked, desks);
        }
    }

    mod near_me_tests {
        use super::*;

        #[test]
        fn test_nearer_desk_first() {
            let (far_lat, far_lon) = north_of_origin(500.0);
            let (near_lat, near_lon) = north_of_origin(100.0);
            let desks = vec![
                desk(1, "2024-01-01", far_lat, far_lon),
                desk(2, "2024-01-01", near_lat, near_lon),
            ];
            let ranked = rank(&desks, FilterMode::NearMe, Coordinate::Resolved(origin()));
            assert_eq!(ids(&ranked), vec!["2", "1"]);
        }

        #[test]
        fn test_denied_is_passthrough() {
            let (far_lat, far_lon) = north_of_origin(500.0);
            let (near_lat, near_lon) = north_of_origin(100.0);
            let desks = vec![
                desk(1, "2024-01-01", far_lat, far_lon),
                desk(2, "2024-01-01", near_lat, near_lon),
            ];
            assert_eq!(rank(&desks, FilterMode::NearMe, Coordinate::Denied), desks);
            assert_eq!(rank(&desks, FilterMode::NearMe, Coordinate::Unset), desks);
        }

        #[test]
        fn test_invalid_desk_coordinates_sink_in_input_order() {
            let (near_lat, near_lon) = north_of_origin(100.0);
            let desks = vec![
                desk(1, "2024-01-01", f64::NAN, 0.0),
                desk(2, "2024-01-01", near_lat, near_lon),
                desk(3, "2024-01-01", 95.0, 0.0),
            ];
            let ranked = rank(&desks, FilterMode::NearMe, Coordinate::Resolved(origin()));
            assert_eq!(ids(&ranked), vec!["2", "1", "3"]);
        }

        #[test]
        fn test_snapshot_tags_inputs() {
            let desks = vec![desk(1, "2024-01-01", 0.0, 0.0)];
            let coordinate = Coordinate::Resolved(origin());
            let snapshot = ListSnapshot::build(&desks, FilterMode::NearMe, coordinate);
            assert_eq!(snapshot.mode, FilterMode::NearMe);
            assert_eq!(snapshot.coordinate, coordinate);
            assert_eq!(snapshot.len(), 1);
            assert!(!snapshot.is_empty());
        }
    }

    fn arb_desks() -> impl Strategy<Value = Vec<Desk>> {
        prop::collection::vec(
            (0i64..2_000_000_000_000, -90.0f64..=90.0, -180.0f64..=180.0),
            0..40,
        )
        .prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (millis, lat, lon))| Desk {
                    id: DeskId::new(i.to_string()),
                    // Coarse buckets so equal timestamps actually occur.
                    created_at: DateTime::<Utc>::from_timestamp_millis(millis / 100_000_000_000 * 1000)
                        .unwrap(),
                    latitude: lat,
                    longitude: lon,
                    developer: Developer {
                        name: format!("dev{i}"),
                        email: format!("dev{i}@example.com"),
                    },
                    image_ref: format!("img{i}"),
                })
                .collect()
        })
    }

    fn arb_mode() -> impl Strategy<Value = FilterMode> {
        prop_oneof![
            Just(FilterMode::Newest),
            Just(FilterMode::Trending),
            Just(FilterMode::NearMe),
        ]
    }

    fn arb_coordinate() -> impl Strategy<Value = Coordinate> {
        prop_oneof![
            Just(Coordinate::Unset),
            Just(Coordinate::Denied),
            (-90.0f64..=90.0, -180.0f64..=180.0).prop_map(|(lat, lon)| {
                Coordinate::Resolved(ValidatedCoordinate::new(lat, lon).unwrap())
            }),
        ]
    }

    fn position(desks: &[Desk], id: &DeskId) -> usize {
        desks.iter().position(|d| &d.id == id).unwrap()
    }

    proptest! {
        #[test]
        fn newest_is_stable_descending(desks in arb_desks()) {
            let ranked = rank(&desks, FilterMode::Newest, Coordinate::Unset);
            for pair in ranked.windows(2) {
                prop_assert!(pair[0].created_at >= pair[1].created_at);
                if pair[0].created_at == pair[1].created_at {
                    prop_assert!(position(&desks, &pair[0].id) < position(&desks, &pair[1].id));
                }
            }
        }

        #[test]
        fn near_me_is_non_decreasing(desks in arb_desks(), lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
            let origin = ValidatedCoordinate::new(lat, lon).unwrap();
            let ranked = rank(&desks, FilterMode::NearMe, Coordinate::Resolved(origin));
            let distances: Vec<f64> = ranked
                .iter()
                .map(|d| haversine_distance(origin, d.coordinate().unwrap()))
                .collect();
            for pair in distances.windows(2) {
                prop_assert!(pair[0] <= pair[1]);
            }
        }

        #[test]
        fn near_me_without_fix_is_identity(desks in arb_desks()) {
            prop_assert_eq!(rank(&desks, FilterMode::NearMe, Coordinate::Unset), desks);
        }

        #[test]
        fn ranking_is_idempotent(desks in arb_desks(), mode in arb_mode(), coordinate in arb_coordinate()) {
            let once = rank(&desks, mode, coordinate);
            let twice = rank(&once, mode, coordinate);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn ranking_is_a_permutation(desks in arb_desks(), mode in arb_mode(), coordinate in arb_coordinate()) {
            let ranked = rank(&desks, mode, coordinate);
            prop_assert_eq!(ranked.len(), desks.len());
            for desk in &desks {
                let matched = ranked.iter().find(|d| d.id == desk.id);
                prop_assert_eq!(matched, Some(desk));
            }
        }
    }
}
