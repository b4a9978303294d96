#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Road-route overlay client.
//!
//! Fetches driving routes from an OSRM-compatible service so the map can
//! draw roads next to the straight-line radius. Routes are decorative:
//! every failure is logged and skipped, nothing here aborts a run.
//!
//! The public OSRM demo server allows roughly one request per second, so
//! lookups are capped and spaced out (see [`RoutingOptions`]).

pub mod progress;

use std::time::Duration;

use field_radius_normalize::NormalizedKey;
use field_radius_roster_models::HomePoint;
use geo::{Coord, LineString};
use progress::ProgressCallback;
use serde::{Deserialize, Serialize};

/// Public OSRM demo instance.
pub const DEFAULT_BASE_URL: &str = "https://router.project-osrm.org";

const USER_AGENT: &str = "field-radius/0.1 (+https://github.com/BSteffaniak/field-radius)";

/// Errors from a single route lookup.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be interpreted.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parse failure.
        message: String,
    },

    /// The service answered 429.
    #[error("Rate limited by routing service")]
    RateLimited,
}

/// Lookup limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingOptions {
    /// Service root, without a trailing slash.
    pub base_url: String,
    /// Only the first `max_routes` requests are looked up.
    pub max_routes: usize,
    /// Pause between two consecutive calls.
    pub delay_ms: u64,
    /// Per-call timeout.
    pub timeout_secs: u64,
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_routes: 10,
            delay_ms: 1000,
            timeout_secs: 10,
        }
    }
}

/// A route to look up: one specialist home to one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    /// Specialist the route belongs to.
    pub specialist: NormalizedKey,
    /// Destination unit.
    pub unit_key: NormalizedKey,
    /// Route start.
    pub from: HomePoint,
    /// Route end.
    pub to: HomePoint,
}

/// A fetched road route.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Specialist the route belongs to.
    pub specialist: NormalizedKey,
    /// Destination unit.
    pub unit_key: NormalizedKey,
    /// Road geometry, longitude/latitude.
    pub line: LineString<f64>,
    /// Road distance in km.
    pub distance_km: f64,
    /// Travel time in minutes.
    pub duration_min: f64,
}

/// A lookup that did not produce a route.
#[derive(Debug)]
pub struct RouteFailure {
    /// Specialist of the failed request.
    pub specialist: NormalizedKey,
    /// Unit of the failed request.
    pub unit_key: NormalizedKey,
    /// Why it failed.
    pub error: RoutingError,
}

/// Road geometry and totals as returned by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteLeg {
    /// Road geometry.
    pub line: LineString<f64>,
    /// Road distance in km.
    pub distance_km: f64,
    /// Travel time in minutes.
    pub duration_min: f64,
}

/// Builds a client with the per-call timeout applied.
///
/// # Errors
///
/// Returns [`RoutingError::Http`] if the client cannot be built.
pub fn build_client(options: &RoutingOptions) -> Result<reqwest::Client, RoutingError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(options.timeout_secs))
        .build()
        .map_err(Into::into)
}

/// Route URL for one origin/destination pair.
#[must_use]
pub fn route_url(base_url: &str, from: HomePoint, to: HomePoint) -> String {
    format!(
        "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
        base_url.trim_end_matches('/'),
        from.lon,
        from.lat,
        to.lon,
        to.lat,
    )
}

/// Fetches one driving route.
///
/// Returns `Ok(None)` when the service found no route between the points.
///
/// # Errors
///
/// Returns [`RoutingError`] if the HTTP request fails, the service rate
/// limits us, or the response cannot be parsed.
pub async fn fetch_route(
    client: &reqwest::Client,
    base_url: &str,
    from: HomePoint,
    to: HomePoint,
) -> Result<Option<RouteLeg>, RoutingError> {
    let resp = client.get(route_url(base_url, from, to)).send().await?;

    if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(RoutingError::RateLimited);
    }

    let body: serde_json::Value = resp.json().await?;
    parse_response(&body)
}

/// Looks up the first `options.max_routes` requests, one attempt each,
/// pausing `options.delay_ms` between calls.
///
/// Failed or empty lookups are logged and returned separately; they never
/// stop the remaining lookups.
pub async fn fetch_routes(
    client: &reqwest::Client,
    requests: &[RouteRequest],
    options: &RoutingOptions,
    progress: &dyn ProgressCallback,
) -> (Vec<Route>, Vec<RouteFailure>) {
    let capped = &requests[..requests.len().min(options.max_routes)];
    if capped.len() < requests.len() {
        log::info!(
            "Routing capped to {} of {} assignments",
            capped.len(),
            requests.len()
        );
    }

    if capped.is_empty() {
        progress.finish_and_clear();
        return (Vec::new(), Vec::new());
    }

    progress.set_total(capped.len() as u64);

    let mut routes = Vec::new();
    let mut failures = Vec::new();

    for (i, request) in capped.iter().enumerate() {
        if i > 0 && options.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(options.delay_ms)).await;
        }
        progress.set_message(format!("{} -> {}", request.specialist, request.unit_key));

        match fetch_route(client, &options.base_url, request.from, request.to).await {
            Ok(Some(leg)) => routes.push(Route {
                specialist: request.specialist.clone(),
                unit_key: request.unit_key.clone(),
                line: leg.line,
                distance_km: leg.distance_km,
                duration_min: leg.duration_min,
            }),
            Ok(None) => {
                log::warn!(
                    "No route found from {} to {}",
                    request.specialist,
                    request.unit_key
                );
            }
            Err(e) => {
                log::warn!(
                    "Route lookup from {} to {} failed: {e}",
                    request.specialist,
                    request.unit_key
                );
                failures.push(RouteFailure {
                    specialist: request.specialist.clone(),
                    unit_key: request.unit_key.clone(),
                    error: e,
                });
            }
        }
        progress.inc(1);
    }

    progress.finish(format!("Fetched {} routes", routes.len()));
    (routes, failures)
}

/// Parses an OSRM route response. Only the first route is used.
fn parse_response(body: &serde_json::Value) -> Result<Option<RouteLeg>, RoutingError> {
    let code = body["code"].as_str().ok_or_else(|| RoutingError::Parse {
        message: "Route response has no code".to_string(),
    })?;

    if code == "NoRoute" {
        return Ok(None);
    }
    if code != "Ok" {
        return Err(RoutingError::Parse {
            message: format!("Routing service answered {code}"),
        });
    }

    let Some(first) = body["routes"].as_array().and_then(|r| r.first()) else {
        return Ok(None);
    };

    let coordinates = first["geometry"]["coordinates"]
        .as_array()
        .ok_or_else(|| RoutingError::Parse {
            message: "Missing route geometry".to_string(),
        })?;

    let coords = coordinates
        .iter()
        .map(|pair| match (pair[0].as_f64(), pair[1].as_f64()) {
            (Some(x), Some(y)) => Ok(Coord { x, y }),
            _ => Err(RoutingError::Parse {
                message: format!("Bad route coordinate {pair}"),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let distance_m = first["distance"].as_f64().ok_or_else(|| RoutingError::Parse {
        message: "Missing route distance".to_string(),
    })?;
    let duration_s = first["duration"].as_f64().ok_or_else(|| RoutingError::Parse {
        message: "Missing route duration".to_string(),
    })?;

    Ok(Some(RouteLeg {
        line: LineString::new(coords),
        distance_km: distance_m / 1000.0,
        duration_min: duration_s / 60.0,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_route_url() {
        let url = route_url(
            "https://example.org/",
            HomePoint::from_lat_lon(-16.5, -49.25),
            HomePoint::from_lat_lon(-16.7, -49.2),
        );
        assert_eq!(
            url,
            "https://example.org/route/v1/driving/-49.25,-16.5;-49.2,-16.7?overview=full&geometries=geojson"
        );
    }

    #[test]
    fn parses_osrm_route() {
        let body = serde_json::json!({
            "code": "Ok",
            "routes": [{
                "distance": 12_345.0,
                "duration": 900.0,
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[-49.25, -16.68], [-49.22, -16.69], [-49.20, -16.70]]
                }
            }]
        });
        let leg = parse_response(&body).unwrap().unwrap();
        assert_eq!(leg.line.0.len(), 3);
        assert!((leg.distance_km - 12.345).abs() < 1e-9);
        assert!((leg.duration_min - 15.0).abs() < 1e-9);
        assert!((leg.line.0[0].x - -49.25).abs() < 1e-9);
    }

    #[test]
    fn no_route_is_none() {
        let body = serde_json::json!({ "code": "NoRoute", "routes": [] });
        assert!(parse_response(&body).unwrap().is_none());

        let body = serde_json::json!({ "code": "Ok", "routes": [] });
        assert!(parse_response(&body).unwrap().is_none());
    }

    #[test]
    fn error_codes_are_parse_errors() {
        let body = serde_json::json!({ "code": "InvalidQuery" });
        assert!(matches!(
            parse_response(&body),
            Err(RoutingError::Parse { .. })
        ));
        assert!(parse_response(&serde_json::json!({})).is_err());
    }

    #[test]
    fn bad_coordinate_is_parse_error() {
        let body = serde_json::json!({
            "code": "Ok",
            "routes": [{
                "distance": 1.0,
                "duration": 1.0,
                "geometry": { "coordinates": [["a", "b"]] }
            }]
        });
        assert!(matches!(
            parse_response(&body),
            Err(RoutingError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn zero_cap_makes_no_calls() {
        let options = RoutingOptions {
            base_url: "http://127.0.0.1:1".to_string(),
            max_routes: 0,
            ..RoutingOptions::default()
        };
        let client = build_client(&options).unwrap();
        let requests = vec![RouteRequest {
            specialist: "MARIA".into(),
            unit_key: "FAZENDA".into(),
            from: HomePoint::from_lat_lon(-16.68, -49.25),
            to: HomePoint::from_lat_lon(-16.70, -49.20),
        }];
        let progress = RecordingProgress::default();
        let (routes, failures) = fetch_routes(&client, &requests, &options, &progress).await;
        assert!(routes.is_empty());
        assert!(failures.is_empty());
        assert_eq!(progress.events(), vec!["clear"]);
    }

    #[tokio::test]
    async fn failed_lookup_is_collected_not_fatal() {
        let options = RoutingOptions {
            base_url: "http://127.0.0.1:1".to_string(),
            delay_ms: 0,
            timeout_secs: 2,
            ..RoutingOptions::default()
        };
        let client = build_client(&options).unwrap();
        let requests = vec![RouteRequest {
            specialist: "MARIA".into(),
            unit_key: "FAZENDA".into(),
            from: HomePoint::from_lat_lon(-16.68, -49.25),
            to: HomePoint::from_lat_lon(-16.70, -49.20),
        }];
        let progress = RecordingProgress::default();
        let (routes, failures) = fetch_routes(&client, &requests, &options, &progress).await;
        assert!(routes.is_empty());
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].error, RoutingError::Http(_)));
        assert_eq!(
            progress.events(),
            vec!["total 1", "message MARIA -> FAZENDA", "inc 1", "finish Fetched 0 routes"]
        );
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: std::sync::Mutex<Vec<String>>,
    }

    impl RecordingProgress {
        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ProgressCallback for RecordingProgress {
        fn set_total(&self, total: u64) {
            self.push(format!("total {total}"));
        }
        fn inc(&self, delta: u64) {
            self.push(format!("inc {delta}"));
        }
        fn set_message(&self, msg: String) {
            self.push(format!("message {msg}"));
        }
        fn finish(&self, msg: String) {
            self.push(format!("finish {msg}"));
        }
        fn finish_and_clear(&self) {
            self.push("clear".to_string());
        }
    }
}
