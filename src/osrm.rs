//! OSRM HTTP adapter for travel times and route geometries.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{RouteError, UpstreamError};
use crate::model::GeoPoint;
use crate::polyline::{OSRM_PRECISION, Polyline};
use crate::traits::RouteEstimator;

const SERVICE: &str = "osrm";

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn route_url(&self, points: &[GeoPoint], with_geometry: bool) -> String {
        let coords = points
            .iter()
            .map(|p| format!("{:.6},{:.6}", p.longitude, p.latitude))
            .collect::<Vec<_>>()
            .join(";");
        let overview = if with_geometry {
            "overview=full&geometries=polyline"
        } else {
            "overview=false"
        };

        format!(
            "{}/route/v1/{}/{}?{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            coords,
            overview
        )
    }

    fn route(&self, points: &[GeoPoint], with_geometry: bool) -> Result<OsrmRoute, RouteError> {
        let url = self.route_url(points, with_geometry);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| UpstreamError::from_reqwest(SERVICE, err))?;

        // OSRM reports "no route" with a 4xx status and a JSON body, so the
        // body is decoded before looking at the status.
        let status = response.status();
        let body = response
            .json::<OsrmRouteResponse>()
            .map_err(|err| {
                if status.is_success() {
                    UpstreamError::from_reqwest(SERVICE, err)
                } else {
                    UpstreamError::Status {
                        service: SERVICE,
                        status: status.as_u16(),
                    }
                }
            })?;

        first_route(body)
    }
}

fn first_route(body: OsrmRouteResponse) -> Result<OsrmRoute, RouteError> {
    match body.code.as_str() {
        "Ok" => body.routes.into_iter().next().ok_or(RouteError::NoRoute),
        "NoRoute" | "NoSegment" => {
            debug!(code = %body.code, message = ?body.message, "osrm found no route");
            Err(RouteError::NoRoute)
        }
        other => Err(UpstreamError::Decode {
            service: SERVICE,
            message: format!("{}: {}", other, body.message.unwrap_or_default()),
        }
        .into()),
    }
}

fn decode_geometry(route: OsrmRoute) -> Result<Polyline, RouteError> {
    let encoded = route.geometry.ok_or(RouteError::NoRoute)?;
    Polyline::decode(&encoded, OSRM_PRECISION).map_err(|err| {
        UpstreamError::Decode {
            service: SERVICE,
            message: err.to_string(),
        }
        .into()
    })
}

fn travel_duration(route: &OsrmRoute) -> Result<Duration, RouteError> {
    Duration::try_from_secs_f64(route.duration.max(0.0)).map_err(|err| {
        UpstreamError::Decode {
            service: SERVICE,
            message: format!("route duration {}: {}", route.duration, err),
        }
        .into()
    })
}

impl RouteEstimator for OsrmClient {
    fn travel_time(&self, from: GeoPoint, to: GeoPoint) -> Result<Duration, RouteError> {
        travel_duration(&self.route(&[from, to], false)?)
    }

    fn polyline(&self, from: GeoPoint, to: GeoPoint) -> Result<Polyline, RouteError> {
        decode_geometry(self.route(&[from, to], true)?)
    }

    fn multi_stop_route(&self, points: &[GeoPoint]) -> Result<Polyline, RouteError> {
        if points.len() < 2 {
            return Err(RouteError::NoRoute);
        }
        decode_geometry(self.route(points, true)?)
    }
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// Seconds.
    duration: f64,
    #[serde(default)]
    geometry: Option<String>,
}
