//! Tracking-service HTTP adapter for live positions.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::error::UpstreamError;
use crate::model::GeoPoint;
use crate::schedule::DEFAULT_TIME_ZONE;
use crate::traits::PositionResolver;

const SERVICE: &str = "tracking";

/// Layout of the fix timestamp; any fraction or zone suffix is ignored.
const FIX_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone)]
pub struct TrackingConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Fixes older than this are treated as missing.
    pub max_fix_age: Duration,
    /// Zone the service writes its local timestamps in.
    pub time_zone: Tz,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/tracking/".to_string(),
            timeout_secs: 10,
            max_fix_age: Duration::from_secs(12 * 3600),
            time_zone: DEFAULT_TIME_ZONE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackingClient {
    config: TrackingConfig,
    client: reqwest::blocking::Client,
}

impl TrackingClient {
    pub fn new(config: TrackingConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }
}

impl PositionResolver for TrackingClient {
    fn current_position(&self, device_id: &str) -> Result<Option<GeoPoint>, UpstreamError> {
        let url = format!(
            "{}/getPositionData",
            self.config.base_url.trim_end_matches('/')
        );
        let fixes = self
            .client
            .get(url)
            .query(&[("idList", device_id)])
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<Vec<TrackingFix>>())
            .map_err(|err| UpstreamError::from_reqwest(SERVICE, err))?;

        latest_fresh_fix(
            &fixes,
            Utc::now(),
            self.config.max_fix_age,
            self.config.time_zone,
        )
    }
}

/// Resolver for deployments without a tracking service: never has a fix.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTracking;

impl PositionResolver for NoTracking {
    fn current_position(&self, _device_id: &str) -> Result<Option<GeoPoint>, UpstreamError> {
        Ok(None)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingFix {
    pub latitude: f64,
    pub longitude: f64,
    pub date: String,
}

/// Position of the first fix, unless it is older than `max_age` at `now`.
pub fn latest_fresh_fix(
    fixes: &[TrackingFix],
    now: DateTime<Utc>,
    max_age: Duration,
    zone: Tz,
) -> Result<Option<GeoPoint>, UpstreamError> {
    let Some(fix) = fixes.first() else {
        return Ok(None);
    };

    let taken_at = parse_fix_date(&fix.date, zone)?;
    let cutoff = chrono::Duration::from_std(max_age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age));
    if cutoff.is_some_and(|cutoff| taken_at < cutoff) {
        return Ok(None);
    }

    Ok(Some(GeoPoint::new(fix.latitude, fix.longitude)))
}

fn parse_fix_date(raw: &str, zone: Tz) -> Result<DateTime<Utc>, UpstreamError> {
    let decode_error = || UpstreamError::Decode {
        service: SERVICE,
        message: format!("unreadable fix date {:?}", raw),
    };
    let local = raw
        .get(..19)
        .and_then(|prefix| NaiveDateTime::parse_from_str(prefix, FIX_DATE_FORMAT).ok())
        .ok_or_else(decode_error)?;

    zone.from_local_datetime(&local)
        .earliest()
        .map(|taken_at| taken_at.with_timezone(&Utc))
        .ok_or_else(decode_error)
}
