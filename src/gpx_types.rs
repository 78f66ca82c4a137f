use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{Gpx2CsvError, Result};

/// Meters per degree of latitude on the approximate sphere used for short hops.
const ONE_DEGREE_M: f64 = 1000.0 * 10000.8 / 90.0;

/// Equatorial radius (WGS84) used for haversine distances.
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Beyond this many degrees the flat approximation is replaced by haversine.
const FLAT_DISTANCE_LIMIT_DEG: f64 = 0.2;

/// Parsed GPX data. Only tracks are kept; waypoints and routes are skipped.
#[derive(Debug, Default)]
pub struct GpxData {
    pub tracks: Vec<GpxTrack>,
}

impl GpxData {
    /// Number of track points across all tracks and segments.
    pub fn point_count(&self) -> usize {
        self.tracks
            .iter()
            .flat_map(|t| t.segments.iter())
            .map(|s| s.points.len())
            .sum()
    }
}

/// A GPX track (<trk>).
#[derive(Debug, Default)]
pub struct GpxTrack {
    pub name: Option<String>,
    pub segments: Vec<GpxSegment>,
}

/// A GPX track segment (<trkseg>).
#[derive(Debug, Default)]
pub struct GpxSegment {
    pub points: Vec<GpxPoint>,
}

impl GpxSegment {
    /// Instantaneous speed (m/s) at `index`, averaged over the hops to the
    /// previous and next points. `None` when neither hop yields a speed,
    /// e.g. a lone point or missing timestamps.
    pub fn speed_at(&self, index: usize) -> Option<f64> {
        let point = self.points.get(index)?;

        let before = index
            .checked_sub(1)
            .and_then(|i| self.points.get(i))
            .and_then(|prev| point.speed_between(prev))
            .map(f64::abs);
        let after = self
            .points
            .get(index + 1)
            .and_then(|next| point.speed_between(next))
            .map(f64::abs);

        // A zero speed on the leading hop defers to the trailing one.
        match (before.filter(|s| *s != 0.0), after.filter(|s| *s != 0.0)) {
            (Some(b), Some(a)) => Some((b + a) / 2.0),
            (Some(b), None) => Some(b),
            (None, _) => after,
        }
    }
}

/// A single track point (<trkpt>).
#[derive(Debug, Clone)]
pub struct GpxPoint {
    pub lat: f64,
    pub lon: f64,
    pub ele: Option<f64>,
    pub time: Option<DateTime<Utc>>,
    pub extensions: Vec<ExtensionElement>,
}

impl GpxPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            ele: None,
            time: None,
            extensions: Vec::new(),
        }
    }

    /// Ground distance in meters, ignoring elevation.
    pub fn distance_2d(&self, other: &GpxPoint) -> f64 {
        if (self.lat - other.lat).abs() > FLAT_DISTANCE_LIMIT_DEG
            || (self.lon - other.lon).abs() > FLAT_DISTANCE_LIMIT_DEG
        {
            return haversine_distance(self.lat, self.lon, other.lat, other.lon);
        }

        let coef = self.lat.to_radians().cos();
        let x = self.lat - other.lat;
        let y = (self.lon - other.lon) * coef;
        (x * x + y * y).sqrt() * ONE_DEGREE_M
    }

    /// Distance in meters including the elevation difference when both
    /// points carry one.
    pub fn distance_3d(&self, other: &GpxPoint) -> f64 {
        let flat = self.distance_2d(other);
        match (self.ele, other.ele) {
            (Some(a), Some(b)) if a != b => (flat * flat + (a - b) * (a - b)).sqrt(),
            _ => flat,
        }
    }

    /// Absolute seconds between two timestamped points.
    pub fn time_difference(&self, other: &GpxPoint) -> Option<f64> {
        let (a, b) = (self.time?, other.time?);
        let delta = (a - b).num_milliseconds() as f64 / 1000.0;
        Some(delta.abs())
    }

    /// Speed in m/s over the hop to `other`, `None` without a usable time delta.
    pub fn speed_between(&self, other: &GpxPoint) -> Option<f64> {
        let seconds = self.time_difference(other)?;
        if seconds == 0.0 {
            return None;
        }
        Some(self.distance_3d(other) / seconds)
    }
}

/// Raw element found under a point's <extensions>. Names are local
/// (namespace prefix stripped).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionElement {
    pub name: String,
    pub text: Option<String>,
    pub children: Vec<ExtensionElement>,
}

impl ExtensionElement {
    pub fn leaf(name: &str, text: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            text: text.map(str::to_string),
            children: Vec::new(),
        }
    }
}

/// Parse a GPX <time> value. Zoned values are converted to UTC, values
/// without a zone designator are taken as UTC.
pub fn parse_time(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| Gpx2CsvError::InvalidTimestamp(text.to_string()))
}

fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}
