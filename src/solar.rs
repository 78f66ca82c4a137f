//! Sun position for a place and instant, following the NOAA solar calculator
//! (Meeus, Astronomical Algorithms). Altitudes include the standard
//! atmospheric refraction correction.

use chrono::{DateTime, Timelike, Utc};

const JULIAN_DAY_UNIX_EPOCH: f64 = 2_440_587.5;
const JULIAN_DAY_J2000: f64 = 2_451_545.0;
const DAYS_PER_JULIAN_CENTURY: f64 = 36_525.0;
const MINUTES_PER_DAY: f64 = 1440.0;

/// Solar altitude above the horizon in degrees (negative below it).
pub fn altitude(lat: f64, lon: f64, when: DateTime<Utc>) -> f64 {
    let geometry = SunGeometry::at(lat, lon, when);
    let elevation = 90.0 - geometry.zenith_deg();
    elevation + refraction_deg(elevation)
}

/// Solar azimuth in degrees, clockwise from true north in [0, 360).
pub fn azimuth(lat: f64, lon: f64, when: DateTime<Utc>) -> f64 {
    let geometry = SunGeometry::at(lat, lon, when);
    let ha = geometry.hour_angle_deg.to_radians();
    let lat = lat.to_radians();
    let decl = geometry.declination_deg.to_radians();

    // Measured from south, westward positive
    let from_south = ha.sin().atan2(ha.cos() * lat.sin() - decl.tan() * lat.cos());
    (from_south.to_degrees() + 180.0).rem_euclid(360.0)
}

/// Intermediate quantities shared by the altitude and azimuth calculations.
struct SunGeometry {
    lat_deg: f64,
    declination_deg: f64,
    hour_angle_deg: f64,
}

impl SunGeometry {
    fn at(lat: f64, lon: f64, when: DateTime<Utc>) -> Self {
        let t = julian_century(when);

        let mean_long = (280.46646 + t * (36_000.76983 + t * 0.000_303_2)).rem_euclid(360.0);
        let mean_anomaly = 357.52911 + t * (35_999.05029 - 0.000_153_7 * t);
        let eccentricity = 0.016_708_634 - t * (0.000_042_037 + 0.000_000_126_7 * t);

        let m = mean_anomaly.to_radians();
        let center = m.sin() * (1.914_602 - t * (0.004_817 + 0.000_014 * t))
            + (2.0 * m).sin() * (0.019_993 - 0.000_101 * t)
            + (3.0 * m).sin() * 0.000_289;

        let true_long = mean_long + center;
        let omega = (125.04 - 1934.136 * t).to_radians();
        let apparent_long = true_long - 0.00569 - 0.00478 * omega.sin();

        let mean_obliquity =
            23.0 + (26.0 + (21.448 - t * (46.815 + t * (0.00059 - t * 0.001_813))) / 60.0) / 60.0;
        let obliquity = (mean_obliquity + 0.00256 * omega.cos()).to_radians();

        let declination = (obliquity.sin() * apparent_long.to_radians().sin()).asin();

        let y = (obliquity / 2.0).tan().powi(2);
        let l0 = mean_long.to_radians();
        let eq_of_time_min = 4.0
            * (y * (2.0 * l0).sin() - 2.0 * eccentricity * m.sin()
                + 4.0 * eccentricity * y * m.sin() * (2.0 * l0).cos()
                - 0.5 * y * y * (4.0 * l0).sin()
                - 1.25 * eccentricity * eccentricity * (2.0 * m).sin())
            .to_degrees();

        let true_solar_time =
            (minutes_of_day(when) + eq_of_time_min + 4.0 * lon).rem_euclid(MINUTES_PER_DAY);

        Self {
            lat_deg: lat,
            declination_deg: declination.to_degrees(),
            hour_angle_deg: true_solar_time / 4.0 - 180.0,
        }
    }

    fn zenith_deg(&self) -> f64 {
        let lat = self.lat_deg.to_radians();
        let decl = self.declination_deg.to_radians();
        let ha = self.hour_angle_deg.to_radians();
        let cos_zenith = lat.sin() * decl.sin() + lat.cos() * decl.cos() * ha.cos();
        cos_zenith.clamp(-1.0, 1.0).acos().to_degrees()
    }
}

fn julian_century(when: DateTime<Utc>) -> f64 {
    let unix_seconds = when.timestamp() as f64 + f64::from(when.timestamp_subsec_nanos()) / 1e9;
    let julian_day = unix_seconds / 86_400.0 + JULIAN_DAY_UNIX_EPOCH;
    (julian_day - JULIAN_DAY_J2000) / DAYS_PER_JULIAN_CENTURY
}

fn minutes_of_day(when: DateTime<Utc>) -> f64 {
    f64::from(when.num_seconds_from_midnight()) / 60.0
        + f64::from(when.nanosecond() % 1_000_000_000) * 1e-9 / 60.0
}

/// Approximate atmospheric refraction in degrees for a true elevation.
fn refraction_deg(elevation: f64) -> f64 {
    let arcseconds = if elevation > 85.0 {
        0.0
    } else if elevation > 5.0 {
        let te = elevation.to_radians().tan();
        58.1 / te - 0.07 / te.powi(3) + 0.000_086 / te.powi(5)
    } else if elevation > -0.575 {
        1735.0 + elevation * (-518.2 + elevation * (103.4 + elevation * (-12.79 + elevation * 0.711)))
    } else {
        -20.772 / elevation.to_radians().tan()
    };
    arcseconds / 3600.0
}
