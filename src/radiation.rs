//! Clear-sky direct beam irradiance (Masters, Renewable and Efficient
//! Electric Power Systems).

use std::f64::consts::PI;

use chrono::{DateTime, Datelike, Utc};

/// Direct irradiance in W/m² reaching the ground under a cloudless sky.
/// Zero while the sun is at or below the horizon.
pub fn direct_irradiance(when: DateTime<Utc>, altitude_deg: f64) -> f64 {
    if altitude_deg <= 0.0 {
        return 0.0;
    }

    let day = f64::from(when.ordinal());
    let flux = extraterrestrial_flux(day);
    let depth = optical_depth(day);
    flux * (-depth * air_mass_ratio(altitude_deg)).exp()
}

/// Apparent extraterrestrial flux (W/m²) for a day of the year.
fn extraterrestrial_flux(day: f64) -> f64 {
    1160.0 + 75.0 * (2.0 * PI / 365.0 * (day - 275.0)).sin()
}

fn optical_depth(day: f64) -> f64 {
    0.174 + 0.035 * (2.0 * PI / 365.0 * (day - 100.0)).sin()
}

fn air_mass_ratio(altitude_deg: f64) -> f64 {
    1.0 / altitude_deg.to_radians().sin()
}
