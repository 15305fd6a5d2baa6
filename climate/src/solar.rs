// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! # Solar radiation on tilted collector surfaces
//!
//! Solar position and irradiance decomposition for solar thermal collectors,
//! following Duffie & Beckman and the ScenoCalc District Heating methodology:
//!
//! - solar declination and equation of time from the day of the year
//! - hour angle from local solar time
//! - beam tilt factor Rb = cos(θi) / cos(θz)
//! - anisotropic diffuse model with circumsolar fraction Ai
//! - ground reflection with constant albedo
//! - incidence angle modifier (IAM) interpolated from a per-collector table
#![allow(non_snake_case)]

use serde::{Deserialize, Serialize};

/// Solar constant, W/m²
pub const G_SC: f64 = 1367.0;

/// Site location and time zone reference
#[derive(Debug, Default, Copy, Clone, Serialize, Deserialize)]
pub struct Location {
    /// Latitude of the site (φ), degrees [-90, +90]
    pub latitude: f64,
    /// Longitude of the site (λ), degrees [-180, +180], east+, west-
    pub longitude: f64,
    /// Longitude of the time zone meridian, degrees (15.0 for CET)
    pub std_longitude: f64,
}

/// Sun position
#[derive(Debug, Default, PartialEq, Clone, Copy)]
pub struct SunPosition {
    /// Solar azimuth (φ_sol), degrees, angle from south, east-, west+
    pub azimuth: f64,
    /// Solar zenith (θ_z), degrees [0, +90], 90 at the horizon
    pub zenith: f64,
}

/// Irradiance on a tilted surface for one hour, W/m²
#[derive(Debug, Default, Clone, Copy)]
pub struct SurfaceRadiation {
    /// Beam irradiance on the tilted surface, W/m²
    pub beam: f64,
    /// Diffuse irradiance (sky + ground reflected), W/m²
    pub diffuse: f64,
    /// Total irradiance, W/m²
    pub total: f64,
    /// Angle of incidence of the beam on the surface, degrees
    pub incidence_angle: f64,
    /// Incidence angle modifier for the beam component [0, 1]
    pub k_beam: f64,
}

/// Incidence angle modifier table: (incidence angle °, modifier) pairs
/// sorted by ascending angle
pub type IamTable = Vec<(f64, f64)>;

#[inline]
fn sind(angle: f64) -> f64 {
    angle.to_radians().sin()
}
#[inline]
fn cosd(angle: f64) -> f64 {
    angle.to_radians().cos()
}
#[inline]
fn acosd(rcos: f64) -> f64 {
    rcos.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Day of the year [1, 365] for an hour index of the annual series [0, 8759]
pub fn nday_from_hour(hour_of_year: usize) -> u32 {
    (hour_of_year / 24) as u32 + 1
}

/// Solar declination (δ), degrees [-23.45, +23.45]
///
/// nday: day of the year (1 <= n <= 365)
pub fn declination_from_nday(nday: u32) -> f64 {
    23.45 * sind(360.0 * (284.0 + nday as f64) / 365.0)
}

/// Equation of time, minutes
///
/// B: day angle, degrees
pub fn equation_of_time(nday: u32) -> f64 {
    let B = (nday as f64 - 1.0) * 360.0 / 365.0;
    229.2
        * (0.000075 + 0.001868 * cosd(B)
            - 0.032077 * sind(B)
            - 0.014615 * cosd(2.0 * B)
            - 0.04089 * sind(2.0 * B))
}

/// Solar hour angle (ω), degrees [-180, +180], solar noon at 0
///
/// clock_hour: local clock time, h [0.0, 24.0]
pub fn hour_angle(clock_hour: f64, nday: u32, location: Location) -> f64 {
    let solar_time = clock_hour
        + equation_of_time(nday) / 60.0
        + 4.0 * (location.longitude - location.std_longitude) / 60.0;
    -180.0 + solar_time * 180.0 / 12.0
}

/// Sun position for a declination, hour angle and latitude
pub fn sun_position(declination: f64, hourangle: f64, latitude: f64) -> SunPosition {
    let cos_zenith =
        cosd(latitude) * cosd(hourangle) * cosd(declination) + sind(latitude) * sind(declination);
    let zenith = acosd(cos_zenith);
    // angle from south, east-, west+, eqs. (13)-(16)
    let denom = sind(zenith) * cosd(latitude);
    let azimuth = if denom.abs() < 1e-9 {
        0.0
    } else {
        let az = acosd((cos_zenith * sind(latitude) - sind(declination)) / denom);
        if hourangle < 0.0 {
            -az
        } else {
            az
        }
    };
    SunPosition { azimuth, zenith }
}

/// Angle of incidence of the solar beam on a tilted and oriented surface, degrees
///
/// tilt (β): surface tilt, degrees [0, 90]
/// surface_azimuth (γ): deviation from south, degrees, east-, west+
pub fn incidence_angle(sunpos: SunPosition, tilt: f64, surface_azimuth: f64) -> f64 {
    let cos_incidence = cosd(sunpos.zenith) * cosd(tilt)
        + sind(sunpos.zenith) * sind(tilt) * cosd(sunpos.azimuth - surface_azimuth);
    acosd(cos_incidence)
}

/// Linear interpolation of the incidence angle modifier from a collector table
///
/// Angles outside the table are clamped to the end values
pub fn iam_for_angle(table: &IamTable, angle: f64) -> f64 {
    match table.iter().position(|&(a, _)| a >= angle) {
        Some(0) => table[0].1,
        Some(i) => {
            let (a0, k0) = table[i - 1];
            let (a1, k1) = table[i];
            k0 + (k1 - k0) * (angle - a0) / (a1 - a0)
        }
        None => table.last().map(|&(_, k)| k).unwrap_or(1.0),
    }
}

/// Beam, diffuse and total irradiance on a tilted surface for one hour, W/m²
///
/// hour_of_year: hour index of the annual series [0, 8759]
/// dir_hor / dif_hor: beam and diffuse irradiance on the horizontal, W/m²
/// albedo: ground reflectance [0, 1]
/// iam: optional incidence angle modifier table of the collector
pub fn radiation_for_surface(
    hour_of_year: usize,
    dir_hor: f64,
    dif_hor: f64,
    location: Location,
    tilt: f64,
    surface_azimuth: f64,
    albedo: f64,
    iam: Option<&IamTable>,
) -> SurfaceRadiation {
    let nday = nday_from_hour(hour_of_year);
    // record at the middle of the hour interval
    let clock_hour = (hour_of_year % 24) as f64 + 0.5;
    let declination = declination_from_nday(nday);
    let omega = hour_angle(clock_hour, nday, location);
    let sunpos = sun_position(declination, omega, location.latitude);

    let glob_hor = dir_hor + dif_hor;
    if sunpos.zenith >= 90.0 || glob_hor <= 0.0 {
        return SurfaceRadiation {
            k_beam: 1.0,
            incidence_angle: 90.0,
            ..Default::default()
        };
    }

    let theta = incidence_angle(sunpos, tilt, surface_azimuth);
    let cos_zenith = cosd(sunpos.zenith).max(0.05);
    // beam tilt factor, negative values mean the sun is behind the surface
    let rb = (cosd(theta) / cos_zenith).max(0.0);

    // extraterrestrial irradiance on the horizontal for the anisotropy index
    let g0 = G_SC * (1.0 + 0.033 * cosd(360.0 * nday as f64 / 365.0)) * cos_zenith;
    let ai = if g0 > 0.0 { (dir_hor / g0).clamp(0.0, 1.0) } else { 0.0 };

    let beam = dir_hor * rb;
    let dif_sky = dif_hor * ai * rb + dif_hor * (1.0 - ai) * (1.0 + cosd(tilt)) / 2.0;
    let dif_ground = glob_hor * albedo * (1.0 - cosd(tilt)) / 2.0;
    let k_beam = iam.map(|t| iam_for_angle(t, theta)).unwrap_or(1.0);

    SurfaceRadiation {
        beam,
        diffuse: dif_sky + dif_ground,
        total: beam + dif_sky + dif_ground,
        incidence_angle: theta,
        k_beam,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! assert_almost_eq {
        ($a:expr, $b:expr) => {
            assert_almost_eq!($a, $b, 0.001)
        };
        ($a:expr, $b:expr, $c:expr) => {
            if ($a - $b).abs() > $c {
                panic!(
                    "assertion failed: `abs(left - right) < {}`, (left: `{}`, right: `{}`)",
                    $c, $a, $b
                );
            }
        };
    }

    const LOC: Location = Location {
        latitude: 51.0,
        longitude: 13.7,
        std_longitude: 15.0,
    };

    #[test]
    fn declination_range() {
        // solstices, comparado con https://gml.noaa.gov/grad/solcalc/
        assert_almost_eq!(declination_from_nday(172), 23.45, 0.1);
        assert_almost_eq!(declination_from_nday(355), -23.4, 0.2);
        assert_almost_eq!(declination_from_nday(81), 0.0, 0.5);
    }

    #[test]
    fn noon_sun_position() {
        // mediodía solar del 21 de junio en Dresde
        let decl = declination_from_nday(172);
        let pos = sun_position(decl, 0.0, LOC.latitude);
        assert_almost_eq!(pos.zenith, LOC.latitude - decl, 0.01);
        assert_almost_eq!(pos.azimuth, 0.0, 0.01);
    }

    #[test]
    fn night_gives_zero_radiation() {
        // 1 de enero, medianoche
        let rad = radiation_for_surface(0, 0.0, 0.0, LOC, 30.0, 0.0, 0.2, None);
        assert_almost_eq!(rad.total, 0.0);
    }

    #[test]
    fn tilted_south_beats_horizontal_in_winter() {
        // mediodía del 1 de enero: un captador a 45° orientado al sur recibe
        // más radiación directa que la horizontal
        let hour = 12;
        let rad_tilt = radiation_for_surface(hour, 100.0, 50.0, LOC, 45.0, 0.0, 0.2, None);
        let rad_horiz = radiation_for_surface(hour, 100.0, 50.0, LOC, 0.0, 0.0, 0.2, None);
        assert!(rad_tilt.beam > rad_horiz.beam);
    }

    #[test]
    fn iam_interpolation() {
        let table: IamTable = vec![(0.0, 1.0), (50.0, 0.95), (70.0, 0.8), (90.0, 0.0)];
        assert_almost_eq!(iam_for_angle(&table, 0.0), 1.0);
        assert_almost_eq!(iam_for_angle(&table, 25.0), 0.975);
        assert_almost_eq!(iam_for_angle(&table, 60.0), 0.875);
        assert_almost_eq!(iam_for_angle(&table, 95.0), 0.0);
    }
}
