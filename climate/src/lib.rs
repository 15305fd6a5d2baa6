// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Datos climáticos horarios para la simulación de redes de calor
//!
//! Lectura de archivos de año meteorológico de referencia (TRY, formato DWD)
//! y cálculo de radiación solar sobre superficies inclinadas y orientadas
//! (captadores solares térmicos), con corrección por ángulo de incidencia (IAM).

pub mod dwd;
pub mod solar;

pub use dwd::{hourly_timestamps, parse_try, try_from_path, TryData};
pub use solar::{
    declination_from_nday, equation_of_time, hour_angle, incidence_angle, nday_from_hour,
    radiation_for_surface, sun_position, IamTable, Location, SunPosition, SurfaceRadiation,
};

pub const MONTH_N: [u32; 12] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
pub const MONTH_DAYS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Número de horas de un año meteorológico de referencia
pub const HOURS_PER_YEAR: usize = 8760;
