// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! # Lector de archivos TRY (Testreferenzjahr) del DWD
//!
//! Formato de texto de ancho fijo con 34 líneas de cabecera y 8760 registros
//! horarios. Columnas relevantes de cada registro:
//!
//! - RW, HW: coordenadas del punto de la malla
//! - MM, DD, HH: mes, día, hora
//! - t: temperatura seca del aire a 2 m (°C)
//! - p: presión atmosférica (hPa)
//! - WR, WG: dirección (°) y velocidad (m/s) del viento
//! - N: cobertura nubosa (octavos)
//! - x, RF: humedad absoluta (g/kg) y relativa (%)
//! - B: irradiancia solar directa sobre superficie horizontal (W/m²)
//! - D: irradiancia solar difusa sobre superficie horizontal (W/m²)
//! - A, E: irradiancia atmosférica y emitida (W/m²)
//! - IL: índice de calidad

use std::fs::File;
use std::io::{prelude::*, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Error};
use serde::{Deserialize, Serialize};

/// Número de líneas de cabecera del formato TRY
const TRY_HEADER_ROWS: usize = 34;

/// Series horarias de un año meteorológico de referencia
///
/// Todas las series tienen 8760 valores (una por hora del año)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TryData {
    /// Temperatura seca del aire, °C
    pub temperature: Vec<f64>,
    /// Velocidad del viento, m/s
    pub wind_speed: Vec<f64>,
    /// Irradiancia solar directa sobre horizontal, W/m²
    pub direct_radiation: Vec<f64>,
    /// Irradiancia solar difusa sobre horizontal, W/m²
    pub diffuse_radiation: Vec<f64>,
}

impl TryData {
    /// Irradiancia global horizontal (directa + difusa), W/m²
    pub fn global_radiation(&self) -> Vec<f64> {
        self.direct_radiation
            .iter()
            .zip(&self.diffuse_radiation)
            .map(|(b, d)| b + d)
            .collect()
    }

    /// Temperatura mínima anual del aire, °C
    pub fn min_air_temperature(&self) -> f64 {
        self.temperature.iter().copied().fold(f64::INFINITY, f64::min)
    }
}

/// Interpreta el contenido de un archivo TRY
///
/// Se descartan las 34 líneas de cabecera y la línea separadora `***`
pub fn parse_try<S: AsRef<str>>(trystring: S) -> Result<TryData, Error> {
    let datalines = trystring
        .as_ref()
        .lines()
        .skip(TRY_HEADER_ROWS)
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('*'));

    let mut data = TryData::default();
    for (i, line) in datalines.enumerate() {
        let fields: Vec<_> = line.split_ascii_whitespace().collect();
        // RW HW MM DD HH t p WR WG N x RF B D A E IL
        if fields.len() < 14 {
            bail!(
                "Registro TRY incompleto en la línea de datos {}: \"{}\"",
                i + 1,
                line
            );
        }
        let parse = |idx: usize| -> Result<f64, Error> {
            fields[idx]
                .parse::<f64>()
                .with_context(|| format!("Valor no numérico \"{}\" en la línea {}", fields[idx], i + 1))
        };
        data.temperature.push(parse(5)?);
        data.wind_speed.push(parse(8)?);
        data.direct_radiation.push(parse(12)?);
        data.diffuse_radiation.push(parse(13)?);
    }

    if data.temperature.len() != crate::HOURS_PER_YEAR {
        bail!(
            "Datos horarios con un número de registros distinto a 8760: {}",
            data.temperature.len()
        );
    }

    Ok(data)
}

/// Marcas de tiempo ISO horarias de un año completo (8760, sin bisiesto)
///
/// Se usan para casar las series TRY con los perfiles de demanda de los
/// edificios y para la columna de tiempo de los resultados
pub fn hourly_timestamps(year: i32) -> Vec<String> {
    use chrono::{Duration, NaiveDate};
    let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .expect("fecha de inicio de año válida")
        .and_hms_opt(0, 0, 0)
        .expect("medianoche válida");
    (0..crate::HOURS_PER_YEAR as i64)
        .map(|h| (start + Duration::hours(h)).format("%Y-%m-%dT%H:%M:%S").to_string())
        .collect()
}

/// Lee las series climáticas desde la ruta de un archivo TRY (.dat)
pub fn try_from_path<T: AsRef<Path>>(path: T) -> Result<TryData, Error> {
    let mut rawdata = String::new();
    BufReader::new(File::open(path.as_ref())?)
        .read_to_string(&mut rawdata)
        .with_context(|| {
            format!(
                "No se ha podido leer el archivo {}",
                path.as_ref().display()
            )
        })?;
    parse_try(&rawdata)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_try_string(hours: usize) -> String {
        let mut s = String::new();
        for i in 0..TRY_HEADER_ROWS {
            s.push_str(&format!("Kopfzeile {}\n", i + 1));
        }
        s.push_str("*** \n");
        for h in 0..hours {
            // RW HW MM DD HH t p WR WG N x RF B D A E IL
            s.push_str(&format!(
                "3951500 2767500  1  1 {:2}  -1.3 1001 270  3.4 6  3.1 81  120.0  80.0  310  365  1\n",
                (h % 24) + 1
            ));
        }
        s
    }

    #[test]
    fn parse_try_fields() {
        let data = parse_try(build_try_string(8760)).unwrap();
        assert_eq!(data.temperature.len(), 8760);
        assert!((data.temperature[0] - -1.3).abs() < 1e-9);
        assert!((data.wind_speed[0] - 3.4).abs() < 1e-9);
        assert!((data.direct_radiation[10] - 120.0).abs() < 1e-9);
        assert!((data.diffuse_radiation[10] - 80.0).abs() < 1e-9);
        assert!((data.global_radiation()[10] - 200.0).abs() < 1e-9);
        assert!((data.min_air_temperature() - -1.3).abs() < 1e-9);
    }

    #[test]
    fn parse_try_wrong_length() {
        assert!(parse_try(build_try_string(100)).is_err());
    }
}
