// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Tipos y utilidades comunes al modelo de red

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Diferencia entre Kelvin y grados Celsius
pub const CELSIUS_OFFSET: f64 = 273.15;

/// Convierte grados Celsius a Kelvin
#[inline]
pub fn c_to_k(t_c: f64) -> f64 {
    t_c + CELSIUS_OFFSET
}

/// Convierte Kelvin a grados Celsius
#[inline]
pub fn k_to_c(t_k: f64) -> f64 {
    t_k - CELSIUS_OFFSET
}

/// Redondea valor a 2 decimales
#[inline]
pub fn fround2(val: f64) -> f64 {
    (val * 100.0).round() / 100.0
}

/// Redondea valor a 3 decimales
#[inline]
pub fn fround3(val: f64) -> f64 {
    (val * 1000.0).round() / 1000.0
}

/// Nivel de severidad de un aviso
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningLevel {
    SUCCESS,
    DANGER,
    WARNING,
    INFO,
}

impl Display for WarningLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use WarningLevel::*;
        let printable = match *self {
            SUCCESS => "SUCCESS",
            DANGER => "DANGER",
            WARNING => "WARNING",
            INFO => "INFO",
        };
        write!(f, "{}", printable)
    }
}

/// Aviso de comprobación de la red
///
/// Señala elementos mal definidos o situaciones sospechosas detectadas
/// al validar el modelo, sin impedir el cálculo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    /// Nivel de afectación
    pub level: WarningLevel,
    /// Id del elemento afectado, si procede
    pub id: Option<usize>,
    /// Mensaje del aviso
    pub msg: String,
}
