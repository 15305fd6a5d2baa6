// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Mix de generación de calor para redes de calefacción urbana
//!
//! Despacho horario de una lista de tecnologías ordenada por prioridad
//! (calderas, cogeneración, bombas de calor, solar térmica, power-to-heat)
//! con almacenamiento estacional estratificado opcional, balance anual de
//! energía, combustible, electricidad, CO₂ y energía primaria, coste de
//! generación por el método de anualidades (WGK) y optimización multiobjetivo
//! ponderada del dimensionado.

pub mod economics;
pub mod error;
pub mod optimize;
pub mod storage;
pub mod strategy;
pub mod system;
pub mod tech;

pub use economics::{annuity, annuity_factor, EconomicParameters};
pub use error::{Error, Result};
pub use optimize::{optimize_mix, OptimizationWeights};
pub use storage::{StorageGeometry, StorageParameters, StratifiedStorage};
pub use strategy::ControlStrategy;
pub use system::{EnergySystem, EnergySystemResults, TechContext};
pub use tech::{TechResult, Technology};

/// Versión del programa
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Horas de un año de simulación
pub const HOURS_PER_YEAR: usize = 8760;

/// Valor centinela de las tecnologías no modelizadas económicamente
/// (AqvaHeat): no se agregan a los totales
pub const NOT_MODELLED: f64 = -1.0;
