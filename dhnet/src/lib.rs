// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Modelo termohidráulico de redes de calefacción urbana
//!
//! La biblioteca cubre el núcleo de cálculo de una red de calor:
//!
//! - modelo de red (nudos, tuberías de impulsión y retorno, subestaciones de
//!   consumo y bombas de circulación), con catálogo de tuberías normalizadas
//! - solver estacionario de presiones, caudales y temperaturas sobre el grafo
//! - lazo de control externo: regulación de presión diferencial en el punto
//!   crítico (Schlechtpunkt) y de temperatura mínima de impulsión por consumidor
//! - dimensionado de diámetros con tipos normalizados bajo un límite de velocidad
//! - simulación anual (8760 h) con perfiles horarios de demanda y temperaturas
//! - lectura y escritura de redes en GeoJSON unificado (v2), demandas de
//!   edificios en JSON y resultados en CSV

pub mod catalogue;
pub mod common;
pub mod control;
pub mod cop;
pub mod demand;
pub mod error;
pub mod fluid;
pub mod geojson;
pub mod hydraulics;
pub mod model;
pub mod report;
pub mod sizing;
pub mod timeseries;

pub use catalogue::{PipeCatalogue, PipeType};
pub use common::{Warning, WarningLevel, CELSIUS_OFFSET};
pub use control::{Controller, StepStats, MAX_OUTER_ITER};
pub use cop::CopTable;
pub use error::{Error, Result};
pub use fluid::Water;
pub use model::{CirculationPump, HeatConsumer, Junction, Network, Pipe, PumpControl};
pub use timeseries::{
    ProducerKind, PumpSeries, SupplyTemperature, TimeSeriesProfiles, TimeSeriesResults,
};

/// Versión del programa
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
