// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Errores del núcleo de simulación
//!
//! Los fallos recuperables se devuelven siempre como `Result`; los errores de
//! un paso concreto de la simulación anual se capturan en el driver y no
//! interrumpen la serie (ver [`crate::timeseries`]).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Clases de error del núcleo de cálculo
#[derive(Debug, Error)]
pub enum Error {
    /// Datos de entrada mal formados (GeoJSON inválido, diámetro negativo,
    /// perfiles de longitud incorrecta, etc.). Se detecta antes de calcular
    #[error("datos de entrada no válidos: {0}")]
    InvalidInput(String),

    /// Topología de red inconsistente (nudos aislados referenciados,
    /// consumidores colgantes, falta de bomba principal)
    #[error("topología de red no válida: {0}")]
    Topology(String),

    /// El solver interno agotó su presupuesto de iteraciones
    #[error("el solver no ha convergido tras {iterations} iteraciones (residuo {residual:.3e})")]
    SolverNonConvergence { iterations: usize, residual: f64 },

    /// El lazo de control externo agotó `max_outer_iter`
    #[error("el lazo de control no ha convergido tras {iterations} iteraciones")]
    ControllerNonConvergence { iterations: usize },

    /// Tipo de tubería o material desconocido en el catálogo
    #[error("tipo o material no presente en el catálogo: {0}")]
    CatalogueLookup(String),

    #[error("error de E/S: {0}")]
    Io(#[from] std::io::Error),

    #[error("error de JSON: {0}")]
    Json(#[from] serde_json::Error),
}
