// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Errores del despacho de generación
//!
//! La infactibilidad del optimizador no es un error: se devuelve el sistema
//! inicial con el diagnóstico en el resultado ([`crate::optimize`]).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Configuración de tecnologías o parámetros mal formada
    #[error("datos de entrada no válidos: {0}")]
    InvalidInput(String),

    #[error("error de JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("error de E/S: {0}")]
    Io(#[from] std::io::Error),
}
