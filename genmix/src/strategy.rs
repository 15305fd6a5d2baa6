// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Estrategias de operación de las tecnologías frente al almacenamiento
//!
//! Cada tecnología decide su estado de marcha a partir de las temperaturas
//! superior e inferior del almacenamiento y de la carga restante. Sin
//! almacenamiento, la decisión depende solo de la carga.

use serde::{Deserialize, Serialize};

/// Estrategia de control de una tecnología
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlStrategy {
    /// Histéresis de cogeneración: arranca cuando la temperatura superior del
    /// almacenamiento baja de `charge_on` y para cuando la inferior supera
    /// `charge_off`
    Hysteresis {
        /// Temperatura superior de arranque, °C
        charge_on: f64,
        /// Temperatura inferior de parada, °C
        charge_off: f64,
    },
    /// Umbral simple: arranca si la temperatura superior está por debajo de
    /// `charge_on` y queda demanda por cubrir (power-to-heat, calderas)
    Threshold {
        /// Temperatura superior de arranque, °C
        charge_on: f64,
    },
    /// Siempre en marcha mientras quede demanda (solar térmica, fuentes
    /// residuales)
    AlwaysOn,
}

impl ControlStrategy {
    /// Decide el estado de marcha para la hora actual
    ///
    /// `upper` y `lower` son las temperaturas superior e inferior del
    /// almacenamiento (None sin almacenamiento)
    pub fn decide(
        &self,
        current_state: bool,
        upper: Option<f64>,
        lower: Option<f64>,
        remaining_kw: f64,
    ) -> bool {
        match self {
            ControlStrategy::Hysteresis {
                charge_on,
                charge_off,
            } => match (upper, lower) {
                (Some(upper), Some(lower)) => {
                    if current_state {
                        // en marcha: sigue hasta que la capa inferior se caliente
                        lower < *charge_off
                    } else {
                        // parada: arranca cuando la capa superior se enfría
                        upper <= *charge_on
                    }
                }
                _ => remaining_kw > 0.0,
            },
            ControlStrategy::Threshold { charge_on } => match upper {
                Some(upper) => upper < *charge_on && remaining_kw > 0.0,
                None => remaining_kw > 0.0,
            },
            ControlStrategy::AlwaysOn => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hysteresis_keeps_state() {
        let strategy = ControlStrategy::Hysteresis {
            charge_on: 70.0,
            charge_off: 70.0,
        };
        // parada y almacenamiento caliente: sigue parada
        assert!(!strategy.decide(false, Some(80.0), Some(60.0), 100.0));
        // parada y capa superior fría: arranca
        assert!(strategy.decide(false, Some(65.0), Some(60.0), 100.0));
        // en marcha y capa inferior fría: sigue
        assert!(strategy.decide(true, Some(80.0), Some(60.0), 100.0));
        // en marcha y capa inferior caliente: para
        assert!(!strategy.decide(true, Some(80.0), Some(75.0), 100.0));
    }

    #[test]
    fn threshold_needs_demand() {
        let strategy = ControlStrategy::Threshold { charge_on: 70.0 };
        assert!(strategy.decide(false, Some(60.0), None, 100.0));
        assert!(!strategy.decide(false, Some(60.0), None, 0.0));
        assert!(!strategy.decide(false, Some(75.0), None, 100.0));
        // sin almacenamiento decide solo la demanda
        assert!(strategy.decide(false, None, None, 100.0));
    }
}
