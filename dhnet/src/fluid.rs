// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Propiedades del agua como fluido caloportador
//!
//! El resto del sistema trata cp y ρ como constantes a efectos de balance
//! energético; las correlaciones con la temperatura se usan solo en el
//! cálculo hidráulico (densidad y viscosidad para Reynolds y pérdidas de carga).

/// Calor específico del agua, J/(kg·K)
pub const CP_WATER: f64 = 4180.0;

/// Calor específico del agua, kJ/(kg·K), usado en los balances en kW
pub const CP_WATER_KJ: f64 = 4.18;

/// Agua líquida en el rango de temperaturas de una red de calor (0-120 °C)
#[derive(Debug, Clone, Copy, Default)]
pub struct Water;

impl Water {
    /// Calor específico, J/(kg·K)
    pub fn cp(&self) -> f64 {
        CP_WATER
    }

    /// Densidad a la temperatura t_k (K), kg/m³
    ///
    /// Correlación cuadrática ajustada al rango 0-120 °C
    pub fn rho(&self, t_k: f64) -> f64 {
        let t = t_k - 273.15;
        1000.6 - 0.0106 * t - 0.0035 * t * t
    }

    /// Viscosidad dinámica a la temperatura t_k (K), Pa·s
    ///
    /// Correlación de Vogel para agua líquida
    pub fn viscosity(&self, t_k: f64) -> f64 {
        2.414e-5 * 10f64.powf(247.8 / (t_k - 140.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn water_properties() {
        let w = Water;
        // a 20 °C
        assert!((w.rho(293.15) - 998.0).abs() < 3.0);
        assert!((w.viscosity(293.15) - 1.0e-3).abs() < 5e-5);
        // a 80 °C
        assert!((w.rho(353.15) - 972.0).abs() < 4.0);
        assert!((w.viscosity(353.15) - 3.55e-4).abs() < 3e-5);
    }
}
