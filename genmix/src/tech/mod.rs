// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Tecnologías de generación de calor
//!
//! Tipo suma [`Technology`] con una variante por tecnología y un nivel único
//! de generalización: cada variante implementa el contrato
//! {`init_operation`, `generate`, `calculate`, `add_optimization_parameters`,
//! `set_parameters`}. El despacho horario y la agregación viven en
//! [`crate::system`].

mod boiler;
mod chp;
mod heatpump;
mod powertoheat;
mod solarthermal;

pub use boiler::{BiomassBoiler, GasBoiler};
pub use chp::{Chp, ChpFuel};
pub use heatpump::{HeatPump, HeatPumpKind};
pub use powertoheat::PowerToHeat;
pub use solarthermal::{CollectorType, SolarThermal};

use crate::economics::EconomicParameters;
use crate::strategy::ControlStrategy;
use crate::system::TechContext;

/// Resultado anual de una tecnología
#[derive(Debug, Clone, Default)]
pub struct TechResult {
    pub tech_name: String,
    /// Calor generado, MWh
    pub heat_mwh: f64,
    /// Potencia térmica horaria, kW
    pub heat_kw: Vec<f64>,
    /// Electricidad generada (cogeneración), MWh
    pub electricity_produced_mwh: f64,
    /// Electricidad consumida (bombas de calor, power-to-heat), MWh
    pub electricity_consumed_mwh: f64,
    /// Potencia eléctrica horaria (generada o consumida según la tecnología), kW
    pub electricity_kw: Vec<f64>,
    /// Combustible consumido, MWh
    pub fuel_mwh: f64,
    /// Coste de generación, €/MWh ([`crate::NOT_MODELLED`] si no se modeliza)
    pub wgk_eur_per_mwh: f64,
    /// Emisiones específicas, tCO₂/MWh
    pub spec_co2_t_per_mwh: f64,
    /// Factor de energía primaria
    pub primary_energy_factor: f64,
    /// Color para las gráficas
    pub color: &'static str,
}

/// Tecnología de generación, etiquetada por variante
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Technology {
    GasBoiler(GasBoiler),
    BiomassBoiler(BiomassBoiler),
    Chp(Chp),
    HeatPump(HeatPump),
    PowerToHeat(PowerToHeat),
    SolarThermal(SolarThermal),
}

impl Technology {
    pub fn name(&self) -> &str {
        match self {
            Technology::GasBoiler(t) => &t.name,
            Technology::BiomassBoiler(t) => &t.name,
            Technology::Chp(t) => &t.name,
            Technology::HeatPump(t) => &t.name,
            Technology::PowerToHeat(t) => &t.name,
            Technology::SolarThermal(t) => &t.name,
        }
    }

    /// Prioridad de despacho (menor = antes)
    pub fn priority(&self) -> u32 {
        match self {
            Technology::GasBoiler(t) => t.priority,
            Technology::BiomassBoiler(t) => t.priority,
            Technology::Chp(t) => t.priority,
            Technology::HeatPump(t) => t.priority,
            Technology::PowerToHeat(t) => t.priority,
            Technology::SolarThermal(t) => t.priority,
        }
    }

    pub fn strategy(&self) -> &ControlStrategy {
        match self {
            Technology::GasBoiler(t) => &t.strategy,
            Technology::BiomassBoiler(t) => &t.strategy,
            Technology::Chp(t) => &t.strategy,
            Technology::HeatPump(t) => &t.strategy,
            Technology::PowerToHeat(t) => &t.strategy,
            Technology::SolarThermal(t) => &t.strategy,
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            Technology::GasBoiler(t) => t.active,
            Technology::BiomassBoiler(t) => t.active,
            Technology::Chp(t) => t.active,
            Technology::HeatPump(t) => t.active,
            Technology::PowerToHeat(t) => t.active,
            Technology::SolarThermal(t) => t.active,
        }
    }

    pub fn set_active(&mut self, active: bool) {
        match self {
            Technology::GasBoiler(t) => t.active = active,
            Technology::BiomassBoiler(t) => t.active = active,
            Technology::Chp(t) => t.active = active,
            Technology::HeatPump(t) => t.active = active,
            Technology::PowerToHeat(t) => t.active = active,
            Technology::SolarThermal(t) => t.active = active,
        }
    }

    /// Reserva las series horarias de resultados
    pub fn init_operation(&mut self, hours: usize) {
        match self {
            Technology::GasBoiler(t) => t.init_operation(hours),
            Technology::BiomassBoiler(t) => t.init_operation(hours),
            Technology::Chp(t) => t.init_operation(hours),
            Technology::HeatPump(t) => t.init_operation(hours),
            Technology::PowerToHeat(t) => t.init_operation(hours),
            Technology::SolarThermal(t) => t.init_operation(hours),
        }
    }

    /// Generación en la hora `t` frente a la carga restante
    ///
    /// Devuelve `(Q_util, Q_producido)` en kW: `Q_util` computa contra la
    /// demanda; `Q_producido` puede diferir (la bomba de calor de calor
    /// residual descuenta su electricidad, la cogeneración produce además
    /// electricidad que se contabiliza aparte)
    pub fn generate(&mut self, t: usize, remaining_kw: f64, ctx: &TechContext) -> (f64, f64) {
        match self {
            Technology::GasBoiler(tech) => tech.generate(t, remaining_kw),
            Technology::BiomassBoiler(tech) => tech.generate(t, remaining_kw),
            Technology::Chp(tech) => tech.generate(t, remaining_kw),
            Technology::HeatPump(tech) => tech.generate(t, remaining_kw, ctx),
            Technology::PowerToHeat(tech) => tech.generate(t, remaining_kw),
            Technology::SolarThermal(tech) => tech.generate(t, remaining_kw, ctx),
        }
    }

    /// Cálculo anual completo sobre la carga residual (sin almacenamiento):
    /// barrido de las series y resultado económico
    pub fn calculate(
        &mut self,
        econ: &EconomicParameters,
        load_profile: &[f64],
        ctx: &TechContext,
    ) -> TechResult {
        match self {
            Technology::GasBoiler(t) => t.calculate(econ, load_profile, ctx),
            Technology::BiomassBoiler(t) => t.calculate(econ, load_profile, ctx),
            Technology::Chp(t) => t.calculate(econ, load_profile, ctx),
            Technology::HeatPump(t) => t.calculate(econ, load_profile, ctx),
            Technology::PowerToHeat(t) => t.calculate(econ, load_profile, ctx),
            Technology::SolarThermal(t) => t.calculate(econ, load_profile, ctx),
        }
    }

    /// Resultado económico a partir de las series ya registradas por el
    /// despacho horario (con almacenamiento)
    pub fn calculate_recorded(&mut self, econ: &EconomicParameters, ctx: &TechContext) -> TechResult {
        match self {
            Technology::GasBoiler(t) => t.economics(econ, ctx),
            Technology::BiomassBoiler(t) => t.economics(econ, ctx),
            Technology::Chp(t) => t.economics(econ, ctx),
            Technology::HeatPump(t) => t.economics(econ, ctx),
            Technology::PowerToHeat(t) => t.economics(econ, ctx),
            Technology::SolarThermal(t) => t.economics(econ, ctx),
        }
    }

    /// Variables de dimensionado que expone la tecnología al optimizador
    ///
    /// Devuelve (valores iniciales, nombres, cotas); puede estar vacío
    pub fn add_optimization_parameters(&self, idx: &str) -> (Vec<f64>, Vec<String>, Vec<(f64, f64)>) {
        match self {
            Technology::GasBoiler(t) => t.add_optimization_parameters(idx),
            Technology::BiomassBoiler(t) => t.add_optimization_parameters(idx),
            Technology::Chp(t) => t.add_optimization_parameters(idx),
            Technology::HeatPump(t) => t.add_optimization_parameters(idx),
            Technology::PowerToHeat(t) => t.add_optimization_parameters(idx),
            Technology::SolarThermal(t) => t.add_optimization_parameters(idx),
        }
    }

    /// Escribe de vuelta los valores del optimizador
    pub fn set_parameters(&mut self, values: &[f64], order: &[String], idx: &str) {
        match self {
            Technology::GasBoiler(t) => t.set_parameters(values, order, idx),
            Technology::BiomassBoiler(t) => t.set_parameters(values, order, idx),
            Technology::Chp(t) => t.set_parameters(values, order, idx),
            Technology::HeatPump(t) => t.set_parameters(values, order, idx),
            Technology::PowerToHeat(t) => t.set_parameters(values, order, idx),
            Technology::SolarThermal(t) => t.set_parameters(values, order, idx),
        }
    }

    /// Sufijo numérico del nombre ("BHKW_1" → "1"), usado para asociar las
    /// variables del optimizador
    pub fn name_index(&self) -> &str {
        self.name().rsplit('_').next().unwrap_or("")
    }
}

/// Busca el valor de una variable del optimizador por nombre
pub(crate) fn lookup_parameter(
    values: &[f64],
    order: &[String],
    variable: &str,
) -> Option<f64> {
    order
        .iter()
        .position(|name| name == variable)
        .and_then(|i| values.get(i))
        .copied()
}

/// Conversión kW horarios → MWh anuales
pub(crate) fn annual_mwh(series_kw: &[f64], duration_h: f64) -> f64 {
    series_kw.iter().sum::<f64>() / 1000.0 * duration_h
}
