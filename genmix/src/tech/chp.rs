// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Cogeneración (BHKW) de gas o de gas de madera, operada en modo térmico

use serde::{Deserialize, Serialize};

use super::{annual_mwh, lookup_parameter, TechResult};
use crate::economics::{annuity, EconomicParameters};
use crate::strategy::ControlStrategy;
use crate::system::TechContext;

/// Combustible de la cogeneración
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChpFuel {
    Gas,
    /// Gasificación de madera
    Wood,
}

impl ChpFuel {
    fn co2_factor(&self) -> f64 {
        match self {
            ChpFuel::Gas => 0.201,
            ChpFuel::Wood => 0.036,
        }
    }

    fn pe_factor(&self) -> f64 {
        match self {
            ChpFuel::Gas => 1.1,
            ChpFuel::Wood => 0.2,
        }
    }

    fn price(&self, econ: &EconomicParameters) -> f64 {
        match self {
            ChpFuel::Gas => econ.gas_price,
            ChpFuel::Wood => econ.wood_price,
        }
    }
}

/// Unidad de cogeneración operada en modo térmico (heat-led)
///
/// La potencia eléctrica sigue a la térmica con la relación de rendimientos
/// `η_el / η_th`; la electricidad producida se valora como ingreso en la
/// anualidad
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Chp {
    pub name: String,
    pub priority: u32,
    pub strategy: ControlStrategy,
    pub fuel: ChpFuel,
    /// Potencia térmica nominal, kW
    pub th_power_kw: f64,
    /// Rendimiento eléctrico y térmico sobre el combustible
    pub el_efficiency: f64,
    pub th_efficiency: f64,
    /// Carga parcial mínima (fracción de la nominal)
    pub min_partload: f64,
    /// Inversión específica, €/kW eléctrico
    pub spec_invest_eur_per_kw_el: f64,
    pub lifetime_years: f64,
    pub f_inst: f64,
    pub f_w_insp: f64,
    pub operating_effort_h: f64,

    #[serde(skip)]
    pub active: bool,
    #[serde(skip)]
    pub heat_kw: Vec<f64>,
    #[serde(skip)]
    pub electricity_kw: Vec<f64>,
    #[serde(skip)]
    pub fuel_kw: Vec<f64>,
}

impl Chp {
    pub fn new(name: &str, priority: u32, th_power_kw: f64, fuel: ChpFuel) -> Self {
        Chp {
            name: name.to_string(),
            priority,
            strategy: ControlStrategy::Hysteresis {
                charge_on: 70.0,
                charge_off: 70.0,
            },
            fuel,
            th_power_kw,
            el_efficiency: 0.33,
            th_efficiency: 0.57,
            min_partload: 0.7,
            spec_invest_eur_per_kw_el: 1500.0,
            lifetime_years: 15.0,
            f_inst: 6.0,
            f_w_insp: 2.0,
            operating_effort_h: 100.0,
            active: false,
            heat_kw: Vec::new(),
            electricity_kw: Vec::new(),
            fuel_kw: Vec::new(),
        }
    }

    /// Potencia eléctrica nominal derivada de la térmica, kW
    pub fn el_power_kw(&self) -> f64 {
        self.th_power_kw * self.el_efficiency / self.th_efficiency
    }

    pub fn init_operation(&mut self, hours: usize) {
        self.heat_kw = vec![0.0; hours];
        self.electricity_kw = vec![0.0; hours];
        self.fuel_kw = vec![0.0; hours];
        self.active = false;
    }

    /// En modo térmico con almacenamiento la unidad trabaja a plena carga
    /// mientras la estrategia la mantiene en marcha
    pub fn generate(&mut self, t: usize, _remaining_kw: f64) -> (f64, f64) {
        let q = self.th_power_kw;
        self.record(t, q);
        (q, q)
    }

    fn record(&mut self, t: usize, q: f64) {
        self.heat_kw[t] = q;
        self.electricity_kw[t] = q * self.el_efficiency / self.th_efficiency;
        self.fuel_kw[t] = q / self.th_efficiency;
    }

    pub fn calculate(
        &mut self,
        econ: &EconomicParameters,
        load_profile: &[f64],
        ctx: &TechContext,
    ) -> TechResult {
        self.init_operation(load_profile.len());
        for (t, &load) in load_profile.iter().enumerate() {
            // sin almacenamiento la unidad sigue a la carga, con su mínimo técnico
            let q = if load >= self.th_power_kw * self.min_partload {
                load.min(self.th_power_kw)
            } else {
                0.0
            };
            self.record(t, q);
        }
        self.economics(econ, ctx)
    }

    pub fn economics(&mut self, econ: &EconomicParameters, ctx: &TechContext) -> TechResult {
        let heat_mwh = annual_mwh(&self.heat_kw, ctx.duration_h);
        let electricity_mwh = annual_mwh(&self.electricity_kw, ctx.duration_h);
        let fuel_mwh = annual_mwh(&self.fuel_kw, ctx.duration_h);
        let wgk = if heat_mwh > 0.0 {
            let invest = self.spec_invest_eur_per_kw_el * self.el_power_kw();
            let revenue = electricity_mwh * econ.electricity_price;
            annuity(
                invest,
                self.lifetime_years,
                self.f_inst,
                self.f_w_insp,
                self.operating_effort_h,
                econ,
                fuel_mwh,
                self.fuel.price(econ),
                revenue,
            ) / heat_mwh
        } else {
            0.0
        };
        TechResult {
            tech_name: self.name.clone(),
            heat_mwh,
            heat_kw: self.heat_kw.clone(),
            electricity_produced_mwh: electricity_mwh,
            electricity_kw: self.electricity_kw.clone(),
            fuel_mwh,
            wgk_eur_per_mwh: wgk,
            spec_co2_t_per_mwh: if heat_mwh > 0.0 {
                fuel_mwh * self.fuel.co2_factor() / heat_mwh
            } else {
                0.0
            },
            primary_energy_factor: if heat_mwh > 0.0 {
                fuel_mwh * self.fuel.pe_factor() / heat_mwh
            } else {
                0.0
            },
            color: "orange",
            ..Default::default()
        }
    }

    pub fn add_optimization_parameters(&self, idx: &str) -> (Vec<f64>, Vec<String>, Vec<(f64, f64)>) {
        (
            vec![self.th_power_kw],
            vec![format!("th_Leistung_{}", idx)],
            vec![(0.0, (self.th_power_kw * 5.0).max(1000.0))],
        )
    }

    pub fn set_parameters(&mut self, values: &[f64], order: &[String], idx: &str) {
        if let Some(v) = lookup_parameter(values, order, &format!("th_Leistung_{}", idx)) {
            self.th_power_kw = v.max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heat_led_operation() {
        let ctx = TechContext::constant(8760, 85.0, 60.0);
        let econ = EconomicParameters::default();
        let mut chp = Chp::new("BHKW_1", 1, 200.0, ChpFuel::Gas);
        let result = chp.calculate(&econ, &vec![300.0; 8760], &ctx);
        // S6: 200 kW × 8760 h = 1752 MWh térmicos
        assert!((result.heat_mwh - 1752.0).abs() < 1e-6);
        // la electricidad sigue a la térmica con η_el/η_th
        assert!((result.electricity_produced_mwh - 1752.0 * 0.33 / 0.57).abs() < 1e-6);
        assert!((result.fuel_mwh - 1752.0 / 0.57).abs() < 1e-6);
    }

    #[test]
    fn below_min_partload_stays_off() {
        let ctx = TechContext::constant(10, 85.0, 60.0);
        let econ = EconomicParameters::default();
        let mut chp = Chp::new("BHKW_1", 1, 200.0, ChpFuel::Gas);
        let result = chp.calculate(&econ, &vec![100.0; 10], &ctx);
        assert!(result.heat_mwh == 0.0);
        assert!(result.wgk_eur_per_mwh == 0.0);
    }
}
