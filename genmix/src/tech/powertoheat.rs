// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Power-to-Heat (caldera eléctrica / electrodos)

use serde::{Deserialize, Serialize};

use super::{annual_mwh, lookup_parameter, TechResult};
use crate::economics::{annuity, EconomicParameters};
use crate::strategy::ControlStrategy;
use crate::system::TechContext;

const CO2_FACTOR_ELECTRICITY: f64 = 0.4;
const PE_FACTOR_ELECTRICITY: f64 = 2.4;

/// Caldera eléctrica de respuesta inmediata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PowerToHeat {
    pub name: String,
    pub priority: u32,
    pub strategy: ControlStrategy,
    /// Potencia térmica nominal, kW
    pub th_power_kw: f64,
    /// Rendimiento de conversión
    pub efficiency: f64,
    /// Inversión específica, €/kW
    pub spec_invest_eur_per_kw: f64,
    pub lifetime_years: f64,
    pub f_inst: f64,
    pub f_w_insp: f64,

    #[serde(skip)]
    pub active: bool,
    #[serde(skip)]
    pub heat_kw: Vec<f64>,
    #[serde(skip)]
    pub electricity_kw: Vec<f64>,
}

impl PowerToHeat {
    pub fn new(name: &str, priority: u32, th_power_kw: f64) -> Self {
        PowerToHeat {
            name: name.to_string(),
            priority,
            strategy: ControlStrategy::Threshold { charge_on: 70.0 },
            th_power_kw,
            efficiency: 0.98,
            spec_invest_eur_per_kw: 100.0,
            lifetime_years: 20.0,
            f_inst: 1.0,
            f_w_insp: 1.0,
            active: false,
            heat_kw: Vec::new(),
            electricity_kw: Vec::new(),
        }
    }

    pub fn init_operation(&mut self, hours: usize) {
        self.heat_kw = vec![0.0; hours];
        self.electricity_kw = vec![0.0; hours];
        self.active = false;
    }

    pub fn generate(&mut self, t: usize, remaining_kw: f64) -> (f64, f64) {
        let q = remaining_kw.clamp(0.0, self.th_power_kw);
        self.heat_kw[t] = q;
        self.electricity_kw[t] = q / self.efficiency;
        (q, q)
    }

    pub fn calculate(
        &mut self,
        econ: &EconomicParameters,
        load_profile: &[f64],
        ctx: &TechContext,
    ) -> TechResult {
        self.init_operation(load_profile.len());
        for (t, &load) in load_profile.iter().enumerate() {
            self.generate(t, load);
        }
        self.economics(econ, ctx)
    }

    pub fn economics(&mut self, econ: &EconomicParameters, ctx: &TechContext) -> TechResult {
        let heat_mwh = annual_mwh(&self.heat_kw, ctx.duration_h);
        let electricity_mwh = annual_mwh(&self.electricity_kw, ctx.duration_h);
        let wgk = if heat_mwh > 0.0 {
            let invest = self.spec_invest_eur_per_kw * self.th_power_kw;
            annuity(
                invest,
                self.lifetime_years,
                self.f_inst,
                self.f_w_insp,
                0.0,
                econ,
                electricity_mwh,
                econ.electricity_price,
                0.0,
            ) / heat_mwh
        } else {
            0.0
        };
        TechResult {
            tech_name: self.name.clone(),
            heat_mwh,
            heat_kw: self.heat_kw.clone(),
            electricity_consumed_mwh: electricity_mwh,
            electricity_kw: self.electricity_kw.clone(),
            wgk_eur_per_mwh: wgk,
            spec_co2_t_per_mwh: if heat_mwh > 0.0 {
                electricity_mwh * CO2_FACTOR_ELECTRICITY / heat_mwh
            } else {
                0.0
            },
            primary_energy_factor: if heat_mwh > 0.0 {
                electricity_mwh * PE_FACTOR_ELECTRICITY / heat_mwh
            } else {
                0.0
            },
            color: "crimson",
            ..Default::default()
        }
    }

    pub fn add_optimization_parameters(&self, idx: &str) -> (Vec<f64>, Vec<String>, Vec<(f64, f64)>) {
        (
            vec![self.th_power_kw],
            vec![format!("th_Leistung_P2H_{}", idx)],
            vec![(0.0, (self.th_power_kw * 5.0).max(1000.0))],
        )
    }

    pub fn set_parameters(&mut self, values: &[f64], order: &[String], idx: &str) {
        if let Some(v) = lookup_parameter(values, order, &format!("th_Leistung_P2H_{}", idx)) {
            self.th_power_kw = v.max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn electricity_follows_heat() {
        let mut p2h = PowerToHeat::new("P2H_1", 3, 1000.0);
        p2h.init_operation(2);
        let (q, _) = p2h.generate(0, 500.0);
        assert!((q - 500.0).abs() < 1e-9);
        assert!((p2h.electricity_kw[0] - 500.0 / 0.98).abs() < 1e-9);
        // saturación a la nominal
        let (q, _) = p2h.generate(1, 2000.0);
        assert!((q - 1000.0).abs() < 1e-9);
    }
}
