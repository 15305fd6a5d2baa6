// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Calderas de gas y de biomasa

use serde::{Deserialize, Serialize};

use super::{annual_mwh, lookup_parameter, TechResult};
use crate::economics::{annuity, EconomicParameters};
use crate::strategy::ControlStrategy;
use crate::system::TechContext;

/// Factor de emisión del gas natural, tCO₂/MWh
const CO2_FACTOR_GAS: f64 = 0.201;
/// Factor de energía primaria del gas natural
const PE_FACTOR_GAS: f64 = 1.1;
/// Factor de emisión de la astilla de madera, tCO₂/MWh
const CO2_FACTOR_WOOD: f64 = 0.036;
/// Factor de energía primaria de la madera
const PE_FACTOR_WOOD: f64 = 0.2;

/// Caldera de gas (unidad de punta)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GasBoiler {
    pub name: String,
    pub priority: u32,
    pub strategy: ControlStrategy,
    /// Potencia térmica nominal, kW
    pub th_power_kw: f64,
    /// Rendimiento estacional
    pub efficiency: f64,
    /// Inversión específica, €/kW
    pub spec_invest_eur_per_kw: f64,
    /// Vida útil, a
    pub lifetime_years: f64,
    /// Factores anuales de instalación y de mantenimiento e inspección, %
    pub f_inst: f64,
    pub f_w_insp: f64,
    /// Atención anual, h
    pub operating_effort_h: f64,

    #[serde(skip)]
    pub active: bool,
    #[serde(skip)]
    pub heat_kw: Vec<f64>,
    #[serde(skip)]
    pub fuel_kw: Vec<f64>,
}

impl GasBoiler {
    pub fn new(name: &str, priority: u32, th_power_kw: f64) -> Self {
        GasBoiler {
            name: name.to_string(),
            priority,
            strategy: ControlStrategy::Threshold { charge_on: 70.0 },
            th_power_kw,
            efficiency: 0.9,
            spec_invest_eur_per_kw: 30.0,
            lifetime_years: 20.0,
            f_inst: 1.0,
            f_w_insp: 2.0,
            operating_effort_h: 0.0,
            active: false,
            heat_kw: Vec::new(),
            fuel_kw: Vec::new(),
        }
    }

    pub fn init_operation(&mut self, hours: usize) {
        self.heat_kw = vec![0.0; hours];
        self.fuel_kw = vec![0.0; hours];
        self.active = false;
    }

    pub fn generate(&mut self, t: usize, remaining_kw: f64) -> (f64, f64) {
        let q = remaining_kw.clamp(0.0, self.th_power_kw);
        self.heat_kw[t] = q;
        self.fuel_kw[t] = q / self.efficiency;
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
        let fuel_mwh = annual_mwh(&self.fuel_kw, ctx.duration_h);
        let wgk = if heat_mwh > 0.0 {
            let invest = self.spec_invest_eur_per_kw * self.th_power_kw;
            annuity(
                invest,
                self.lifetime_years,
                self.f_inst,
                self.f_w_insp,
                self.operating_effort_h,
                econ,
                fuel_mwh,
                econ.gas_price,
                0.0,
            ) / heat_mwh
        } else {
            0.0
        };
        TechResult {
            tech_name: self.name.clone(),
            heat_mwh,
            heat_kw: self.heat_kw.clone(),
            fuel_mwh,
            wgk_eur_per_mwh: wgk,
            spec_co2_t_per_mwh: safe_ratio(fuel_mwh * CO2_FACTOR_GAS, heat_mwh),
            primary_energy_factor: safe_ratio(fuel_mwh * PE_FACTOR_GAS, heat_mwh),
            color: "saddlebrown",
            ..Default::default()
        }
    }

    pub fn add_optimization_parameters(&self, idx: &str) -> (Vec<f64>, Vec<String>, Vec<(f64, f64)>) {
        (
            vec![self.th_power_kw],
            vec![format!("Wärmeleistung_{}", idx)],
            vec![(0.0, (self.th_power_kw * 5.0).max(1000.0))],
        )
    }

    pub fn set_parameters(&mut self, values: &[f64], order: &[String], idx: &str) {
        if let Some(v) = lookup_parameter(values, order, &format!("Wärmeleistung_{}", idx)) {
            self.th_power_kw = v.max(0.0);
        }
    }
}

/// Caldera de biomasa con depósito de inercia opcional
///
/// El depósito de inercia solo interviene en la inversión; el acoplamiento
/// térmico horario se modela con el almacenamiento del sistema
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BiomassBoiler {
    pub name: String,
    pub priority: u32,
    pub strategy: ControlStrategy,
    /// Potencia térmica nominal, kW
    pub th_power_kw: f64,
    /// Volumen del depósito de inercia, m³
    pub buffer_volume_m3: f64,
    /// Rendimiento estacional
    pub efficiency: f64,
    /// Carga parcial mínima (fracción de la nominal)
    pub min_partload: f64,
    /// Inversión específica de la caldera, €/kW, y del depósito, €/m³
    pub spec_invest_eur_per_kw: f64,
    pub spec_invest_buffer_eur_per_m3: f64,
    pub lifetime_years: f64,
    pub f_inst: f64,
    pub f_w_insp: f64,
    pub operating_effort_h: f64,

    #[serde(skip)]
    pub active: bool,
    #[serde(skip)]
    pub heat_kw: Vec<f64>,
    #[serde(skip)]
    pub fuel_kw: Vec<f64>,
}

impl BiomassBoiler {
    pub fn new(name: &str, priority: u32, th_power_kw: f64, buffer_volume_m3: f64) -> Self {
        BiomassBoiler {
            name: name.to_string(),
            priority,
            strategy: ControlStrategy::Threshold { charge_on: 70.0 },
            th_power_kw,
            buffer_volume_m3,
            efficiency: 0.8,
            min_partload: 0.3,
            spec_invest_eur_per_kw: 200.0,
            spec_invest_buffer_eur_per_m3: 790.0,
            lifetime_years: 15.0,
            f_inst: 3.0,
            f_w_insp: 3.0,
            operating_effort_h: 20.0,
            active: false,
            heat_kw: Vec::new(),
            fuel_kw: Vec::new(),
        }
    }

    pub fn init_operation(&mut self, hours: usize) {
        self.heat_kw = vec![0.0; hours];
        self.fuel_kw = vec![0.0; hours];
        self.active = false;
    }

    pub fn generate(&mut self, t: usize, remaining_kw: f64) -> (f64, f64) {
        // por debajo de la carga parcial mínima la caldera no arranca
        let q = if remaining_kw >= self.th_power_kw * self.min_partload {
            remaining_kw.min(self.th_power_kw)
        } else {
            0.0
        };
        self.heat_kw[t] = q;
        self.fuel_kw[t] = q / self.efficiency;
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
            self.generate(t, load.max(0.0));
        }
        self.economics(econ, ctx)
    }

    pub fn economics(&mut self, econ: &EconomicParameters, ctx: &TechContext) -> TechResult {
        let heat_mwh = annual_mwh(&self.heat_kw, ctx.duration_h);
        let fuel_mwh = annual_mwh(&self.fuel_kw, ctx.duration_h);
        let wgk = if heat_mwh > 0.0 {
            let invest = self.spec_invest_eur_per_kw * self.th_power_kw
                + self.spec_invest_buffer_eur_per_m3 * self.buffer_volume_m3;
            annuity(
                invest,
                self.lifetime_years,
                self.f_inst,
                self.f_w_insp,
                self.operating_effort_h,
                econ,
                fuel_mwh,
                econ.wood_price,
                0.0,
            ) / heat_mwh
        } else {
            0.0
        };
        TechResult {
            tech_name: self.name.clone(),
            heat_mwh,
            heat_kw: self.heat_kw.clone(),
            fuel_mwh,
            wgk_eur_per_mwh: wgk,
            spec_co2_t_per_mwh: safe_ratio(fuel_mwh * CO2_FACTOR_WOOD, heat_mwh),
            primary_energy_factor: safe_ratio(fuel_mwh * PE_FACTOR_WOOD, heat_mwh),
            color: "forestgreen",
            ..Default::default()
        }
    }

    pub fn add_optimization_parameters(&self, idx: &str) -> (Vec<f64>, Vec<String>, Vec<(f64, f64)>) {
        (
            vec![self.th_power_kw, self.buffer_volume_m3],
            vec![
                format!("Wärmeleistung_{}", idx),
                format!("Speicher_Volumen_{}", idx),
            ],
            vec![
                (0.0, (self.th_power_kw * 5.0).max(1000.0)),
                (0.0, (self.buffer_volume_m3 * 5.0).max(100.0)),
            ],
        )
    }

    pub fn set_parameters(&mut self, values: &[f64], order: &[String], idx: &str) {
        if let Some(v) = lookup_parameter(values, order, &format!("Wärmeleistung_{}", idx)) {
            self.th_power_kw = v.max(0.0);
        }
        if let Some(v) = lookup_parameter(values, order, &format!("Speicher_Volumen_{}", idx)) {
            self.buffer_volume_m3 = v.max(0.0);
        }
    }
}

fn safe_ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::TechContext;

    #[test]
    fn gas_boiler_covers_up_to_nominal() {
        let mut boiler = GasBoiler::new("Gaskessel_1", 2, 500.0);
        boiler.init_operation(3);
        assert_eq!(boiler.generate(0, 300.0), (300.0, 300.0));
        assert_eq!(boiler.generate(1, 800.0), (500.0, 500.0));
        assert_eq!(boiler.generate(2, -5.0), (0.0, 0.0));
        assert!((boiler.fuel_kw[1] - 500.0 / 0.9).abs() < 1e-9);
    }

    #[test]
    fn biomass_boiler_min_partload() {
        let mut boiler = BiomassBoiler::new("Biomassekessel_1", 1, 400.0, 20.0);
        boiler.init_operation(2);
        // por debajo del 30 % de la nominal no arranca
        assert_eq!(boiler.generate(0, 100.0), (0.0, 0.0));
        assert_eq!(boiler.generate(1, 150.0), (150.0, 150.0));
    }

    #[test]
    fn gas_boiler_economics() {
        let ctx = TechContext::constant(8760, 85.0, 60.0);
        let econ = EconomicParameters::default();
        let mut boiler = GasBoiler::new("Gaskessel_1", 2, 500.0);
        let result = boiler.calculate(&econ, &vec![300.0; 8760], &ctx);
        // 300 kW × 8760 h = 2628 MWh
        assert!((result.heat_mwh - 2628.0).abs() < 1e-6);
        assert!((result.fuel_mwh - 2628.0 / 0.9).abs() < 1e-6);
        assert!(result.wgk_eur_per_mwh > 0.0);
        // emisiones específicas del gas referidas al calor
        assert!((result.spec_co2_t_per_mwh - 0.201 / 0.9).abs() < 1e-9);
    }
}
