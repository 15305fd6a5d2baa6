// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Bombas de calor de gran potencia (río, calor residual, geotermia, AqvaHeat)
//!
//! El COP se interpola bilinealmente de la curva característica
//! ([`dhnet::cop::CopTable`]) con los límites técnicos de la máquina: salto
//! máximo de 75 K y una impulsión mínima de 35 °C. La máquina solo opera si
//! puede alcanzar la impulsión de la red (menos su `dT` admisible) y si la
//! carga supera su mínimo técnico.

use serde::{Deserialize, Serialize};

use super::{annual_mwh, lookup_parameter, TechResult};
use crate::economics::{annuity, EconomicParameters};
use crate::strategy::ControlStrategy;
use crate::system::TechContext;
use crate::NOT_MODELLED;

/// Factor de emisión de la electricidad, tCO₂/MWh
const CO2_FACTOR_ELECTRICITY: f64 = 0.4;
/// Factor de energía primaria de la electricidad
const PE_FACTOR_ELECTRICITY: f64 = 2.4;

/// Fuente de calor de la bomba
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HeatPumpKind {
    /// Agua de río a temperatura aproximadamente constante
    River { river_temp_c: f64 },
    /// Calor residual: la capacidad frigorífica disponible limita el calor
    Waste {
        cooling_kw: f64,
        source_temp_c: f64,
    },
    /// Campo de sondas geotérmicas
    Geothermal {
        area_m2: f64,
        depth_m: f64,
        source_temp_c: f64,
        /// Separación entre sondas, m
        probe_spacing_m: f64,
        /// Potencia de extracción específica, W/m de sonda
        spec_extraction_w_per_m: f64,
        /// Coste específico de perforación, €/m
        spec_drill_cost_eur_per_m: f64,
    },
    /// Tecnología AqvaHeat (no modelizada económicamente: WGK y CO₂ valen −1
    /// y no se agregan a los totales)
    AqvaHeat { source_temp_c: f64 },
}

impl HeatPumpKind {
    fn source_temp_c(&self) -> f64 {
        match self {
            HeatPumpKind::River { river_temp_c } => *river_temp_c,
            HeatPumpKind::Waste { source_temp_c, .. } => *source_temp_c,
            HeatPumpKind::Geothermal { source_temp_c, .. } => *source_temp_c,
            HeatPumpKind::AqvaHeat { source_temp_c } => *source_temp_c,
        }
    }
}

/// Bomba de calor con su fuente
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeatPump {
    pub name: String,
    pub priority: u32,
    pub strategy: ControlStrategy,
    pub kind: HeatPumpKind,
    /// Potencia térmica nominal, kW (en las variantes limitadas por la fuente
    /// actúa además el límite de extracción)
    pub rated_heat_kw: f64,
    /// Defecto admisible de impulsión frente a la consigna de red, K
    pub dt_k: f64,
    /// Carga parcial mínima
    pub min_partload: f64,
    /// Inversión específica de la máquina, €/kW térmico
    pub spec_invest_wp_eur_per_kw: f64,
    /// Inversión específica de la fuente, €/kW (río y calor residual)
    pub spec_invest_source_eur_per_kw: f64,
    /// Vida útil de la máquina y de la fuente, a
    pub lifetime_wp_years: f64,
    pub lifetime_source_years: f64,
    pub f_inst_wp: f64,
    pub f_w_insp_wp: f64,
    pub f_inst_source: f64,
    pub f_w_insp_source: f64,

    #[serde(skip)]
    pub active: bool,
    #[serde(skip)]
    pub heat_kw: Vec<f64>,
    #[serde(skip)]
    pub electricity_kw: Vec<f64>,
    /// Calor extraído de la fuente (capacidad frigorífica empleada), kW
    #[serde(skip)]
    pub cooling_kw_series: Vec<f64>,
}

impl HeatPump {
    pub fn new(name: &str, priority: u32, rated_heat_kw: f64, kind: HeatPumpKind) -> Self {
        HeatPump {
            name: name.to_string(),
            priority,
            strategy: ControlStrategy::Threshold { charge_on: 70.0 },
            kind,
            rated_heat_kw,
            dt_k: 0.0,
            min_partload: 0.2,
            spec_invest_wp_eur_per_kw: 1000.0,
            spec_invest_source_eur_per_kw: 1000.0,
            lifetime_wp_years: 20.0,
            lifetime_source_years: 20.0,
            f_inst_wp: 1.0,
            f_w_insp_wp: 1.5,
            f_inst_source: 0.5,
            f_w_insp_source: 0.5,
            active: false,
            heat_kw: Vec::new(),
            electricity_kw: Vec::new(),
            cooling_kw_series: Vec::new(),
        }
    }

    pub fn init_operation(&mut self, hours: usize) {
        self.heat_kw = vec![0.0; hours];
        self.electricity_kw = vec![0.0; hours];
        self.cooling_kw_series = vec![0.0; hours];
        self.active = false;
    }

    /// Calor máximo que admite la fuente para un COP dado, kW
    fn source_limit_kw(&self, cop: f64) -> f64 {
        if cop <= 1.0 {
            return 0.0;
        }
        match &self.kind {
            HeatPumpKind::Waste { cooling_kw, .. } => cooling_kw / (1.0 - 1.0 / cop),
            HeatPumpKind::Geothermal {
                area_m2,
                depth_m,
                probe_spacing_m,
                spec_extraction_w_per_m,
                ..
            } => {
                let probes = (area_m2 / (probe_spacing_m * probe_spacing_m)).floor().max(1.0);
                let extraction_kw = probes * depth_m * spec_extraction_w_per_m / 1000.0;
                extraction_kw / (1.0 - 1.0 / cop)
            }
            HeatPumpKind::River { .. } | HeatPumpKind::AqvaHeat { .. } => f64::INFINITY,
        }
    }

    /// Generación en la hora `t`: devuelve `(Q_util, Q_producido)`
    ///
    /// En la variante de calor residual la electricidad no computa contra la
    /// demanda de red: `Q_util = Q − P_el`
    pub fn generate(&mut self, t: usize, remaining_kw: f64, ctx: &TechContext) -> (f64, f64) {
        let vlt = ctx.supply_temp_c[t];
        let (cop, vlt_wp) = ctx.cop_table.cop(vlt, self.kind.source_temp_c());
        // la máquina debe alcanzar la impulsión de la red
        if cop <= 1.0 || vlt_wp < vlt - self.dt_k {
            return (0.0, 0.0);
        }
        let capacity = self.rated_heat_kw.min(self.source_limit_kw(cop));
        if remaining_kw < capacity * self.min_partload {
            return (0.0, 0.0);
        }
        let q = remaining_kw.min(capacity);
        let electricity = q / cop;
        self.heat_kw[t] = q;
        self.electricity_kw[t] = electricity;
        self.cooling_kw_series[t] = q - electricity;
        match self.kind {
            HeatPumpKind::Waste { .. } => (q - electricity, q),
            _ => (q, q),
        }
    }

    pub fn calculate(
        &mut self,
        econ: &EconomicParameters,
        load_profile: &[f64],
        ctx: &TechContext,
    ) -> TechResult {
        self.init_operation(load_profile.len());
        for (t, &load) in load_profile.iter().enumerate() {
            self.generate(t, load.max(0.0), ctx);
        }
        self.economics(econ, ctx)
    }

    pub fn economics(&mut self, econ: &EconomicParameters, ctx: &TechContext) -> TechResult {
        let heat_mwh = annual_mwh(&self.heat_kw, ctx.duration_h);
        let electricity_mwh = annual_mwh(&self.electricity_kw, ctx.duration_h);

        if matches!(self.kind, HeatPumpKind::AqvaHeat { .. }) {
            // tecnología sin modelo económico: valores centinela
            return TechResult {
                tech_name: self.name.clone(),
                heat_mwh,
                heat_kw: self.heat_kw.clone(),
                electricity_consumed_mwh: electricity_mwh,
                electricity_kw: self.electricity_kw.clone(),
                wgk_eur_per_mwh: NOT_MODELLED,
                spec_co2_t_per_mwh: NOT_MODELLED,
                primary_energy_factor: NOT_MODELLED,
                color: "teal",
                ..Default::default()
            };
        }

        let wgk = if heat_mwh > 0.0 {
            // anualidad de la máquina, con la electricidad como energía
            let invest_wp = self.spec_invest_wp_eur_per_kw * self.rated_heat_kw.round();
            let a_wp = annuity(
                invest_wp,
                self.lifetime_wp_years,
                self.f_inst_wp,
                self.f_w_insp_wp,
                0.0,
                econ,
                electricity_mwh,
                econ.electricity_price,
                0.0,
            );
            // anualidad de la fuente de calor
            let invest_source = match &self.kind {
                HeatPumpKind::Geothermal {
                    area_m2,
                    depth_m,
                    probe_spacing_m,
                    spec_drill_cost_eur_per_m,
                    ..
                } => {
                    let probes = (area_m2 / (probe_spacing_m * probe_spacing_m)).floor().max(1.0);
                    probes * depth_m * spec_drill_cost_eur_per_m
                }
                HeatPumpKind::Waste { cooling_kw, .. } => {
                    self.spec_invest_source_eur_per_kw * cooling_kw
                }
                _ => self.spec_invest_source_eur_per_kw * self.rated_heat_kw,
            };
            let a_source = annuity(
                invest_source,
                self.lifetime_source_years,
                self.f_inst_source,
                self.f_w_insp_source,
                0.0,
                econ,
                0.0,
                0.0,
                0.0,
            );
            (a_wp + a_source) / heat_mwh
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
            color: "blue",
            ..Default::default()
        }
    }

    pub fn add_optimization_parameters(&self, idx: &str) -> (Vec<f64>, Vec<String>, Vec<(f64, f64)>) {
        match &self.kind {
            HeatPumpKind::River { .. } => (
                vec![self.rated_heat_kw],
                vec![format!("Wärmeleistung_FW_WP_{}", idx)],
                vec![(0.0, (self.rated_heat_kw * 5.0).max(1000.0))],
            ),
            HeatPumpKind::Waste { cooling_kw, .. } => (
                vec![*cooling_kw],
                vec![format!("Kühlleistung_Abwärme_{}", idx)],
                vec![(0.0, (cooling_kw * 5.0).max(500.0))],
            ),
            HeatPumpKind::Geothermal { area_m2, depth_m, .. } => (
                vec![*area_m2, *depth_m],
                vec![format!("Fläche_{}", idx), format!("Bohrtiefe_{}", idx)],
                vec![
                    (0.0, (area_m2 * 5.0).max(10_000.0)),
                    (50.0, (depth_m * 2.0).max(400.0)),
                ],
            ),
            HeatPumpKind::AqvaHeat { .. } => (Vec::new(), Vec::new(), Vec::new()),
        }
    }

    pub fn set_parameters(&mut self, values: &[f64], order: &[String], idx: &str) {
        match &mut self.kind {
            HeatPumpKind::River { .. } => {
                if let Some(v) =
                    lookup_parameter(values, order, &format!("Wärmeleistung_FW_WP_{}", idx))
                {
                    self.rated_heat_kw = v.max(0.0);
                }
            }
            HeatPumpKind::Waste { cooling_kw, .. } => {
                if let Some(v) =
                    lookup_parameter(values, order, &format!("Kühlleistung_Abwärme_{}", idx))
                {
                    *cooling_kw = v.max(0.0);
                }
            }
            HeatPumpKind::Geothermal {
                area_m2, depth_m, ..
            } => {
                if let Some(v) = lookup_parameter(values, order, &format!("Fläche_{}", idx)) {
                    *area_m2 = v.max(0.0);
                }
                if let Some(v) = lookup_parameter(values, order, &format!("Bohrtiefe_{}", idx)) {
                    *depth_m = v.max(0.0);
                }
            }
            HeatPumpKind::AqvaHeat { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn river_heat_pump_generates_with_cop() {
        let ctx = TechContext::constant(10, 75.0, 55.0);
        let mut hp = HeatPump::new(
            "Flusswasser_1",
            1,
            300.0,
            HeatPumpKind::River { river_temp_c: 10.0 },
        );
        hp.init_operation(10);
        let (q_out, q_prod) = hp.generate(0, 200.0, &ctx);
        assert!((q_out - 200.0).abs() < 1e-9);
        assert!((q_prod - 200.0).abs() < 1e-9);
        let (cop, _) = ctx.cop_table.cop(75.0, 10.0);
        assert!((hp.electricity_kw[0] - 200.0 / cop).abs() < 1e-9);
    }

    #[test]
    fn waste_heat_pump_discounts_electricity() {
        let ctx = TechContext::constant(10, 75.0, 55.0);
        let mut hp = HeatPump::new(
            "Abwärme_1",
            1,
            500.0,
            HeatPumpKind::Waste {
                cooling_kw: 100.0,
                source_temp_c: 30.0,
            },
        );
        hp.init_operation(10);
        let (q_out, q_prod) = hp.generate(0, 400.0, &ctx);
        // el calor útil descuenta la electricidad consumida
        assert!(q_out < q_prod);
        assert!((q_prod - q_out - hp.electricity_kw[0]).abs() < 1e-9);
        // la capacidad frigorífica limita la producción
        let (cop, _) = ctx.cop_table.cop(75.0, 30.0);
        let limit = 100.0 / (1.0 - 1.0 / cop);
        assert!(q_prod <= limit + 1e-9);
    }

    #[test]
    fn min_partload_blocks_operation() {
        let ctx = TechContext::constant(10, 75.0, 55.0);
        let mut hp = HeatPump::new(
            "Flusswasser_1",
            1,
            300.0,
            HeatPumpKind::River { river_temp_c: 10.0 },
        );
        hp.init_operation(10);
        // por debajo del 20 % de la nominal no arranca
        assert_eq!(hp.generate(0, 30.0, &ctx), (0.0, 0.0));
    }

    #[test]
    fn aqvaheat_uses_sentinels() {
        let ctx = TechContext::constant(10, 75.0, 55.0);
        let econ = EconomicParameters::default();
        let mut hp = HeatPump::new(
            "AqvaHeat_1",
            1,
            300.0,
            HeatPumpKind::AqvaHeat { source_temp_c: 15.0 },
        );
        let result = hp.calculate(&econ, &vec![200.0; 10], &ctx);
        assert!(result.heat_mwh > 0.0);
        assert!(result.wgk_eur_per_mwh == NOT_MODELLED);
        assert!(result.spec_co2_t_per_mwh == NOT_MODELLED);
    }
}
