// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Solar térmica de red (grandes campos de captadores)
//!
//! Modelo de captador cuasiestacionario (DIN EN ISO 9806 / ScenoCalc):
//!
//! ```text
//! q_util = η0 · (K_b(θ)·G_b,T + K_d·G_d,T) − c1·(T_m − T_a) − c2·(T_m − T_a)²
//! ```
//!
//! con la radiación sobre el plano del captador de [`climate::solar`] y la
//! corrección por ángulo de incidencia (IAM) del tipo de captador. La
//! temperatura media del captador se toma como la media de impulsión y
//! retorno de la red. El excedente sobre la demanda carga el almacenamiento
//! del sistema.

use serde::{Deserialize, Serialize};

use climate::solar::IamTable;

use super::{annual_mwh, lookup_parameter, TechResult};
use crate::economics::{annuity, EconomicParameters};
use crate::strategy::ControlStrategy;
use crate::system::TechContext;

/// Modificador de incidencia de la radiación difusa
const K_DIFFUSE: f64 = 0.96;

/// Tipo de captador
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectorType {
    /// Captador plano
    Flat,
    /// Tubo de vacío
    VacuumTube,
}

impl CollectorType {
    /// (η0, c1 W/(m²·K), c2 W/(m²·K²)) del captador
    pub fn coefficients(&self) -> (f64, f64, f64) {
        match self {
            CollectorType::Flat => (0.773, 1.741, 0.008),
            CollectorType::VacuumTube => (0.642, 0.885, 0.001),
        }
    }

    /// Tabla IAM del captador (ángulo °, factor)
    pub fn iam_table(&self) -> IamTable {
        match self {
            CollectorType::Flat => vec![
                (0.0, 1.0),
                (10.0, 1.0),
                (20.0, 0.99),
                (30.0, 0.98),
                (40.0, 0.96),
                (50.0, 0.91),
                (60.0, 0.82),
                (70.0, 0.53),
                (80.0, 0.27),
                (90.0, 0.0),
            ],
            CollectorType::VacuumTube => vec![
                (0.0, 1.0),
                (10.0, 1.0),
                (20.0, 1.0),
                (30.0, 0.99),
                (40.0, 0.97),
                (50.0, 0.94),
                (60.0, 0.87),
                (70.0, 0.70),
                (80.0, 0.35),
                (90.0, 0.0),
            ],
        }
    }
}

/// Campo de captadores solares térmicos
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolarThermal {
    pub name: String,
    pub priority: u32,
    pub strategy: ControlStrategy,
    /// Superficie bruta de captación, m²
    pub area_m2: f64,
    /// Volumen del acumulador solar, m³
    pub vs_m3: f64,
    pub collector: CollectorType,
    /// Inclinación y acimut del campo, grados
    pub tilt_deg: f64,
    pub azimuth_deg: f64,
    /// Reflectancia del entorno
    pub albedo: f64,
    /// Inversión específica del campo, €/m², y del acumulador, €/m³
    pub spec_invest_eur_per_m2: f64,
    pub spec_invest_storage_eur_per_m3: f64,
    pub lifetime_years: f64,
    pub f_inst: f64,
    pub f_w_insp: f64,

    #[serde(skip)]
    pub active: bool,
    #[serde(skip)]
    pub heat_kw: Vec<f64>,
}

impl SolarThermal {
    pub fn new(name: &str, priority: u32, area_m2: f64, vs_m3: f64, collector: CollectorType) -> Self {
        SolarThermal {
            name: name.to_string(),
            priority,
            strategy: ControlStrategy::AlwaysOn,
            area_m2,
            vs_m3,
            collector,
            tilt_deg: 36.0,
            azimuth_deg: 0.0,
            albedo: 0.2,
            spec_invest_eur_per_m2: 430.0,
            spec_invest_storage_eur_per_m3: 750.0,
            lifetime_years: 20.0,
            f_inst: 0.5,
            f_w_insp: 1.0,
            active: false,
            heat_kw: Vec::new(),
        }
    }

    pub fn init_operation(&mut self, hours: usize) {
        self.heat_kw = vec![0.0; hours];
        self.active = false;
    }

    /// Producción bruta del campo en la hora `t`, kW
    fn collector_output_kw(&self, t: usize, ctx: &TechContext) -> f64 {
        let iam = self.collector.iam_table();
        let rad = climate::radiation_for_surface(
            t,
            ctx.try_data.direct_radiation.get(t).copied().unwrap_or(0.0),
            ctx.try_data.diffuse_radiation.get(t).copied().unwrap_or(0.0),
            ctx.location,
            self.tilt_deg,
            self.azimuth_deg,
            self.albedo,
            Some(&iam),
        );
        let (eta0, c1, c2) = self.collector.coefficients();
        let t_air = ctx.try_data.temperature.get(t).copied().unwrap_or(0.0);
        let t_mean = (ctx.supply_temp_c[t] + ctx.return_temp_c[t]) / 2.0;
        let dt = t_mean - t_air;
        let q_w_per_m2 =
            eta0 * (rad.k_beam * rad.beam + K_DIFFUSE * rad.diffuse) - c1 * dt - c2 * dt * dt;
        (q_w_per_m2.max(0.0)) * self.area_m2 / 1000.0
    }

    /// La producción solar no se recorta a la demanda: el excedente carga el
    /// almacenamiento del sistema
    pub fn generate(&mut self, t: usize, remaining_kw: f64, ctx: &TechContext) -> (f64, f64) {
        let produced = self.collector_output_kw(t, ctx);
        self.heat_kw[t] = produced;
        (produced.min(remaining_kw.max(0.0)), produced)
    }

    pub fn calculate(
        &mut self,
        econ: &EconomicParameters,
        load_profile: &[f64],
        ctx: &TechContext,
    ) -> TechResult {
        self.init_operation(load_profile.len());
        for (t, &load) in load_profile.iter().enumerate() {
            // sin almacenamiento estacional solo computa hasta la demanda
            let produced = self.collector_output_kw(t, ctx);
            self.heat_kw[t] = produced.min(load.max(0.0));
        }
        self.economics(econ, ctx)
    }

    pub fn economics(&mut self, econ: &EconomicParameters, ctx: &TechContext) -> TechResult {
        let heat_mwh = annual_mwh(&self.heat_kw, ctx.duration_h);
        let wgk = if heat_mwh > 0.0 {
            let invest = self.spec_invest_eur_per_m2 * self.area_m2
                + self.spec_invest_storage_eur_per_m3 * self.vs_m3;
            annuity(
                invest,
                self.lifetime_years,
                self.f_inst,
                self.f_w_insp,
                0.0,
                econ,
                0.0,
                0.0,
                0.0,
            ) / heat_mwh
        } else {
            0.0
        };
        TechResult {
            tech_name: self.name.clone(),
            heat_mwh,
            heat_kw: self.heat_kw.clone(),
            wgk_eur_per_mwh: wgk,
            // la solar no emite ni consume energía primaria fósil
            spec_co2_t_per_mwh: 0.0,
            primary_energy_factor: 0.0,
            color: "gold",
            ..Default::default()
        }
    }

    pub fn add_optimization_parameters(&self, idx: &str) -> (Vec<f64>, Vec<String>, Vec<(f64, f64)>) {
        (
            vec![self.area_m2, self.vs_m3],
            vec![
                format!("Bruttofläche_{}", idx),
                format!("Speichervolumen_{}", idx),
            ],
            vec![
                (0.0, (self.area_m2 * 5.0).max(2000.0)),
                (0.0, (self.vs_m3 * 5.0).max(200.0)),
            ],
        )
    }

    pub fn set_parameters(&mut self, values: &[f64], order: &[String], idx: &str) {
        if let Some(v) = lookup_parameter(values, order, &format!("Bruttofläche_{}", idx)) {
            self.area_m2 = v.max(0.0);
        }
        if let Some(v) = lookup_parameter(values, order, &format!("Speichervolumen_{}", idx)) {
            self.vs_m3 = v.max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_output_at_night() {
        let ctx = TechContext::constant(24, 75.0, 50.0);
        let mut solar = SolarThermal::new("Solarthermie_1", 1, 100.0, 10.0, CollectorType::Flat);
        solar.init_operation(24);
        // sin radiación (TRY de ceros) no hay producción
        let (q, produced) = solar.generate(12, 500.0, &ctx);
        assert!(q == 0.0 && produced == 0.0);
    }

    #[test]
    fn sunny_noon_produces_heat() {
        let mut ctx = TechContext::constant(24, 60.0, 40.0);
        // mediodía de verano artificial
        ctx.try_data.direct_radiation[12] = 600.0;
        ctx.try_data.diffuse_radiation[12] = 200.0;
        ctx.try_data.temperature[12] = 25.0;
        let mut solar = SolarThermal::new("Solarthermie_1", 1, 100.0, 10.0, CollectorType::Flat);
        solar.init_operation(24);
        let (_q, produced) = solar.generate(12, 10.0, &ctx);
        assert!(produced > 0.0);
        // el excedente sobre la demanda queda disponible para el almacenamiento
        assert!(produced >= solar.heat_kw[12].min(10.0));
    }
}
