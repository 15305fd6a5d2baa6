// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Sistema de generación: despacho por prioridad y balance anual
//!
//! La lista de tecnologías, ordenada por prioridad (los empates se resuelven
//! por orden de inserción), cubre hora a hora la carga residual de la red.
//! Con almacenamiento estacional presente, cada tecnología decide su estado
//! con su estrategia frente a las temperaturas del depósito y el depósito
//! absorbe la diferencia entre generación y demanda.
//!
//! Conservación del despacho, exacta en coma flotante para cada hora:
//!
//! ```text
//! Σ Q_i[t] + Q_net_sto[t] + unmet[t] − excess[t] = Q_net[t]
//! ```
//!
//! con `Q_net_sto` positivo al descargar (criterio de
//! [`crate::storage::StratifiedStorage`]).

use log::info;
use serde::Serialize;

use climate::{Location, TryData};
use dhnet::CopTable;

use crate::economics::EconomicParameters;
use crate::storage::StratifiedStorage;
use crate::tech::{TechResult, Technology};
use crate::NOT_MODELLED;

/// Curva característica COP por defecto (impulsión 35-85 °C, fuente 0-35 °C)
const DEFAULT_COP_CSV: &str = "QT/VLT;35;45;55;65;75;85\n\
0;4.2;3.5;3.0;2.5;2.1;1.8\n\
5;4.7;3.9;3.3;2.7;2.3;2.0\n\
10;5.2;4.3;3.6;3.0;2.5;2.1\n\
15;5.8;4.7;3.9;3.3;2.7;2.3\n\
20;6.5;5.3;4.3;3.6;3.0;2.5\n\
25;7.3;5.9;4.8;3.9;3.2;2.7\n\
30;8.2;6.5;5.3;4.3;3.5;2.9\n\
35;9.2;7.2;5.8;4.7;3.8;3.1\n";

/// Datos compartidos que las tecnologías necesitan para generar
#[derive(Debug, Clone)]
pub struct TechContext {
    /// Temperatura de impulsión de la red, °C
    pub supply_temp_c: Vec<f64>,
    /// Temperatura de retorno de la red, °C
    pub return_temp_c: Vec<f64>,
    /// Año meteorológico de referencia
    pub try_data: TryData,
    /// Curva característica de las bombas de calor
    pub cop_table: CopTable,
    /// Localización del emplazamiento (solar térmica)
    pub location: Location,
    /// Duración del paso, h
    pub duration_h: f64,
}

impl TechContext {
    /// Contexto con temperaturas constantes y clima nulo, para ensayos y
    /// barridos rápidos
    pub fn constant(hours: usize, supply_c: f64, return_c: f64) -> Self {
        TechContext {
            supply_temp_c: vec![supply_c; hours],
            return_temp_c: vec![return_c; hours],
            try_data: TryData {
                temperature: vec![10.0; hours],
                wind_speed: vec![0.0; hours],
                direct_radiation: vec![0.0; hours],
                diffuse_radiation: vec![0.0; hours],
            },
            cop_table: CopTable::from_csv(DEFAULT_COP_CSV).expect("curva COP por defecto válida"),
            location: Location {
                latitude: 51.0,
                longitude: 13.7,
                std_longitude: 15.0,
            },
            duration_h: 1.0,
        }
    }
}

/// Resultados agregados del despacho
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnergySystemResults {
    /// Demanda anual, MWh
    pub annual_demand_mwh: f64,
    /// Carga residual tras todas las tecnologías y el almacenamiento, kW
    pub residual_load_kw: Vec<f64>,
    /// Demanda no cubierta, kW y total anual MWh
    pub unmet_kw: Vec<f64>,
    pub unmet_mwh: f64,
    /// Calor excedente (estancamiento / vertido), MWh
    pub excess_mwh: f64,
    /// Resultados por tecnología, en orden de despacho
    #[serde(skip)]
    pub tech_results: Vec<TechResult>,
    /// Cuota de cada tecnología sobre la demanda anual
    pub shares: Vec<f64>,
    /// Flujo neto del almacenamiento, kW (+descarga / −carga)
    pub storage_flow_kw: Vec<f64>,
    /// Coste de generación medio ponderado, €/MWh
    pub wgk_eur_per_mwh: f64,
    /// Emisiones específicas medias, tCO₂/MWh
    pub spec_co2_t_per_mwh: f64,
    /// Factor de energía primaria medio
    pub primary_energy_factor: f64,
    /// Electricidad producida y consumida, MWh
    pub electricity_produced_mwh: f64,
    pub electricity_consumed_mwh: f64,
    /// Potencia eléctrica neta horaria (producción − consumo), kW
    pub electricity_net_kw: Vec<f64>,
}

/// Sistema de generación de calor de la red
#[derive(Debug, Clone)]
pub struct EnergySystem {
    /// Carga de la red, kW por hora
    pub load_profile_kw: Vec<f64>,
    pub ctx: TechContext,
    pub economic_parameters: EconomicParameters,
    pub technologies: Vec<Technology>,
    pub storage: Option<StratifiedStorage>,
    pub results: EnergySystemResults,
}

impl EnergySystem {
    pub fn new(
        load_profile_kw: Vec<f64>,
        ctx: TechContext,
        economic_parameters: EconomicParameters,
    ) -> Self {
        EnergySystem {
            load_profile_kw,
            ctx,
            economic_parameters,
            technologies: Vec::new(),
            storage: None,
            results: EnergySystemResults::default(),
        }
    }

    /// Añade una tecnología manteniendo el orden de prioridad (estable para
    /// los empates)
    pub fn add_technology(&mut self, tech: Technology) {
        self.technologies.push(tech);
        self.technologies.sort_by_key(Technology::priority);
    }

    pub fn add_storage(&mut self, storage: StratifiedStorage) {
        self.storage = Some(storage);
    }

    /// Calcula el mix de generación; con `variables` no vacío aplica antes
    /// los valores del optimizador
    pub fn calculate_mix(&mut self, variables: &[f64], variables_order: &[String]) -> &EnergySystemResults {
        if !variables.is_empty() {
            for tech in self.technologies.iter_mut() {
                let idx = tech.name_index().to_string();
                tech.set_parameters(variables, variables_order, &idx);
            }
        }

        let hours = self.load_profile_kw.len();
        for tech in self.technologies.iter_mut() {
            tech.init_operation(hours);
        }

        let mut tech_results: Vec<TechResult> = Vec::with_capacity(self.technologies.len());
        let mut storage_flow = vec![0.0; hours];

        if let Some(storage) = &mut self.storage {
            // despacho horario con almacenamiento: las estrategias deciden
            // con las temperaturas del depósito y este absorbe la diferencia
            for t in 0..hours {
                let load = self.load_profile_kw[t];
                let (upper, lower) = storage.current_storage_temperatures(t);
                let mut remaining = load;
                let mut q_in_total = 0.0;
                for tech in self.technologies.iter_mut() {
                    let active =
                        tech.strategy()
                            .decide(tech.is_active(), Some(upper), Some(lower), remaining);
                    tech.set_active(active);
                    if active {
                        let (q_out, q_produced) = tech.generate(t, remaining, &self.ctx);
                        remaining -= q_out;
                        q_in_total += q_produced;
                    }
                }
                // el depósito recibe el desequilibrio neto: carga con el
                // excedente de generación y descarga el déficit
                let surplus = (q_in_total - load).max(0.0);
                let deficit = (load - q_in_total).max(0.0);
                storage.simulate_step(
                    t,
                    surplus,
                    deficit,
                    self.ctx.supply_temp_c[t],
                    self.ctx.return_temp_c[t],
                );
                storage_flow[t] = storage.q_net_storage_flow_kw[t];
            }
            storage.calculate_efficiency();
            for tech in self.technologies.iter_mut() {
                tech_results.push(tech.calculate_recorded(&self.economic_parameters, &self.ctx));
            }
        } else {
            // despacho por barrido de series: cada tecnología consume la
            // carga residual de las anteriores
            let mut residual = self.load_profile_kw.clone();
            for tech in self.technologies.iter_mut() {
                let result = tech.calculate(&self.economic_parameters, &residual, &self.ctx);
                for (r, q) in residual.iter_mut().zip(&result.heat_kw) {
                    *r -= q;
                }
                tech_results.push(result);
            }
        }

        self.results = self.aggregate(tech_results, storage_flow);
        &self.results
    }

    /// Agrega los resultados por tecnología en los totales del sistema
    fn aggregate(&self, tech_results: Vec<TechResult>, storage_flow_kw: Vec<f64>) -> EnergySystemResults {
        let hours = self.load_profile_kw.len();
        let duration = self.ctx.duration_h;
        let annual_demand_mwh = self.load_profile_kw.iter().sum::<f64>() / 1000.0 * duration;

        let mut results = EnergySystemResults {
            annual_demand_mwh,
            residual_load_kw: self.load_profile_kw.clone(),
            unmet_kw: vec![0.0; hours],
            electricity_net_kw: vec![0.0; hours],
            storage_flow_kw,
            ..Default::default()
        };

        for tech in &tech_results {
            for (r, q) in results.residual_load_kw.iter_mut().zip(&tech.heat_kw) {
                *r -= q;
            }
            results.shares.push(if annual_demand_mwh > 0.0 {
                tech.heat_mwh / annual_demand_mwh
            } else {
                0.0
            });

            // las tecnologías sin modelo económico no entran en los totales
            if tech.heat_mwh > 1e-6 && tech.wgk_eur_per_mwh != NOT_MODELLED {
                results.wgk_eur_per_mwh += tech.heat_mwh * tech.wgk_eur_per_mwh / annual_demand_mwh;
                results.spec_co2_t_per_mwh +=
                    tech.heat_mwh * tech.spec_co2_t_per_mwh / annual_demand_mwh;
                results.primary_energy_factor +=
                    tech.heat_mwh * tech.primary_energy_factor / annual_demand_mwh;
            }

            results.electricity_produced_mwh += tech.electricity_produced_mwh;
            results.electricity_consumed_mwh += tech.electricity_consumed_mwh;
            let sign = if tech.electricity_produced_mwh > 0.0 { 1.0 } else { -1.0 };
            for (e, p) in results.electricity_net_kw.iter_mut().zip(&tech.electricity_kw) {
                *e += sign * p;
            }
        }

        // el flujo del almacenamiento también reduce la carga residual
        for (r, s) in results.residual_load_kw.iter_mut().zip(&results.storage_flow_kw) {
            *r -= s;
        }

        for (t, r) in results.residual_load_kw.iter().enumerate() {
            if *r > 0.0 {
                results.unmet_kw[t] = *r;
                results.unmet_mwh += r / 1000.0 * duration;
            } else {
                results.excess_mwh += -r / 1000.0 * duration;
            }
        }

        info!(
            "mix calculado: demanda {:.1} MWh, sin cubrir {:.3} MWh, WGK {:.2} €/MWh",
            annual_demand_mwh, results.unmet_mwh, results.wgk_eur_per_mwh
        );
        results.tech_results = tech_results;
        results
    }

    /// Serializa la configuración de tecnologías a JSON (persistencia de
    /// proyectos)
    pub fn technologies_to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(&self.technologies)?)
    }

    /// Restaura la lista de tecnologías desde JSON; los campos desconocidos
    /// se rechazan
    pub fn technologies_from_json(&mut self, data: &str) -> crate::Result<()> {
        let techs: Vec<Technology> = serde_json::from_str(data)?;
        if techs.is_empty() {
            return Err(crate::Error::InvalidInput(
                "la configuración no contiene ninguna tecnología".to_string(),
            ));
        }
        self.technologies = techs;
        self.technologies.sort_by_key(Technology::priority);
        Ok(())
    }

    /// Vuelca el despacho horario a CSV separado por `;`
    pub fn save_to_csv<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let mut header = vec!["Zeit".to_string(), "Last_kW".to_string()];
        for tech in &self.results.tech_results {
            header.push(format!("{}_kW", tech.tech_name));
        }
        if self.storage.is_some() {
            header.push("Speicher_Nettofluss_kW".to_string());
        }
        header.push("el_Leistung_netto_kW".to_string());
        header.push("ungedeckt_kW".to_string());
        writeln!(writer, "{}", header.join(";"))?;

        for t in 0..self.load_profile_kw.len() {
            let mut row = vec![format!("{}", t), format!("{:.3}", self.load_profile_kw[t])];
            for tech in &self.results.tech_results {
                row.push(format!("{:.3}", tech.heat_kw.get(t).copied().unwrap_or(0.0)));
            }
            if self.storage.is_some() {
                row.push(format!("{:.3}", self.results.storage_flow_kw[t]));
            }
            row.push(format!("{:.3}", self.results.electricity_net_kw[t]));
            row.push(format!("{:.3}", self.results.unmet_kw[t]));
            writeln!(writer, "{}", row.join(";"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tech::{Chp, ChpFuel, GasBoiler};

    #[test]
    fn priority_order_is_stable() {
        let ctx = TechContext::constant(10, 85.0, 60.0);
        let mut sys = EnergySystem::new(vec![300.0; 10], ctx, EconomicParameters::default());
        sys.add_technology(Technology::GasBoiler(GasBoiler::new("Gaskessel_1", 2, 500.0)));
        sys.add_technology(Technology::Chp(Chp::new("BHKW_1", 1, 200.0, ChpFuel::Gas)));
        sys.add_technology(Technology::GasBoiler(GasBoiler::new("Gaskessel_2", 2, 100.0)));
        let names: Vec<_> = sys.technologies.iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, ["BHKW_1", "Gaskessel_1", "Gaskessel_2"]);
    }
}
