// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Driver de la simulación anual de la red
//!
//! Avanza la red controlada a lo largo de un rango de horas `[t_start, t_end)`
//! dentro del año (8760 h), alimentando los controladores de perfil con la
//! demanda, las temperaturas de retorno e impulsión y los caudales de los
//! productores secundarios, y registrando los resultados por elemento.
//!
//! Los fallos del solver en un paso se capturan: el paso queda registrado
//! como fallido, su fila de resultados repite la del paso anterior (NaN en el
//! paso 0) y la serie continúa.
//!
//! Incluye además el modo simplificado (escalado lineal del punto de diseño
//! con la demanda, con pérdidas absolutas constantes) y el preprocesado de
//! demandas: ley de impulsión estática o deslizante, reparto COP en redes
//! frías, suelo de carga mínima del 2 % y caudales de secundarios por
//! porcentaje de carga.

use indexmap::IndexMap;
use log::{info, warn};

use crate::common::{c_to_k, k_to_c};
use crate::control::{
    supply_temperature_profile, BadPointPressureLift, ConstantProfile, Controller,
    MinimumSupplyTemperature, ProfileTarget,
};
use crate::cop::CopTable;
use crate::error::{Error, Result};
use crate::fluid::CP_WATER_KJ;
use crate::model::Network;

/// Fracción de la carga punta usada como suelo de carga mínima
const MIN_LOAD_FRACTION: f64 = 0.02;

/// Clase de productor en la tabla de resultados
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProducerKind {
    /// Bomba principal (control por presión)
    Main,
    /// Productor secundario (control por caudal)
    Secondary,
}

impl ProducerKind {
    /// Etiqueta de la clase en los resultados CSV
    pub fn label(&self) -> &'static str {
        match self {
            ProducerKind::Main => "Heizentrale Haupteinspeisung",
            ProducerKind::Secondary => "weitere Einspeisung",
        }
    }
}

/// Series temporales de un productor
///
/// Presiones en bar, temperaturas en °C (frontera de resultados), caudal en
/// kg/s y potencia en kW
#[derive(Debug, Clone, Default)]
pub struct PumpSeries {
    pub mass_flow: Vec<f64>,
    pub flow_pressure: Vec<f64>,
    pub return_pressure: Vec<f64>,
    pub deltap: Vec<f64>,
    pub flow_temp: Vec<f64>,
    pub return_temp: Vec<f64>,
    pub qext_kw: Vec<f64>,
}

/// Resultados de la simulación anual
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesResults {
    /// Rango simulado `[start, end)` en horas del año
    pub start: usize,
    pub end: usize,
    /// Presión (bar) y temperatura (K) por nudo y paso
    pub junction_pressure_bar: Vec<Vec<f64>>,
    pub junction_temperature_k: Vec<Vec<f64>>,
    /// Series por consumidor
    pub consumer_mdot_kg_per_s: Vec<Vec<f64>>,
    pub consumer_vdot_m3_per_s: Vec<Vec<f64>>,
    pub consumer_t_from_k: Vec<Vec<f64>>,
    pub consumer_t_to_k: Vec<Vec<f64>>,
    /// Series por productor, indexadas por (clase, índice dentro de la clase)
    pub pumps: IndexMap<(ProducerKind, usize), PumpSeries>,
    /// Pasos en los que el solver no convergió (la fila repite la anterior)
    pub failed_steps: Vec<usize>,
    /// Pares (paso, consumidor) con convergencia forzada del control de
    /// temperatura mínima
    pub forced_steps: Vec<(usize, usize)>,
}

impl TimeSeriesResults {
    /// Número de pasos simulados
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Consigna de temperatura de impulsión del generador principal
#[derive(Debug, Clone)]
pub enum SupplyTemperature {
    /// Estática: `t_flow(t) = T_max` todo el año, °C
    Static(f64),
    /// Deslizante con la temperatura exterior (ver
    /// [`supply_temperature_profile`]), °C
    Sliding {
        max_supply_c: f64,
        min_supply_c: f64,
        min_air_c: f64,
        max_air_c: f64,
    },
    /// Perfil horario explícito, °C
    Profile(Vec<f64>),
}

impl SupplyTemperature {
    /// Resuelve la consigna a un perfil horario en °C
    ///
    /// La ley deslizante necesita la serie de temperatura exterior
    pub fn resolve(&self, air_temperature_c: Option<&[f64]>, hours: usize) -> Result<Vec<f64>> {
        match self {
            SupplyTemperature::Static(t) => Ok(vec![*t; hours]),
            SupplyTemperature::Profile(p) => {
                if p.len() < hours {
                    return Err(Error::InvalidInput(format!(
                        "perfil de impulsión de {} valores, se requieren {}",
                        p.len(),
                        hours
                    )));
                }
                Ok(p.clone())
            }
            SupplyTemperature::Sliding {
                max_supply_c,
                min_supply_c,
                min_air_c,
                max_air_c,
            } => {
                let air = air_temperature_c.ok_or_else(|| {
                    Error::InvalidInput(
                        "la ley de impulsión deslizante requiere la temperatura exterior".to_string(),
                    )
                })?;
                if air.len() < hours {
                    return Err(Error::InvalidInput(format!(
                        "serie de temperatura exterior de {} valores, se requieren {}",
                        air.len(),
                        hours
                    )));
                }
                Ok(supply_temperature_profile(
                    *max_supply_c,
                    *min_supply_c,
                    *min_air_c,
                    *max_air_c,
                    air,
                ))
            }
        }
    }
}

/// Perfiles horarios de la simulación anual
///
/// Todas las series son anuales (8760 valores) y se recortan con el rango
/// simulado; las temperaturas de entrada van en °C y se convierten a K al
/// escribirse en los elementos
#[derive(Debug, Clone)]
pub struct TimeSeriesProfiles {
    /// Demanda por consumidor, W
    pub qext_w: Vec<Vec<f64>>,
    /// Consigna de retorno por consumidor, °C
    pub treturn_c: Vec<Vec<f64>>,
    /// Perfil opcional de temperatura mínima de impulsión por consumidor, °C
    pub min_supply_c: Vec<Option<Vec<f64>>>,
    /// Consigna de impulsión del generador principal
    pub supply_temperature: SupplyTemperature,
    /// Caudal de cada productor secundario: (id de bomba, perfil kg/s)
    pub secondary_mdot: Vec<(usize, Vec<f64>)>,
}

impl TimeSeriesProfiles {
    fn validate(&self, net: &Network, hours: usize) -> Result<()> {
        if self.qext_w.len() != net.consumers.len() || self.treturn_c.len() != net.consumers.len() {
            return Err(Error::InvalidInput(format!(
                "se esperaban perfiles para {} consumidores (qext: {}, treturn: {})",
                net.consumers.len(),
                self.qext_w.len(),
                self.treturn_c.len()
            )));
        }
        for (i, profile) in self.qext_w.iter().enumerate() {
            if profile.len() < hours {
                return Err(Error::InvalidInput(format!(
                    "perfil de demanda del consumidor {} con {} valores, se requieren {}",
                    i,
                    profile.len(),
                    hours
                )));
            }
        }
        if !self.min_supply_c.is_empty() && self.min_supply_c.len() != net.consumers.len() {
            return Err(Error::InvalidInput(
                "los perfiles de temperatura mínima no casan con los consumidores".to_string(),
            ));
        }
        Ok(())
    }
}

/// Crea y adjunta los controladores de la simulación anual
///
/// Por consumidor: demanda y retorno (perfil constante) y, si procede, el
/// regulador de temperatura mínima. Para el generador principal la consigna
/// de impulsión y el regulador del punto crítico; para cada secundario su
/// caudal y su impulsión
pub fn create_controllers(
    net: &mut Network,
    profiles: &TimeSeriesProfiles,
    air_temperature_c: Option<&[f64]>,
    hours: usize,
) -> Result<()> {
    profiles.validate(net, hours)?;
    let main = net.main_pump()?;
    let supply_k: Vec<f64> = profiles
        .supply_temperature
        .resolve(air_temperature_c, hours)?
        .iter()
        .map(|&t| c_to_k(t))
        .collect();

    for i in 0..net.consumers.len() {
        net.attach_controller(Controller::ConstantProfile(ConstantProfile::new(
            ProfileTarget::ConsumerQext(i),
            profiles.qext_w[i].clone(),
        )));
        net.attach_controller(Controller::ConstantProfile(ConstantProfile::new(
            ProfileTarget::ConsumerTreturn(i),
            profiles.treturn_c[i].iter().map(|&t| c_to_k(t)).collect(),
        )));
        if let Some(Some(min_profile)) = profiles.min_supply_c.get(i) {
            let initial = match min_profile.first() {
                Some(&v) => v,
                None => continue,
            };
            info!(
                "consumidor {}: regulador de temperatura mínima de impulsión ({:.1} °C inicial)",
                i, initial
            );
            net.consumers[i].min_supply_temperature_c = Some(initial);
            let mut ctrl = MinimumSupplyTemperature::new(i, initial);
            ctrl.profile = Some(min_profile.clone());
            net.attach_controller(Controller::MinimumSupplyTemperature(ctrl));
        }
    }

    net.attach_controller(Controller::ConstantProfile(ConstantProfile::new(
        ProfileTarget::PumpTFlow(main),
        supply_k.clone(),
    )));
    for (pump_id, mdot_profile) in &profiles.secondary_mdot {
        net.attach_controller(Controller::ConstantProfile(ConstantProfile::new(
            ProfileTarget::PumpMdot(*pump_id),
            mdot_profile.clone(),
        )));
        net.attach_controller(Controller::ConstantProfile(ConstantProfile::new(
            ProfileTarget::PumpTFlow(*pump_id),
            supply_k.clone(),
        )));
    }

    net.attach_controller(Controller::BadPointPressureLift(BadPointPressureLift::new(
        main,
    )));
    Ok(())
}

/// Observador de progreso: se invoca al completar cada paso
pub type StepObserver<'a> = &'a mut dyn FnMut(usize, &crate::control::StepStats);

/// Simulación termohidráulica del rango `[start, end)`
///
/// La red debe llegar dimensionada y con los controladores creados
/// ([`create_controllers`])
pub fn thermohydraulic_time_series(
    net: &mut Network,
    start: usize,
    end: usize,
    mut observer: Option<StepObserver>,
) -> Result<TimeSeriesResults> {
    if start >= end || end > 8760 {
        return Err(Error::InvalidInput(format!(
            "rango horario no válido [{}, {})",
            start, end
        )));
    }
    let steps = end - start;
    let mut results = TimeSeriesResults {
        start,
        end,
        junction_pressure_bar: vec![Vec::with_capacity(steps); net.junctions.len()],
        junction_temperature_k: vec![Vec::with_capacity(steps); net.junctions.len()],
        consumer_mdot_kg_per_s: vec![Vec::with_capacity(steps); net.consumers.len()],
        consumer_vdot_m3_per_s: vec![Vec::with_capacity(steps); net.consumers.len()],
        consumer_t_from_k: vec![Vec::with_capacity(steps); net.consumers.len()],
        consumer_t_to_k: vec![Vec::with_capacity(steps); net.consumers.len()],
        ..Default::default()
    };
    for (kind, idx) in producer_keys(net) {
        results.pumps.insert((kind, idx), PumpSeries::default());
    }

    for t in start..end {
        match crate::control::run_time_step(net, t) {
            Ok(stats) => {
                log_step(net, &mut results);
                for &consumer in &stats.forced_consumers {
                    results.forced_steps.push((t, consumer));
                }
                if let Some(obs) = observer.as_mut() {
                    obs(t, &stats);
                }
            }
            Err(e) => {
                warn!("paso {} fallido: {}; se repite la fila anterior", t, e);
                results.failed_steps.push(t);
                repeat_last_row(&mut results);
            }
        }
    }
    info!(
        "serie temporal completada: {} pasos, {} fallidos",
        steps,
        results.failed_steps.len()
    );
    Ok(results)
}

/// Claves (clase, índice dentro de la clase) de los productores de la red
fn producer_keys(net: &Network) -> Vec<(ProducerKind, usize)> {
    let mut keys = Vec::new();
    let mut main_idx = 0;
    let mut secondary_idx = 0;
    for pump in &net.pumps {
        if pump.is_pressure_controlled() {
            keys.push((ProducerKind::Main, main_idx));
            main_idx += 1;
        } else {
            keys.push((ProducerKind::Secondary, secondary_idx));
            secondary_idx += 1;
        }
    }
    keys
}

fn log_step(net: &Network, results: &mut TimeSeriesResults) {
    for (j, junction) in net.junctions.iter().enumerate() {
        results.junction_pressure_bar[j].push(junction.p_bar);
        results.junction_temperature_k[j].push(junction.t_k);
    }
    for (i, c) in net.consumers.iter().enumerate() {
        results.consumer_mdot_kg_per_s[i].push(c.mdot_kg_per_s);
        results.consumer_vdot_m3_per_s[i].push(c.vdot_m3_per_s);
        results.consumer_t_from_k[i].push(c.t_from_k);
        results.consumer_t_to_k[i].push(c.t_to_k);
    }
    for (key, pump) in producer_keys(net).into_iter().zip(&net.pumps) {
        let series = results.pumps.get_mut(&key).expect("clave de productor registrada");
        series.mass_flow.push(pump.mdot_kg_per_s);
        series.flow_pressure.push(pump.p_to_bar);
        series.return_pressure.push(pump.p_from_bar);
        series.deltap.push(pump.p_to_bar - pump.p_from_bar);
        series.flow_temp.push(k_to_c(pump.t_to_k));
        series.return_temp.push(k_to_c(pump.t_from_k));
        series.qext_kw.push(pump.qext_kw());
    }
}

/// Rellena la fila del paso fallido con la anterior (NaN si es la primera)
fn repeat_last_row(results: &mut TimeSeriesResults) {
    fn push_last(series: &mut Vec<f64>) {
        let value = series.last().copied().unwrap_or(f64::NAN);
        series.push(value);
    }
    results.junction_pressure_bar.iter_mut().for_each(push_last);
    results.junction_temperature_k.iter_mut().for_each(push_last);
    results.consumer_mdot_kg_per_s.iter_mut().for_each(push_last);
    results.consumer_vdot_m3_per_s.iter_mut().for_each(push_last);
    results.consumer_t_from_k.iter_mut().for_each(push_last);
    results.consumer_t_to_k.iter_mut().for_each(push_last);
    for series in results.pumps.values_mut() {
        push_last(&mut series.mass_flow);
        push_last(&mut series.flow_pressure);
        push_last(&mut series.return_pressure);
        push_last(&mut series.deltap);
        push_last(&mut series.flow_temp);
        push_last(&mut series.return_temp);
        push_last(&mut series.qext_kw);
    }
}

/// Simulación simplificada: escalado lineal del punto de diseño con la demanda
///
/// No recalcula la red. Cada productor mantiene su cuota de generación del
/// punto de diseño; las pérdidas se mantienen constantes en valor absoluto;
/// temperaturas y presiones se mantienen (la impulsión sigue su consigna).
/// La red debe llegar resuelta en el punto de diseño
pub fn simplified_time_series(
    net: &Network,
    profiles: &TimeSeriesProfiles,
    air_temperature_c: Option<&[f64]>,
    start: usize,
    end: usize,
) -> Result<TimeSeriesResults> {
    if start >= end || end > 8760 {
        return Err(Error::InvalidInput(format!(
            "rango horario no válido [{}, {})",
            start, end
        )));
    }
    profiles.validate(net, end)?;
    info!("cálculo simplificado de la serie temporal a partir del punto de diseño");

    // estado de diseño de cada productor, del último cálculo de la red
    struct Design {
        key: (ProducerKind, usize),
        mass_flow: f64,
        flow_pressure: f64,
        return_pressure: f64,
        return_temp_c: f64,
        flow_temp_c: f64,
        qext_kw: f64,
    }
    let designs: Vec<Design> = producer_keys(net)
        .into_iter()
        .zip(&net.pumps)
        .map(|(key, p)| Design {
            key,
            mass_flow: p.mdot_kg_per_s,
            flow_pressure: p.p_to_bar,
            return_pressure: p.p_from_bar,
            return_temp_c: k_to_c(p.t_from_k),
            flow_temp_c: k_to_c(p.t_to_k),
            qext_kw: p.qext_kw(),
        })
        .collect();
    if designs.iter().any(|d| !d.qext_kw.is_finite()) {
        return Err(Error::InvalidInput(
            "la red no está resuelta en el punto de diseño".to_string(),
        ));
    }

    // demanda total de los edificios, kW
    let demand_kw: Vec<f64> = (start..end)
        .map(|t| profiles.qext_w.iter().map(|q| q[t]).sum::<f64>() / 1000.0)
        .collect();
    let design_demand_kw = (0..8760)
        .map(|t| {
            profiles
                .qext_w
                .iter()
                .map(|q| *q.get(t).unwrap_or(&0.0))
                .sum::<f64>()
                / 1000.0
        })
        .fold(0.0f64, f64::max);

    let total_generation: f64 = designs.iter().map(|d| d.qext_kw).sum();
    let design_losses_kw = total_generation - design_demand_kw;
    info!(
        "punto de diseño: {:.1} kW de demanda, {:.1} kW de pérdidas",
        design_demand_kw, design_losses_kw
    );

    let supply_c = profiles
        .supply_temperature
        .resolve(air_temperature_c, end)?;

    let mut results = TimeSeriesResults {
        start,
        end,
        ..Default::default()
    };
    for d in &designs {
        let share = if total_generation > 0.0 {
            d.qext_kw / total_generation
        } else {
            1.0
        };
        // la cuota de pérdidas del productor es constante (kW absolutos)
        let producer_losses = design_losses_kw * share;
        let mut series = PumpSeries::default();
        for (i, t) in (start..end).enumerate() {
            let qext = demand_kw[i] * share + producer_losses;
            let flow_temp = match profiles.supply_temperature {
                SupplyTemperature::Static(_) => d.flow_temp_c,
                _ => supply_c[t],
            };
            let delta_t = (flow_temp - d.return_temp_c).max(1.0);
            series.qext_kw.push(qext);
            series.mass_flow.push(qext / (CP_WATER_KJ * delta_t));
            series.flow_pressure.push(d.flow_pressure);
            series.return_pressure.push(d.return_pressure);
            series.deltap.push(d.flow_pressure - d.return_pressure);
            series.flow_temp.push(flow_temp);
            series.return_temp.push(d.return_temp_c);
        }
        results.pumps.insert(d.key, series);
    }
    Ok(results)
}

/// Demandas preprocesadas de los edificios conectados
#[derive(Debug, Clone, Default)]
pub struct PreprocessedDemand {
    /// Calor extraído de la red por subestación, W
    pub heat_w: Vec<Vec<f64>>,
    /// Electricidad de las bombas de calor descentralizadas, W (red fría)
    pub electricity_w: Vec<Vec<f64>>,
    /// Demanda térmica total de la red, kW
    pub total_heat_kw: Vec<f64>,
    /// Demanda eléctrica total, kW
    pub total_electricity_kw: Vec<f64>,
}

/// Reparto COP en redes frías: parte de la demanda del edificio la cubre la
/// electricidad de su bomba de calor y el resto se extrae de la red
///
/// `strom = wärme / COP`, `wärme_red = wärme − strom`
pub fn cold_network_split(
    building_heat_w: &[Vec<f64>],
    building_supply_c: &[f64],
    network_return_c: &[f64],
    cop_table: &CopTable,
) -> Result<PreprocessedDemand> {
    if building_heat_w.len() != building_supply_c.len()
        || building_heat_w.len() != network_return_c.len()
    {
        return Err(Error::InvalidInput(
            "series de demanda y temperaturas de edificios de longitudes distintas".to_string(),
        ));
    }
    let mut out = PreprocessedDemand::default();
    for ((heat, &supply_c), &source_c) in building_heat_w
        .iter()
        .zip(building_supply_c)
        .zip(network_return_c)
    {
        let (cop, _) = cop_table.cop(supply_c, source_c);
        if cop <= 1.0 {
            return Err(Error::InvalidInput(format!(
                "COP no válido ({:.2}) para impulsión {:.1} °C y fuente {:.1} °C",
                cop, supply_c, source_c
            )));
        }
        let electricity: Vec<f64> = heat.iter().map(|q| q / cop).collect();
        let net_heat: Vec<f64> = heat.iter().zip(&electricity).map(|(q, e)| q - e).collect();
        out.electricity_w.push(electricity);
        out.heat_w.push(net_heat);
    }
    finalize_totals(&mut out);
    Ok(out)
}

/// Demandas de red caliente: el calor del edificio se extrae íntegro de la red
pub fn hot_network_demand(building_heat_w: &[Vec<f64>]) -> PreprocessedDemand {
    let mut out = PreprocessedDemand {
        heat_w: building_heat_w.to_vec(),
        electricity_w: building_heat_w
            .iter()
            .map(|p| vec![0.0; p.len()])
            .collect(),
        ..Default::default()
    };
    finalize_totals(&mut out);
    out
}

/// Suelo de carga mínima del 2 % de la punta, aplicado a cada subestación
///
/// Evita caudales nulos que degeneran el cálculo hidráulico
fn apply_minimum_load(out: &mut PreprocessedDemand) {
    for (heat, elec) in out.heat_w.iter_mut().zip(out.electricity_w.iter_mut()) {
        let max_heat = heat.iter().copied().fold(0.0f64, f64::max);
        let max_elec = elec.iter().copied().fold(0.0f64, f64::max);
        for (q, e) in heat.iter_mut().zip(elec.iter_mut()) {
            if *q < MIN_LOAD_FRACTION * max_heat {
                *q = MIN_LOAD_FRACTION * max_heat;
                *e = MIN_LOAD_FRACTION * max_elec;
            }
        }
    }
}

fn finalize_totals(out: &mut PreprocessedDemand) {
    apply_minimum_load(out);
    let hours = out.heat_w.first().map(Vec::len).unwrap_or(0);
    out.total_heat_kw = (0..hours)
        .map(|t| out.heat_w.iter().map(|p| p[t]).sum::<f64>() / 1000.0)
        .collect();
    out.total_electricity_kw = (0..hours)
        .map(|t| out.electricity_w.iter().map(|p| p[t]).sum::<f64>() / 1000.0)
        .collect();
}

/// Caudal de un productor secundario a partir de su porcentaje de carga
///
/// `mdot = pct/100 · Q_total / (cp · (t_imp − t_ret_medio))`
pub fn secondary_producer_mass_flow(
    total_heat_kw: &[f64],
    supply_temperature_c: &[f64],
    mean_return_c: f64,
    load_percentage: f64,
) -> Vec<f64> {
    total_heat_kw
        .iter()
        .zip(supply_temperature_c)
        .map(|(&q, &t_sup)| {
            let delta_t = (t_sup - mean_return_c).max(1.0);
            load_percentage / 100.0 * q / (CP_WATER_KJ * delta_t)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimum_load_floor() {
        let mut demand = PreprocessedDemand {
            heat_w: vec![vec![0.0, 50_000.0, 100_000.0]],
            electricity_w: vec![vec![0.0, 10_000.0, 20_000.0]],
            ..Default::default()
        };
        finalize_totals(&mut demand);
        // el cero sube al 2 % de la punta
        assert!((demand.heat_w[0][0] - 2000.0).abs() < 1e-9);
        assert!((demand.electricity_w[0][0] - 400.0).abs() < 1e-9);
        assert!((demand.total_heat_kw[2] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn secondary_mass_flow_from_share() {
        let mdot = secondary_producer_mass_flow(&[418.0], &[85.0], 55.0, 20.0);
        // 20 % de 418 kW con ΔT de 30 K y cp 4.18 -> 0.6667 kg/s
        assert!((mdot[0] - 0.6667).abs() < 1e-3);
    }

    #[test]
    fn cold_network_split_reduces_network_heat() {
        let table = CopTable::from_csv(
            "QT/VLT;35;55\n\
             0;4.0;3.0\n\
             20;5.0;4.0\n",
        )
        .unwrap();
        let demand =
            cold_network_split(&[vec![10_000.0; 4]], &[55.0], &[10.0], &table).unwrap();
        // COP interpolado 3.5: strom = q/3.5, wärme_red = q - strom
        let expected_elec = 10_000.0 / 3.5;
        assert!((demand.electricity_w[0][0] - expected_elec).abs() < 1e-6);
        assert!((demand.heat_w[0][0] - (10_000.0 - expected_elec)).abs() < 1e-6);
    }
}
