// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Lazo de control externo de la red
//!
//! Cada paso de tiempo se resuelve intercalando el solver interno con los
//! controladores hasta que todos declaran convergencia:
//!
//! - [`BadPointPressureLift`]: regulación proporcional de la presión de la
//!   bomba principal para mantener la presión diferencial del punto crítico
//!   (Schlechtpunkt) de la red en la consigna
//! - [`MinimumSupplyTemperature`]: elevación de la consigna de retorno de un
//!   consumidor hasta alcanzar su temperatura mínima de impulsión
//! - [`ConstantProfile`]: escritura de un valor de un perfil temporal sobre un
//!   campo escalar de un elemento (demanda, retorno, impulsión, caudal)
//!
//! Los controladores se ejecutan en el orden de adjunción, que es estable
//! entre pasos; el orden no afecta al resultado una vez convergido.

use log::{debug, warn};

use crate::common::k_to_c;
use crate::error::Result;
use crate::hydraulics;
use crate::model::{Network, PumpControl};

/// Iteraciones máximas del lazo externo de control
pub const MAX_OUTER_ITER: usize = 100;

/// Campo escalar controlado por un perfil temporal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileTarget {
    /// Demanda térmica de un consumidor, W
    ConsumerQext(usize),
    /// Consigna de temperatura de retorno de un consumidor, K
    ConsumerTreturn(usize),
    /// Consigna de temperatura de impulsión de una bomba, K
    PumpTFlow(usize),
    /// Consigna de caudal másico de una bomba secundaria, kg/s
    PumpMdot(usize),
}

/// Controlador trivial: en cada paso de tiempo escribe el valor del perfil
/// en el campo del elemento. Siempre está convergido
#[derive(Debug, Clone)]
pub struct ConstantProfile {
    pub target: ProfileTarget,
    /// Valores del perfil, indexados por paso de tiempo (unidades SI del campo)
    pub values: Vec<f64>,
}

impl ConstantProfile {
    pub fn new(target: ProfileTarget, values: Vec<f64>) -> Self {
        ConstantProfile { target, values }
    }

    fn on_time_step(&mut self, net: &mut Network, t: usize) {
        let value = match self.values.get(t) {
            Some(&v) => v,
            None => *self.values.last().unwrap_or(&0.0),
        };
        match self.target {
            ProfileTarget::ConsumerQext(id) => net.consumers[id].qext_w = value,
            ProfileTarget::ConsumerTreturn(id) => net.consumers[id].treturn_k = value,
            ProfileTarget::PumpTFlow(id) => net.pumps[id].t_flow_k = value,
            ProfileTarget::PumpMdot(id) => {
                if let PumpControl::MassFlow { mdot_kg_per_s } = &mut net.pumps[id].control {
                    *mdot_kg_per_s = value;
                }
            }
        }
    }
}

/// Regulador de presión diferencial en el punto crítico
///
/// Identifica al comienzo de cada iteración el consumidor activo con menor
/// presión diferencial y ajusta proporcionalmente `p_flow` y `p_lift` de la
/// bomba principal hasta llevarlo a la consigna. Sin demanda pasa a espera
/// con las presiones mínimas de circulación
#[derive(Debug, Clone)]
pub struct BadPointPressureLift {
    /// Bomba controlada (debe ser de control por presión)
    pub pump: usize,
    /// Consigna de presión diferencial mínima, bar
    pub target_dp_min_bar: f64,
    /// Tolerancia, bar
    pub tolerance: f64,
    /// Ganancia proporcional
    pub proportional_gain: f64,
    /// Salto de bomba en espera, bar
    pub min_plift: f64,
    /// Presión de impulsión en espera, bar
    pub min_pflow: f64,
    iteration: usize,
    /// Punto crítico actual (consumidor, dp)
    bad_point: Option<(usize, f64)>,
}

impl BadPointPressureLift {
    pub fn new(pump: usize) -> Self {
        BadPointPressureLift {
            pump,
            target_dp_min_bar: 1.0,
            tolerance: 0.2,
            proportional_gain: 0.2,
            min_plift: 1.5,
            min_pflow: 3.5,
            iteration: 0,
            bad_point: None,
        }
    }

    /// Punto crítico: consumidor activo con la menor presión diferencial
    fn calculate_worst_point(net: &Network) -> Option<(usize, f64)> {
        net.consumers
            .iter()
            .filter(|c| c.qext_w != 0.0 && c.dp_bar().is_finite())
            .map(|c| (c.id, c.dp_bar()))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    fn on_time_step(&mut self, net: &mut Network, _t: usize) {
        self.iteration = 0;
        self.bad_point = Self::calculate_worst_point(net);
    }

    fn is_converged(&mut self, net: &mut Network) -> bool {
        if net.all_consumers_idle() {
            // en espera se mantienen las presiones mínimas de circulación
            self.enter_standby(net);
            return true;
        }
        self.bad_point = Self::calculate_worst_point(net);
        match self.bad_point {
            Some((_, dp)) => (dp - self.target_dp_min_bar).abs() < self.tolerance,
            None => true,
        }
    }

    fn enter_standby(&self, net: &mut Network) {
        if let PumpControl::Pressure {
            p_flow_bar,
            p_lift_bar,
        } = &mut net.pumps[self.pump].control
        {
            if *p_lift_bar != self.min_plift || *p_flow_bar != self.min_pflow {
                debug!("sin demanda térmica: bomba principal en espera");
                *p_lift_bar = self.min_plift;
                *p_flow_bar = self.min_pflow;
            }
        }
    }

    fn control_step(&mut self, net: &mut Network) {
        self.iteration += 1;

        if net.all_consumers_idle() {
            self.enter_standby(net);
            return;
        }

        let current_dp = match self.bad_point {
            Some((_, dp)) => dp,
            None => return,
        };
        let dp_error = self.target_dp_min_bar - current_dp;
        let adjustment = dp_error * self.proportional_gain;
        if let PumpControl::Pressure {
            p_flow_bar,
            p_lift_bar,
        } = &mut net.pumps[self.pump].control
        {
            *p_lift_bar += adjustment;
            *p_flow_bar += adjustment;
            debug!(
                "punto crítico dp = {:.3} bar, ajuste {:.3} bar -> p_lift = {:.3} bar",
                current_dp, adjustment, p_lift_bar
            );
        }
    }
}

/// Regulador de temperatura mínima de impulsión de un consumidor
///
/// Eleva la consigna de retorno en pasos fijos mientras la temperatura de
/// impulsión observada (media ponderada de las dos últimas observaciones,
/// pesos 1, 2) no alcance el mínimo exigido. Convergencia forzada con aviso
/// al agotar las iteraciones
#[derive(Debug, Clone)]
pub struct MinimumSupplyTemperature {
    /// Consumidor controlado
    pub consumer: usize,
    /// Temperatura mínima de impulsión, °C
    pub min_supply_temperature_c: f64,
    /// Tolerancia de estabilidad, °C
    pub tolerance: f64,
    /// Iteraciones máximas por paso antes de forzar convergencia
    pub max_iterations: usize,
    /// Paso de ajuste de la consigna de retorno, K
    pub temperature_adjustment_step: f64,
    /// Perfil temporal opcional del mínimo exigido, °C
    pub profile: Option<Vec<f64>>,
    iteration: usize,
    previous_temperatures: Vec<f64>,
    standard_return_temperature_k: Option<f64>,
    /// Señal de convergencia forzada en el último paso
    pub force_converged: bool,
}

impl MinimumSupplyTemperature {
    pub fn new(consumer: usize, min_supply_temperature_c: f64) -> Self {
        MinimumSupplyTemperature {
            consumer,
            min_supply_temperature_c,
            tolerance: 2.0,
            max_iterations: MAX_OUTER_ITER,
            temperature_adjustment_step: 1.0,
            profile: None,
            iteration: 0,
            previous_temperatures: Vec::new(),
            standard_return_temperature_k: None,
            force_converged: false,
        }
    }

    /// Media ponderada de las observaciones recientes (pesos 1, 2, …)
    fn weighted_average_temperature(&self) -> Option<f64> {
        if self.previous_temperatures.is_empty() {
            return None;
        }
        let mut num = 0.0;
        let mut den = 0.0;
        for (i, t) in self.previous_temperatures.iter().enumerate() {
            let w = (i + 1) as f64;
            num += w * t;
            den += w;
        }
        Some(num / den)
    }

    fn on_time_step(&mut self, net: &mut Network, t: usize) {
        self.iteration = 0;
        self.previous_temperatures.clear();
        self.force_converged = false;

        // restaura la consigna de retorno original del consumidor
        match self.standard_return_temperature_k {
            None => self.standard_return_temperature_k = Some(net.consumers[self.consumer].treturn_k),
            Some(treturn) => net.consumers[self.consumer].treturn_k = treturn,
        }

        // actualiza el mínimo exigido desde el perfil, si lo hay
        if let Some(profile) = &self.profile {
            if let Some(&v) = profile.get(t).or_else(|| profile.last()) {
                self.min_supply_temperature_c = v;
            }
        }
    }

    fn is_converged(&mut self, net: &mut Network) -> bool {
        if net.all_consumers_idle() {
            return true;
        }
        let consumer = &net.consumers[self.consumer];
        let current_t_in = k_to_c(consumer.t_to_k);

        let previous = self.previous_temperatures.last().copied();
        let change = previous.map(|p| (current_t_in - p).abs());

        // historia corta: se conservan las dos últimas observaciones
        self.previous_temperatures.push(current_t_in);
        if self.previous_temperatures.len() > 2 {
            self.previous_temperatures.remove(0);
        }

        if current_t_in < self.min_supply_temperature_c {
            if self.iteration >= self.max_iterations {
                warn!(
                    "Consumidor {}: temperatura mínima de impulsión no alcanzada ({:.1} °C < {:.1} °C), convergencia forzada",
                    self.consumer, current_t_in, self.min_supply_temperature_c
                );
                self.force_converged = true;
                return true;
            }
            return false;
        }
        match change {
            Some(delta) if delta < self.tolerance => true,
            _ if self.iteration >= self.max_iterations => {
                warn!(
                    "Consumidor {}: iteraciones máximas alcanzadas en el control de temperatura",
                    self.consumer
                );
                self.force_converged = true;
                true
            }
            _ => false,
        }
    }

    fn control_step(&mut self, net: &mut Network) {
        self.iteration += 1;
        if net.all_consumers_idle() {
            return;
        }
        let current_t_in = self
            .weighted_average_temperature()
            .unwrap_or_else(|| k_to_c(net.consumers[self.consumer].t_to_k));
        if current_t_in < self.min_supply_temperature_c {
            let consumer = &mut net.consumers[self.consumer];
            consumer.treturn_k += self.temperature_adjustment_step;
            debug!(
                "Consumidor {}: impulsión {:.1} °C < {:.1} °C, retorno elevado a {:.1} °C",
                self.consumer,
                current_t_in,
                self.min_supply_temperature_c,
                k_to_c(consumer.treturn_k)
            );
        }
    }
}

/// Controlador de la red, polimórfico sobre las capacidades
/// {on_time_step, control_step, is_converged}
#[derive(Debug, Clone)]
pub enum Controller {
    BadPointPressureLift(BadPointPressureLift),
    MinimumSupplyTemperature(MinimumSupplyTemperature),
    ConstantProfile(ConstantProfile),
}

impl Controller {
    /// Prepara el controlador para el paso de tiempo `t`
    pub fn on_time_step(&mut self, net: &mut Network, t: usize) {
        match self {
            Controller::BadPointPressureLift(c) => c.on_time_step(net, t),
            Controller::MinimumSupplyTemperature(c) => c.on_time_step(net, t),
            Controller::ConstantProfile(c) => c.on_time_step(net, t),
        }
    }

    /// ¿Ha alcanzado el controlador su consigna?
    ///
    /// El regulador del punto crítico aprovecha la comprobación para aplicar
    /// las presiones de espera cuando la red está parada
    pub fn is_converged(&mut self, net: &mut Network) -> bool {
        match self {
            Controller::BadPointPressureLift(c) => c.is_converged(net),
            Controller::MinimumSupplyTemperature(c) => c.is_converged(net),
            Controller::ConstantProfile(_) => true,
        }
    }

    /// Ajusta la consigna manipulada por el controlador
    pub fn control_step(&mut self, net: &mut Network) {
        match self {
            Controller::BadPointPressureLift(c) => c.control_step(net),
            Controller::MinimumSupplyTemperature(c) => c.control_step(net),
            Controller::ConstantProfile(_) => {}
        }
    }
}

/// Estadísticas de la resolución de un paso de tiempo
#[derive(Debug, Clone, Default)]
pub struct StepStats {
    /// Iteraciones del lazo externo empleadas
    pub outer_iterations: usize,
    /// ¿Convergieron todos los controladores?
    pub converged: bool,
    /// Consumidores cuyo controlador de temperatura forzó la convergencia
    pub forced_consumers: Vec<usize>,
}

/// Resuelve un paso de tiempo completo: solver interno + lazo de control
///
/// Alcanzar `max_outer_iter` es un aviso, no un error; los fallos del solver
/// interno sí se propagan
pub fn run_time_step(net: &mut Network, t: usize) -> Result<StepStats> {
    run_time_step_with_max_iter(net, t, MAX_OUTER_ITER)
}

pub fn run_time_step_with_max_iter(
    net: &mut Network,
    t: usize,
    max_outer_iter: usize,
) -> Result<StepStats> {
    // los controladores se extraen temporalmente para poder mutar la red
    let mut controllers = std::mem::take(&mut net.controllers);
    let result = (|| {
        for ctrl in controllers.iter_mut() {
            ctrl.on_time_step(net, t);
        }
        let mut stats = control_loop(net, &mut controllers, max_outer_iter)?;
        for ctrl in controllers.iter() {
            if let Controller::MinimumSupplyTemperature(c) = ctrl {
                if c.force_converged {
                    stats.forced_consumers.push(c.consumer);
                }
            }
        }
        Ok(stats)
    })();
    net.controllers = controllers;
    result
}

/// Resuelve el estado de la red sin avanzar el paso de tiempo
///
/// Se usa tras modificar diámetros o sentidos de flujo para que la bomba se
/// reajuste al nuevo estado
pub fn run_control(net: &mut Network) -> Result<StepStats> {
    let mut controllers = std::mem::take(&mut net.controllers);
    let result = control_loop(net, &mut controllers, MAX_OUTER_ITER);
    net.controllers = controllers;
    result
}

/// Lazo solver interno + controladores hasta convergencia de todos
fn control_loop(
    net: &mut Network,
    controllers: &mut [Controller],
    max_outer_iter: usize,
) -> Result<StepStats> {
    let mut stats = StepStats::default();
    loop {
        hydraulics::solve(net)?;
        stats.outer_iterations += 1;
        let mut all_converged = true;
        for ctrl in controllers.iter_mut() {
            if !ctrl.is_converged(net) {
                ctrl.control_step(net);
                all_converged = false;
            }
        }
        if all_converged {
            stats.converged = true;
            break;
        }
        if stats.outer_iterations >= max_outer_iter {
            warn!(
                "lazo de control sin converger tras {} iteraciones",
                stats.outer_iterations
            );
            break;
        }
    }
    Ok(stats)
}

/// Consigna de impulsión del generador: control estático o gleitend
/// (deslizante con la temperatura exterior)
pub fn supply_temperature_profile(
    max_supply_c: f64,
    min_supply_c: f64,
    min_air_c: f64,
    max_air_c: f64,
    air_temperature_c: &[f64],
) -> Vec<f64> {
    // recta entre (min_air, max_supply) y (max_air, min_supply), acotada fuera
    let slope = (max_supply_c - min_supply_c) / (min_air_c - max_air_c);
    air_temperature_c
        .iter()
        .map(|&t_air| {
            if t_air <= min_air_c {
                max_supply_c
            } else if t_air >= max_air_c {
                min_supply_c
            } else {
                max_supply_c + slope * (t_air - min_air_c)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sliding_supply_temperature() {
        let profile = supply_temperature_profile(85.0, 70.0, -12.0, 15.0, &[-20.0, -12.0, 1.5, 15.0, 25.0]);
        assert!((profile[0] - 85.0).abs() < 1e-9);
        assert!((profile[1] - 85.0).abs() < 1e-9);
        // punto intermedio: interpolación lineal
        assert!((profile[2] - (85.0 - 13.5 / 27.0 * 15.0)).abs() < 1e-9);
        assert!((profile[3] - 70.0).abs() < 1e-9);
        assert!((profile[4] - 70.0).abs() < 1e-9);
    }

    #[test]
    fn weighted_average_uses_recent_observations() {
        let mut ctrl = MinimumSupplyTemperature::new(0, 40.0);
        ctrl.previous_temperatures = vec![30.0, 36.0];
        // pesos 1 y 2: (30 + 2·36) / 3
        assert!((ctrl.weighted_average_temperature().unwrap() - 34.0).abs() < 1e-9);
    }
}
