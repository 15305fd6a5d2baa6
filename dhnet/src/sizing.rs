// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Dimensionado de la red en fase de diseño
//!
//! Tres operaciones que recalculan la red internamente:
//!
//! - [`correct_flow_directions`]: intercambia los extremos de las tuberías
//!   con velocidad negativa tras un primer cálculo
//! - [`init_diameter_types`]: asignación inicial de tipos normalizados a
//!   partir del diámetro requerido por continuidad `d·√(v/v_max)`
//! - [`optimize_diameter_types`]: refinado por la escalera discreta de tipos
//!   del catálogo, subiendo los tubos que exceden `v_max` y probando a bajar
//!   un escalón los que van sobrados
//!
//! Tras cada modificación se ejecuta el lazo de control para que la bomba
//! principal se reajuste al nuevo estado de la red.

use log::{debug, info};

use crate::catalogue::PipeCatalogue;
use crate::control::run_control;
use crate::error::{Error, Result};
use crate::model::Network;

/// Corrige los sentidos de flujo intercambiando los extremos de las tuberías
/// que resultaron con velocidad media negativa. Se ejecuta una sola vez
///
/// Devuelve el número de tuberías corregidas
pub fn correct_flow_directions(net: &mut Network) -> Result<usize> {
    run_control(net)?;

    let mut corrections = 0;
    for pipe in net.pipes.iter_mut() {
        if pipe.v_mean_m_per_s < 0.0 {
            std::mem::swap(&mut pipe.from_junction, &mut pipe.to_junction);
            corrections += 1;
        }
    }
    run_control(net)?;

    if corrections > 0 {
        info!("corregido el sentido de flujo de {} tuberías", corrections);
    }
    Ok(corrections)
}

/// Asigna a cada tubería el tipo normalizado más próximo al diámetro
/// requerido para no superar `v_max`
///
/// El diámetro requerido sale de la ecuación de continuidad:
/// `d_req = d · √(v / v_max)`
pub fn init_diameter_types(
    net: &mut Network,
    catalogue: &PipeCatalogue,
    v_max: f64,
    material: &str,
    k_mm: f64,
) -> Result<()> {
    if v_max <= 0.0 {
        return Err(Error::InvalidInput(format!("v_max no positiva: {}", v_max)));
    }
    // velocidades con los diámetros actuales y bomba reajustada
    run_control(net)?;

    let ladder = catalogue.filter_by_material(material)?;
    for pipe in net.pipes.iter_mut() {
        let velocity = pipe.v_mean_m_per_s.abs();
        let required = pipe.diameter_m * (velocity / v_max).sqrt();
        let closest = ladder
            .iter()
            .min_by(|a, b| {
                (a.inner_diameter_m - required)
                    .abs()
                    .total_cmp(&(b.inner_diameter_m - required).abs())
            })
            .expect("escalera de tipos no vacía");
        debug!(
            "tubería {}: v = {:.3} m/s, d_req = {:.4} m -> {}",
            pipe.id, velocity, required, closest.name
        );
        pipe.std_type = Some(closest.name.clone());
        pipe.diameter_m = closest.inner_diameter_m;
        pipe.u_w_per_m2k = closest.u_w_per_m2k;
        pipe.k_mm = k_mm;
    }

    // recálculo con los nuevos diámetros y reajuste de la bomba
    run_control(net)?;
    Ok(())
}

/// Refina los tipos normalizados por la escalera discreta del catálogo
///
/// Repite pasadas completas hasta que ninguna tubería cambia:
/// - velocidad > v_max y escalón superior disponible: sube un escalón
/// - velocidad ≤ v_max y escalón inferior disponible: prueba a bajar; si la
///   nueva velocidad excede el límite, revierte y marca la tubería como
///   optimizada
///
/// Al terminar, ninguna tubería supera `v_max` ni admite bajar un escalón
/// sin superarlo
pub fn optimize_diameter_types(
    net: &mut Network,
    catalogue: &PipeCatalogue,
    v_max: f64,
    material: &str,
    k_mm: f64,
) -> Result<()> {
    if v_max <= 0.0 {
        return Err(Error::InvalidInput(format!("v_max no positiva: {}", v_max)));
    }
    let ladder = catalogue.filter_by_material(material)?;
    let position_of = |name: &str| -> Result<usize> {
        ladder
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| Error::CatalogueLookup(name.to_string()))
    };

    // estado de partida (se asume init_diameter_types ya ejecutado)
    run_control(net)?;

    for pipe in net.pipes.iter_mut() {
        pipe.optimized = false;
    }

    let mut change_made = true;
    let mut pass = 0;
    while change_made {
        change_made = false;
        pass += 1;

        for idx in 0..net.pipes.len() {
            let velocity = net.pipes[idx].v_mean_m_per_s.abs();
            if net.pipes[idx].optimized && velocity <= v_max {
                continue;
            }
            let current_type = net.pipes[idx]
                .std_type
                .clone()
                .ok_or_else(|| Error::InvalidInput(format!("tubería {} sin tipo normalizado", idx)))?;
            let position = position_of(&current_type)?;

            if velocity > v_max && position < ladder.len() - 1 {
                // sube un escalón
                let new_type = ladder[position + 1];
                debug!(
                    "tubería {}: v = {:.3} > {:.2} m/s, {} -> {}",
                    idx, velocity, v_max, current_type, new_type.name
                );
                let pipe = &mut net.pipes[idx];
                pipe.std_type = Some(new_type.name.clone());
                pipe.diameter_m = new_type.inner_diameter_m;
                pipe.u_w_per_m2k = new_type.u_w_per_m2k;
                pipe.k_mm = k_mm;
                change_made = true;
            } else if velocity <= v_max && position > 0 {
                // prueba a bajar un escalón
                let new_type = ladder[position - 1];
                {
                    let pipe = &mut net.pipes[idx];
                    pipe.std_type = Some(new_type.name.clone());
                    pipe.diameter_m = new_type.inner_diameter_m;
                    pipe.u_w_per_m2k = new_type.u_w_per_m2k;
                    pipe.k_mm = k_mm;
                }
                run_control(net)?;
                let new_velocity = net.pipes[idx].v_mean_m_per_s.abs();

                if new_velocity <= v_max {
                    debug!(
                        "tubería {}: bajada {} -> {} (v = {:.3} m/s)",
                        idx, current_type, new_type.name, new_velocity
                    );
                    change_made = true;
                } else {
                    // revierte y da la tubería por optimizada
                    let old_type = ladder[position];
                    debug!(
                        "tubería {}: bajada a {} rechazada (v = {:.3} > {:.2} m/s)",
                        idx, new_type.name, new_velocity, v_max
                    );
                    let pipe = &mut net.pipes[idx];
                    pipe.std_type = Some(old_type.name.clone());
                    pipe.diameter_m = old_type.inner_diameter_m;
                    pipe.u_w_per_m2k = old_type.u_w_per_m2k;
                    pipe.k_mm = k_mm;
                    pipe.optimized = true;
                }
            } else {
                net.pipes[idx].optimized = true;
            }
        }

        if change_made {
            run_control(net)?;
        }
        info!(
            "optimización de diámetros, pasada {}: {}",
            pass,
            if change_made { "con cambios" } else { "sin cambios" }
        );
    }

    // cálculo final con los parámetros optimizados
    run_control(net)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::DEFAULT_CATALOGUE;
    use crate::control::{BadPointPressureLift, Controller};

    /// Red de un consumidor con tuberías deliberadamente sobredimensionadas
    fn oversized_net(qext_w: f64) -> Network {
        let mut net = Network::new();
        let j_ret_pump = net.add_junction((0.0, -1.0), 5.0, 333.15);
        let j_flow_pump = net.add_junction((0.0, 0.0), 5.0, 363.15);
        let j_sup = net.add_junction((100.0, 0.0), 5.0, 363.15);
        let j_ret = net.add_junction((100.0, -1.0), 5.0, 333.15);
        net.add_pipe_std_type(
            j_flow_pump,
            j_sup,
            "KMR 200/315-2v",
            &DEFAULT_CATALOGUE,
            0.1,
            0.1,
            5,
            283.15,
        )
        .unwrap();
        net.add_pipe_std_type(
            j_ret,
            j_ret_pump,
            "KMR 200/315-2v",
            &DEFAULT_CATALOGUE,
            0.1,
            0.1,
            5,
            283.15,
        )
        .unwrap();
        net.add_heat_consumer(j_ret, j_sup, qext_w, 333.15, 0.0).unwrap();
        net.add_circ_pump_pressure(j_ret_pump, j_flow_pump, 5.0, 2.0, 363.15)
            .unwrap();
        net.attach_controller(Controller::BadPointPressureLift(BadPointPressureLift::new(0)));
        net
    }

    #[test]
    fn init_assigns_standard_types() {
        let mut net = oversized_net(50_000.0);
        init_diameter_types(&mut net, &DEFAULT_CATALOGUE, 1.0, "KMR", 0.1).unwrap();
        for pipe in &net.pipes {
            assert!(pipe.std_type.is_some());
            // ~0.4 kg/s requieren un tipo pequeño, no el DN200 de partida
            assert!(pipe.diameter_m < 0.1);
        }
    }

    #[test]
    fn optimize_respects_velocity_cap() {
        let mut net = oversized_net(200_000.0);
        init_diameter_types(&mut net, &DEFAULT_CATALOGUE, 1.0, "KMR", 0.1).unwrap();
        optimize_diameter_types(&mut net, &DEFAULT_CATALOGUE, 1.0, "KMR", 0.1).unwrap();
        for pipe in &net.pipes {
            assert!(pipe.optimized);
            assert!(
                pipe.v_mean_m_per_s.abs() <= 1.0 + 1e-6,
                "v = {}",
                pipe.v_mean_m_per_s
            );
        }
    }

    #[test]
    fn reversed_pipe_gets_swapped() {
        let mut net = oversized_net(50_000.0);
        // invierte a mano la tubería de retorno
        let (from, to) = (net.pipes[1].from_junction, net.pipes[1].to_junction);
        net.pipes[1].from_junction = to;
        net.pipes[1].to_junction = from;
        let corrections = correct_flow_directions(&mut net).unwrap();
        assert_eq!(corrections, 1);
        assert_eq!(net.pipes[1].from_junction, from);
        assert!(net.pipes.iter().all(|p| p.v_mean_m_per_s >= 0.0));
    }
}
