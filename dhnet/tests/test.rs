// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

use dhnet::catalogue::DEFAULT_CATALOGUE;
use dhnet::control::{
    run_control, run_time_step, BadPointPressureLift, Controller, MinimumSupplyTemperature,
};
use dhnet::model::{Network, PumpControl};
use dhnet::sizing::optimize_diameter_types;
use dhnet::timeseries::{
    create_controllers, thermohydraulic_time_series, SupplyTemperature, TimeSeriesProfiles,
};

extern crate env_logger;

// Utilidades para tests ------------------

macro_rules! assert_almost_eq {
    ($a:expr, $b:expr) => {
        assert_almost_eq!($a, $b, 0.001)
    };
    ($a:expr, $b:expr, $c:expr) => {
        if ($a - $b).abs() > $c {
            panic!(
                "assertion failed: `abs(left - right) < {}`, (left: `{}`, right: `{}`)",
                $c, $a, $b
            );
        }
    };
}

// Inicialización para los tests
// El logger solo se activa si es un test y emite diagnósticos si el test falla
fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const T_EXT: f64 = 283.15;

/// Red S1: una bomba en (0,0) y un consumidor en (100,0), tuberías de ida y
/// vuelta de 100 m y 100 mm, qext = 50 kW, retorno 60 °C, impulsión 90 °C
fn s1_net(qext_w: f64) -> Network {
    let mut net = Network::new();
    let j_ret_pump = net.add_junction((0.0, -2.0), 5.0, 333.15);
    let j_flow_pump = net.add_junction((0.0, 0.0), 5.0, 363.15);
    let j_sup = net.add_junction((100.0, 0.0), 5.0, 363.15);
    let j_ret = net.add_junction((100.0, -2.0), 5.0, 333.15);
    net.add_pipe(j_flow_pump, j_sup, 0.1, 0.1, 0.1, 1.0, 5, T_EXT).unwrap();
    net.add_pipe(j_ret, j_ret_pump, 0.1, 0.1, 0.1, 1.0, 5, T_EXT).unwrap();
    net.add_heat_consumer(j_ret, j_sup, qext_w, 333.15, 0.0).unwrap();
    net.add_circ_pump_pressure(j_ret_pump, j_flow_pump, 5.0, 2.0, 363.15).unwrap();
    net.attach_controller(Controller::BadPointPressureLift(BadPointPressureLift::new(0)));
    net
}

/// Red S2: como S1 más un segundo consumidor 200 m aguas abajo
fn s2_net() -> Network {
    let mut net = Network::new();
    let j_ret_pump = net.add_junction((0.0, -2.0), 5.0, 333.15);
    let j_flow_pump = net.add_junction((0.0, 0.0), 5.0, 363.15);
    let j_sup1 = net.add_junction((100.0, 0.0), 5.0, 363.15);
    let j_ret1 = net.add_junction((100.0, -2.0), 5.0, 333.15);
    let j_sup2 = net.add_junction((300.0, 0.0), 5.0, 363.15);
    let j_ret2 = net.add_junction((300.0, -2.0), 5.0, 333.15);
    net.add_pipe(j_flow_pump, j_sup1, 0.1, 0.1, 0.1, 1.0, 5, T_EXT).unwrap();
    net.add_pipe(j_sup1, j_sup2, 0.08, 0.2, 0.1, 1.0, 5, T_EXT).unwrap();
    net.add_pipe(j_ret2, j_ret1, 0.08, 0.2, 0.1, 1.0, 5, T_EXT).unwrap();
    net.add_pipe(j_ret1, j_ret_pump, 0.1, 0.1, 0.1, 1.0, 5, T_EXT).unwrap();
    net.add_heat_consumer(j_ret1, j_sup1, 50_000.0, 333.15, 0.0).unwrap();
    net.add_heat_consumer(j_ret2, j_sup2, 50_000.0, 333.15, 0.0).unwrap();
    net.add_circ_pump_pressure(j_ret_pump, j_flow_pump, 5.0, 2.0, 363.15).unwrap();
    net.attach_controller(Controller::BadPointPressureLift(BadPointPressureLift::new(0)));
    net
}

// S1 — consumidor único: caudal y presión diferencial regulada ------------

#[test]
fn s1_single_consumer() {
    init();

    let mut net = s1_net(50_000.0);
    let stats = run_control(&mut net).unwrap();
    assert!(stats.converged);

    // mdot ≈ 50000 / (4180 · 30) ≈ 0.399 kg/s (algo más por el enfriamiento
    // de la tubería de impulsión)
    assert_almost_eq!(net.consumers[0].mdot_kg_per_s, 0.399, 0.03);

    // el regulador lleva la presión diferencial del consumidor a 1.0 ± 0.2 bar
    assert_almost_eq!(net.consumers[0].dp_bar(), 1.0, 0.2);
}

#[test]
fn s1_mass_balance_every_junction() {
    init();

    let mut net = s1_net(50_000.0);
    run_control(&mut net).unwrap();

    // invariante: balance de masa en cada nudo de la red
    for junction in &net.junctions {
        let j = junction.id;
        let mut balance = 0.0;
        for pipe in &net.pipes {
            if pipe.from_junction == j {
                balance -= pipe.mdot_kg_per_s;
            }
            if pipe.to_junction == j {
                balance += pipe.mdot_kg_per_s;
            }
        }
        for c in &net.consumers {
            if c.from_junction == j {
                balance += c.mdot_kg_per_s;
            }
            if c.to_junction == j {
                balance -= c.mdot_kg_per_s;
            }
        }
        for p in &net.pumps {
            if p.flow_junction == j {
                balance += p.mdot_kg_per_s;
            }
            if p.return_junction == j {
                balance -= p.mdot_kg_per_s;
            }
        }
        assert_almost_eq!(balance, 0.0, 1e-3);
    }
}

#[test]
fn s1_energy_balance() {
    init();

    let mut net = s1_net(50_000.0);
    run_control(&mut net).unwrap();

    // invariante: aporte de bombas − demanda = pérdidas de tuberías (±1 %)
    let pump_heat_w: f64 = net.pumps.iter().map(|p| p.qext_kw() * 1000.0).sum();
    let consumer_heat_w: f64 = net.consumers.iter().map(|c| c.qext_w).sum();
    let pipe_losses_w: f64 = net.pipes.iter().map(|p| p.q_loss_w).sum();
    assert_almost_eq!(
        pump_heat_w - consumer_heat_w,
        pipe_losses_w,
        0.01 * pump_heat_w
    );
}

// S2 — dos consumidores: el punto crítico es el más alejado ---------------

#[test]
fn s2_bad_point_downstream() {
    init();

    let mut net1 = s1_net(50_000.0);
    run_control(&mut net1).unwrap();
    let plift_s1 = match net1.pumps[0].control {
        PumpControl::Pressure { p_lift_bar, .. } => p_lift_bar,
        _ => unreachable!(),
    };

    let mut net = s2_net();
    run_control(&mut net).unwrap();

    // el consumidor alejado tiene la menor presión diferencial
    assert!(net.consumers[1].dp_bar() < net.consumers[0].dp_bar());
    // la bomba sube por encima del valor de S1 para compensar el ramal extra
    let plift_s2 = match net.pumps[0].control {
        PumpControl::Pressure { p_lift_bar, .. } => p_lift_bar,
        _ => unreachable!(),
    };
    assert!(plift_s2 > plift_s1, "{} <= {}", plift_s2, plift_s1);
    // ambos consumidores reciben al menos 0.8 bar
    assert!(net.consumers[0].dp_bar() >= 0.8);
    assert!(net.consumers[1].dp_bar() >= 0.8);
}

// S3 — red parada: espera de la bomba -------------------------------------

#[test]
fn s3_standby_when_idle() {
    init();

    let mut net = s1_net(0.0);
    // el controlador necesita al menos un paso de control para ir a espera
    run_control(&mut net).unwrap();

    match net.pumps[0].control {
        PumpControl::Pressure {
            p_flow_bar,
            p_lift_bar,
        } => {
            assert_almost_eq!(p_lift_bar, 1.5);
            assert_almost_eq!(p_flow_bar, 3.5);
        }
        _ => unreachable!(),
    }
    for pipe in &net.pipes {
        assert_almost_eq!(pipe.mdot_kg_per_s, 0.0, 1e-5);
    }
    assert_almost_eq!(net.consumers[0].mdot_kg_per_s, 0.0, 1e-9);
}

// S4 — red fría con regulador de temperatura mínima -----------------------

#[test]
fn s4_minimum_supply_temperature() {
    init();

    // impulsión a 45 °C y 1 km de tubería: el consumidor ve menos de 40 °C
    let mut net = Network::new();
    let j_ret_pump = net.add_junction((0.0, -2.0), 5.0, 303.15);
    let j_flow_pump = net.add_junction((0.0, 0.0), 5.0, 318.15);
    let j_sup = net.add_junction((1000.0, 0.0), 5.0, 318.15);
    let j_ret = net.add_junction((1000.0, -2.0), 5.0, 303.15);
    net.add_pipe(j_flow_pump, j_sup, 0.1, 1.0, 0.1, 1.0, 5, T_EXT).unwrap();
    net.add_pipe(j_ret, j_ret_pump, 0.1, 1.0, 0.1, 1.0, 5, T_EXT).unwrap();
    net.add_heat_consumer(j_ret, j_sup, 20_000.0, 303.15, 0.0).unwrap();
    net.add_circ_pump_pressure(j_ret_pump, j_flow_pump, 5.0, 2.0, 318.15).unwrap();
    net.attach_controller(Controller::MinimumSupplyTemperature(
        MinimumSupplyTemperature::new(0, 40.0),
    ));
    net.attach_controller(Controller::BadPointPressureLift(BadPointPressureLift::new(0)));

    let stats = run_time_step(&mut net, 0).unwrap();

    let t_supply_c = net.consumers[0].t_to_k - 273.15;
    let forced = stats.forced_consumers.contains(&0);
    assert!(
        t_supply_c >= 40.0 - 2.0 || forced,
        "impulsión {:.1} °C sin convergencia forzada",
        t_supply_c
    );
    // la consigna de retorno ha subido respecto a la original de 30 °C
    assert!(net.consumers[0].treturn_k > 303.15);
}

// S5 — bajada de diámetro rechazada ---------------------------------------

#[test]
fn s5_downsize_refused() {
    init();

    // DN100 con v ≈ 0.9 m/s; el escalón inferior DN80 superaría 1 m/s
    let mut net = Network::new();
    let j_ret_pump = net.add_junction((0.0, -2.0), 5.0, 333.15);
    let j_flow_pump = net.add_junction((0.0, 0.0), 5.0, 363.15);
    let j_sup = net.add_junction((100.0, 0.0), 5.0, 363.15);
    let j_ret = net.add_junction((100.0, -2.0), 5.0, 333.15);
    net.add_pipe_std_type(j_flow_pump, j_sup, "KMR 100/200-2v", &DEFAULT_CATALOGUE, 0.1, 0.1, 5, T_EXT)
        .unwrap();
    net.add_pipe_std_type(j_ret, j_ret_pump, "KMR 100/200-2v", &DEFAULT_CATALOGUE, 0.1, 0.1, 5, T_EXT)
        .unwrap();
    // qext que produce unos 8 kg/s (v ≈ 0.9 m/s en DN100)
    net.add_heat_consumer(j_ret, j_sup, 1_000_000.0, 333.15, 0.0).unwrap();
    net.add_circ_pump_pressure(j_ret_pump, j_flow_pump, 5.0, 2.0, 363.15).unwrap();
    net.attach_controller(Controller::BadPointPressureLift(BadPointPressureLift::new(0)));

    run_control(&mut net).unwrap();
    let v_before = net.pipes[0].v_mean_m_per_s.abs();
    assert!(v_before > 0.8 && v_before <= 1.0, "v = {}", v_before);

    optimize_diameter_types(&mut net, &DEFAULT_CATALOGUE, 1.0, "KMR", 0.1).unwrap();

    for pipe in &net.pipes {
        assert_eq!(pipe.std_type.as_deref(), Some("KMR 100/200-2v"));
        assert!(pipe.optimized);
        assert!(pipe.v_mean_m_per_s.abs() <= 1.0 + 1e-6);
    }
}

// Serie temporal ------------------------------------------------------------

#[test]
fn time_series_logs_all_steps() {
    init();

    let mut net = s1_net(50_000.0);
    net.controllers.clear();

    let hours = 48;
    let mut qext = vec![50_000.0; 8760];
    // demanda variable en el rango simulado
    for (i, q) in qext.iter_mut().enumerate().take(hours) {
        *q = 30_000.0 + 1000.0 * (i % 10) as f64;
    }
    let profiles = TimeSeriesProfiles {
        qext_w: vec![qext],
        treturn_c: vec![vec![60.0; 8760]],
        min_supply_c: vec![None],
        supply_temperature: SupplyTemperature::Static(90.0),
        secondary_mdot: Vec::new(),
    };
    create_controllers(&mut net, &profiles, None, 8760).unwrap();

    let mut observed = 0usize;
    let mut observer = |_t: usize, _stats: &dhnet::control::StepStats| observed += 1;
    let results =
        thermohydraulic_time_series(&mut net, 0, hours, Some(&mut observer)).unwrap();

    assert_eq!(results.len(), hours);
    assert_eq!(observed, hours - results.failed_steps.len());
    let main = results.pumps.values().next().unwrap();
    assert_eq!(main.mass_flow.len(), hours);
    assert_eq!(main.qext_kw.len(), hours);
    // el aporte de la bomba cubre demanda y pérdidas en cada paso convergido
    for (t, q) in main.qext_kw.iter().enumerate() {
        if !results.failed_steps.contains(&(t + results.start)) {
            let demand_kw = profiles.qext_w[0][t] / 1000.0;
            assert!(
                *q >= demand_kw * 0.99,
                "paso {}: aporte {:.1} kW < demanda {:.1} kW",
                t,
                q,
                demand_kw
            );
        }
    }
    // las temperaturas del productor van en °C en la tabla de resultados
    assert_almost_eq!(main.flow_temp[0], 90.0, 0.1);
}

#[test]
fn simplified_mode_scales_design_point() {
    init();

    // punto de diseño resuelto con 50 kW
    let mut net = s1_net(50_000.0);
    run_control(&mut net).unwrap();
    let design_qext = net.pumps[0].qext_kw();

    let mut qext = vec![50_000.0; 8760];
    qext[0] = 25_000.0;
    qext[1] = 50_000.0;
    let profiles = TimeSeriesProfiles {
        qext_w: vec![qext],
        treturn_c: vec![vec![60.0; 8760]],
        min_supply_c: vec![None],
        supply_temperature: SupplyTemperature::Static(90.0),
        secondary_mdot: Vec::new(),
    };
    let results =
        dhnet::timeseries::simplified_time_series(&net, &profiles, None, 0, 2).unwrap();
    let main = results.pumps.values().next().unwrap();

    // pérdidas absolutas constantes: generación = demanda + pérdidas de diseño
    let losses = design_qext - 50.0;
    assert_almost_eq!(main.qext_kw[0], 25.0 + losses, 1e-6);
    assert_almost_eq!(main.qext_kw[1], 50.0 + losses, 1e-6);
    // presiones y temperaturas congeladas en el punto de diseño
    assert_almost_eq!(main.flow_pressure[0], main.flow_pressure[1], 1e-12);
    assert_almost_eq!(main.return_temp[0], main.return_temp[1], 1e-12);
    // el caudal sigue a la generación
    assert!(main.mass_flow[0] < main.mass_flow[1]);
}

#[test]
fn sliding_supply_temperature_drives_pump() {
    init();

    let mut net = s1_net(50_000.0);
    net.controllers.clear();

    let air: Vec<f64> = (0..8760).map(|i| if i < 24 { -15.0 } else { 20.0 }).collect();
    let profiles = TimeSeriesProfiles {
        qext_w: vec![vec![50_000.0; 8760]],
        treturn_c: vec![vec![60.0; 8760]],
        min_supply_c: vec![None],
        supply_temperature: SupplyTemperature::Sliding {
            max_supply_c: 90.0,
            min_supply_c: 70.0,
            min_air_c: -12.0,
            max_air_c: 15.0,
        },
        secondary_mdot: Vec::new(),
    };
    create_controllers(&mut net, &profiles, Some(&air), 8760).unwrap();

    let results = thermohydraulic_time_series(&mut net, 20, 28, None).unwrap();
    let main = results.pumps.values().next().unwrap();
    // con -15 °C exteriores la impulsión es la máxima; con 20 °C la mínima
    assert_almost_eq!(main.flow_temp[0], 90.0, 0.1);
    assert_almost_eq!(main.flow_temp[7], 70.0, 0.1);
}
