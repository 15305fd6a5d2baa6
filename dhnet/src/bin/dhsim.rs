// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

use std::process::exit;

use dhnet::catalogue::DEFAULT_CATALOGUE;
use dhnet::demand::HeatDemand;
use dhnet::geojson::{network_from_path, ImportConfig};
use dhnet::report::write_results_csv_to_path;
use dhnet::sizing::{correct_flow_directions, init_diameter_types, optimize_diameter_types};
use dhnet::timeseries::{
    create_controllers, hot_network_demand, thermohydraulic_time_series, SupplyTemperature,
    TimeSeriesProfiles,
};

const APP_TITLE: &str = r#"DHSim"#;
const APP_ABOUT: &str =
    r#"DHSim - Simulación termohidráulica anual de una red de calefacción urbana."#;

/// Crea aplicación y detecta opciones seleccionadas
fn start_app_and_get_matches() -> clap::ArgMatches {
    use clap::arg;
    clap::Command::new(APP_TITLE)
        .bin_name("dhsim")
        .version(env!("CARGO_PKG_VERSION"))
        .about(APP_ABOUT)
        .next_line_help(true)
        .args(&[
            arg!(<ARCHIVO_RED> "Archivo GeoJSON unificado (v2) de la red").index(1),
            arg!(<ARCHIVO_DEMANDAS> "Archivo JSON de demandas de los edificios").index(2),
            arg!(archivo_salida: -o --output [ARCHIVO_SALIDA] "Archivo CSV de resultados"),
            arg!(archivo_try: -t --try_file [ARCHIVO_TRY] "Archivo TRY para la ley de impulsión deslizante"),
            arg!(inicio: -i --inicio [HORA] "Primera hora simulada (0-8759)"),
            arg!(fin: -f --fin [HORA] "Hora final del rango (exclusiva, 1-8760)"),
            arg!(v: -v ... "Nivel de detalle de los mensajes"),
        ])
        .get_matches()
}

fn main() {
    env_logger::init();

    let matches = start_app_and_get_matches();
    let verbosity = matches.get_count("v");

    let net_path = matches.get_one::<String>("ARCHIVO_RED").unwrap();
    let demand_path = matches.get_one::<String>("ARCHIVO_DEMANDAS").unwrap();
    let start: usize = matches
        .get_one::<String>("inicio")
        .map(|s| s.parse().unwrap_or(0))
        .unwrap_or(0);
    let end: usize = matches
        .get_one::<String>("fin")
        .map(|s| s.parse().unwrap_or(8760))
        .unwrap_or(8760);

    // Red y demandas -----------------------------------------------------------------------------
    let mut net = network_from_path(net_path, &DEFAULT_CATALOGUE, &ImportConfig::default())
        .unwrap_or_else(|e| {
            eprintln!("ERROR: no se ha podido cargar la red \"{}\": {}", net_path, e);
            exit(exitcode::DATAERR);
        });
    for warning in net.check() {
        eprintln!("AVISO: {}", warning.msg);
    }

    let demand = HeatDemand::from_path(demand_path).unwrap_or_else(|e| {
        eprintln!(
            "ERROR: no se han podido cargar las demandas \"{}\": {}",
            demand_path, e
        );
        exit(exitcode::DATAERR);
    });
    if demand.buildings.len() != net.consumers.len() {
        eprintln!(
            "ERROR: {} edificios en las demandas frente a {} consumidores en la red",
            demand.buildings.len(),
            net.consumers.len()
        );
        exit(exitcode::DATAERR);
    }

    let preprocessed = hot_network_demand(&demand.heat_profiles_w());

    // Ley de impulsión: deslizante si hay archivo TRY, estática en su defecto
    let (supply_temperature, air_temperature) = match matches.get_one::<String>("archivo_try") {
        Some(path) => {
            let try_data = climate::try_from_path(path).unwrap_or_else(|e| {
                eprintln!("ERROR: no se ha podido leer el archivo TRY \"{}\": {}", path, e);
                exit(exitcode::DATAERR);
            });
            (
                SupplyTemperature::Sliding {
                    max_supply_c: 85.0,
                    min_supply_c: 70.0,
                    min_air_c: -12.0,
                    max_air_c: 15.0,
                },
                Some(try_data.temperature),
            )
        }
        None => (SupplyTemperature::Static(85.0), None),
    };

    let profiles = TimeSeriesProfiles {
        qext_w: preprocessed.heat_w.clone(),
        treturn_c: demand.return_temperature_profiles_c(),
        min_supply_c: vec![None; net.consumers.len()],
        supply_temperature,
        secondary_mdot: Vec::new(),
    };

    // Dimensionado -------------------------------------------------------------------------------
    create_controllers(&mut net, &profiles, air_temperature.as_deref(), 8760).unwrap_or_else(|e| {
        eprintln!("ERROR: {}", e);
        exit(exitcode::DATAERR);
    });
    // el dimensionado se hace en la hora de mayor demanda
    let design_hour = preprocessed
        .total_heat_kw
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    dhnet::control::run_time_step(&mut net, design_hour).unwrap_or_else(|e| {
        eprintln!("ERROR: cálculo inicial fallido: {}", e);
        exit(exitcode::SOFTWARE);
    });
    correct_flow_directions(&mut net).unwrap();
    init_diameter_types(&mut net, &DEFAULT_CATALOGUE, 1.0, "KMR", 0.1).unwrap_or_else(|e| {
        eprintln!("ERROR: dimensionado inicial fallido: {}", e);
        exit(exitcode::SOFTWARE);
    });
    optimize_diameter_types(&mut net, &DEFAULT_CATALOGUE, 1.0, "KMR", 0.1).unwrap_or_else(|e| {
        eprintln!("ERROR: optimización de diámetros fallida: {}", e);
        exit(exitcode::SOFTWARE);
    });
    if verbosity > 0 {
        for pipe in &net.pipes {
            println!(
                "Tubería {}: {} (v = {:.3} m/s)",
                pipe.id,
                pipe.std_type.as_deref().unwrap_or("-"),
                pipe.v_mean_m_per_s
            );
        }
    }

    // Serie temporal -----------------------------------------------------------------------------
    let results = thermohydraulic_time_series(&mut net, start, end, None).unwrap_or_else(|e| {
        eprintln!("ERROR: simulación fallida: {}", e);
        exit(exitcode::SOFTWARE);
    });
    if !results.failed_steps.is_empty() {
        eprintln!(
            "AVISO: {} pasos sin converger: {:?}",
            results.failed_steps.len(),
            results.failed_steps
        );
    }

    // Salida de resultados -----------------------------------------------------------------------
    if let Some(path) = matches.get_one::<String>("archivo_salida") {
        let heat_kw: Vec<f64> = preprocessed.total_heat_kw[start..end].to_vec();
        let elec_kw: Vec<f64> = preprocessed.total_electricity_kw[start..end].to_vec();
        let timestamps: Vec<String> = demand
            .buildings
            .values()
            .next()
            .map(|b| b.zeitschritte.clone())
            .unwrap_or_default();
        write_results_csv_to_path(path, &results, &heat_kw, &heat_kw, &elec_kw, Some(&timestamps))
            .unwrap_or_else(|e| {
                eprintln!("ERROR: no se ha podido escribir \"{}\": {}", path, e);
                exit(exitcode::CANTCREAT);
            });
        if verbosity > 0 {
            println!("Resultados escritos en {}", path);
        }
    }
}
