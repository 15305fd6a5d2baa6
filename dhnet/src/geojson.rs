// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Redes en formato GeoJSON unificado (v2)
//!
//! Una `FeatureCollection` única con un campo `metadata` de nivel superior
//! (`{version: "2.0"}` y CRS, por defecto EPSG:25833). Cada `Feature` lleva
//! una propiedad `feature_type`:
//!
//! - `flow` / `return`: `LineString` de tubería con
//!   `{segment_id, diameter_mm, std_type, length_m}`
//! - `building_connection`: `LineString` entre la red de impulsión y la de
//!   retorno con `{connection_id, heat_demand_W}`
//! - `generator_connection`: análoga, para los productores
//!
//! Los archivos unificados se reconocen por la versión de `metadata`; los
//! archivos antiguos de capa única se cargan tal cual con
//! [`layers_from_geojson`].

use std::fs::File;
use std::io::{prelude::*, BufReader};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::catalogue::PipeCatalogue;
use crate::common::c_to_k;
use crate::error::{Error, Result};
use crate::model::Network;

/// Versión del formato unificado
pub const UNIFIED_VERSION: &str = "2.0";

/// CRS por defecto (ETRS89 / UTM 33N)
pub const DEFAULT_CRS: &str = "EPSG:25833";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Metadata>,
    features: Vec<Feature>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Metadata {
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    crs: Option<Crs>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Crs {
    #[serde(rename = "type")]
    kind: String,
    properties: CrsProps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CrsProps {
    name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: String,
    geometry: Geometry,
    properties: FeatureProps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FeatureProps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    feature_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    segment_id: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    diameter_mm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    std_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    length_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    connection_id: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "heat_demand_W")]
    heat_demand_w: Option<f64>,
}

/// Parámetros de construcción de la red desde GeoJSON
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Presión nominal de los nudos, bar
    pub p_nom_bar: f64,
    /// Temperatura de referencia del fluido, K
    pub t_ref_k: f64,
    /// Rugosidad de las tuberías, mm
    pub k_mm: f64,
    /// Transmitancia por defecto si no hay tipo normalizado, W/(m²·K)
    pub u_w_per_m2k: f64,
    /// Secciones de discretización térmica por tubería
    pub sections: usize,
    /// Temperatura del terreno alrededor de las tuberías, K
    pub t_ext_k: f64,
    /// Consigna inicial de retorno de los consumidores, K
    pub treturn_k: f64,
    /// Consigna de impulsión de los productores, K
    pub t_flow_k: f64,
    /// Presión de impulsión y salto inicial de la bomba principal, bar
    pub p_flow_bar: f64,
    pub p_lift_bar: f64,
    /// Índice del productor que actúa como principal
    pub main_producer_index: usize,
    /// Porcentaje de carga de los productores secundarios, %
    pub secondary_load_percentage: f64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            p_nom_bar: 5.0,
            t_ref_k: c_to_k(60.0),
            k_mm: 0.1,
            u_w_per_m2k: 1.0,
            sections: 5,
            t_ext_k: c_to_k(10.0),
            treturn_k: c_to_k(60.0),
            t_flow_k: c_to_k(85.0),
            p_flow_bar: 4.0,
            p_lift_bar: 1.5,
            main_producer_index: 0,
            secondary_load_percentage: 0.0,
        }
    }
}

/// Geometría de una capa ya separada por tipo
#[derive(Debug, Clone, Default)]
struct Layers {
    flow: Vec<(Vec<[f64; 2]>, FeatureProps)>,
    return_: Vec<(Vec<[f64; 2]>, FeatureProps)>,
    building: Vec<(Vec<[f64; 2]>, FeatureProps)>,
    generator: Vec<(Vec<[f64; 2]>, FeatureProps)>,
}

/// Carga una red desde un archivo GeoJSON unificado (v2)
pub fn network_from_path<P: AsRef<Path>>(
    path: P,
    catalogue: &PipeCatalogue,
    config: &ImportConfig,
) -> Result<Network> {
    let mut data = String::new();
    BufReader::new(File::open(path.as_ref())?).read_to_string(&mut data)?;
    network_from_unified_geojson(&data, catalogue, config)
}

/// Carga una red desde el contenido de un GeoJSON unificado (v2)
///
/// El archivo se reconoce por `metadata.version == "2.0"` y se divide en las
/// cuatro capas por la propiedad `feature_type`
pub fn network_from_unified_geojson(
    data: &str,
    catalogue: &PipeCatalogue,
    config: &ImportConfig,
) -> Result<Network> {
    let collection: FeatureCollection = serde_json::from_str(data)?;
    match &collection.metadata {
        Some(meta) if meta.version == UNIFIED_VERSION => {}
        Some(meta) => {
            return Err(Error::InvalidInput(format!(
                "versión de GeoJSON no reconocida: {}",
                meta.version
            )))
        }
        None => {
            return Err(Error::InvalidInput(
                "GeoJSON sin metadatos: no es un archivo unificado v2".to_string(),
            ))
        }
    }

    let mut layers = Layers::default();
    for feature in collection.features {
        let target = match feature.properties.feature_type.as_deref() {
            Some("flow") => &mut layers.flow,
            Some("return") => &mut layers.return_,
            Some("building_connection") => &mut layers.building,
            Some("generator_connection") => &mut layers.generator,
            other => {
                return Err(Error::InvalidInput(format!(
                    "feature_type no reconocido: {:?}",
                    other
                )))
            }
        };
        target.push((feature.geometry.coordinates, feature.properties));
    }
    build_network(&layers, catalogue, config)
}

/// Carga una red desde las cuatro capas GeoJSON antiguas de propósito único
pub fn layers_from_geojson(
    flow: &str,
    return_: &str,
    building: &str,
    generator: &str,
    catalogue: &PipeCatalogue,
    config: &ImportConfig,
) -> Result<Network> {
    let parse_layer = |data: &str| -> Result<Vec<(Vec<[f64; 2]>, FeatureProps)>> {
        let collection: FeatureCollection = serde_json::from_str(data)?;
        Ok(collection
            .features
            .into_iter()
            .map(|f| (f.geometry.coordinates, f.properties))
            .collect())
    };
    let layers = Layers {
        flow: parse_layer(flow)?,
        return_: parse_layer(return_)?,
        building: parse_layer(building)?,
        generator: parse_layer(generator)?,
    };
    build_network(&layers, catalogue, config)
}

fn polyline_length_m(coords: &[[f64; 2]]) -> f64 {
    coords
        .windows(2)
        .map(|w| ((w[1][0] - w[0][0]).powi(2) + (w[1][1] - w[0][1]).powi(2)).sqrt())
        .sum()
}

fn endpoints(coords: &[[f64; 2]]) -> Result<((f64, f64), (f64, f64))> {
    if coords.len() < 2 {
        return Err(Error::InvalidInput(
            "LineString con menos de dos coordenadas".to_string(),
        ));
    }
    let first = coords[0];
    let last = coords[coords.len() - 1];
    Ok(((first[0], first[1]), (last[0], last[1])))
}

/// Construye la red a partir de las capas separadas
///
/// Las coordenadas idénticas colapsan en el mismo nudo, de modo que las
/// líneas que comparten extremo quedan conectadas
fn build_network(
    layers: &Layers,
    catalogue: &PipeCatalogue,
    config: &ImportConfig,
) -> Result<Network> {
    let mut net = Network::new();
    let mut supply_junctions = Vec::new();

    for (kind, lines) in [("flow", &layers.flow), ("return", &layers.return_)] {
        for (coords, props) in lines {
            let (start, end) = endpoints(coords)?;
            let from = net.add_junction(start, config.p_nom_bar, config.t_ref_k);
            let to = net.add_junction(end, config.p_nom_bar, config.t_ref_k);
            let length_km = props.length_m.unwrap_or_else(|| polyline_length_m(coords)) / 1000.0;
            match (&props.std_type, props.diameter_mm) {
                (Some(std_type), _) => net.add_pipe_std_type(
                    from,
                    to,
                    std_type,
                    catalogue,
                    length_km,
                    config.k_mm,
                    config.sections,
                    config.t_ext_k,
                )?,
                (None, Some(d_mm)) => net.add_pipe(
                    from,
                    to,
                    d_mm / 1000.0,
                    length_km,
                    config.k_mm,
                    config.u_w_per_m2k,
                    config.sections,
                    config.t_ext_k,
                )?,
                (None, None) => {
                    return Err(Error::InvalidInput(format!(
                        "tubería {:?} sin tipo normalizado ni diámetro",
                        props.segment_id
                    )))
                }
            };
            if kind == "flow" {
                supply_junctions.push(from);
                supply_junctions.push(to);
            }
        }
    }

    // las conexiones de edificio van de la red de impulsión a la de retorno;
    // se orienta cada una comprobando qué extremo cae en la capa de impulsión
    for (coords, props) in &layers.building {
        let (start, end) = endpoints(coords)?;
        let a = net.add_junction(start, config.p_nom_bar, config.t_ref_k);
        let b = net.add_junction(end, config.p_nom_bar, config.t_ref_k);
        let (supply, ret) = if supply_junctions.contains(&a) {
            (a, b)
        } else {
            (b, a)
        };
        net.add_heat_consumer(
            ret,
            supply,
            props.heat_demand_w.unwrap_or(0.0),
            config.treturn_k,
            0.0,
        )?;
    }

    for (i, (coords, _props)) in layers.generator.iter().enumerate() {
        let (start, end) = endpoints(coords)?;
        let a = net.add_junction(start, config.p_nom_bar, config.t_ref_k);
        let b = net.add_junction(end, config.p_nom_bar, config.t_ref_k);
        let (flow, ret) = if supply_junctions.contains(&a) {
            (a, b)
        } else {
            (b, a)
        };
        if i == config.main_producer_index {
            net.add_circ_pump_pressure(ret, flow, config.p_flow_bar, config.p_lift_bar, config.t_flow_k)?;
        } else {
            net.add_circ_pump_mass(ret, flow, 0.0, config.t_flow_k, config.secondary_load_percentage)?;
        }
    }

    if layers.generator.is_empty() {
        return Err(Error::Topology(
            "el GeoJSON no define ninguna conexión de generador".to_string(),
        ));
    }

    info!(
        "red cargada: {} nudos, {} tuberías, {} consumidores, {} productores",
        net.junctions.len(),
        net.pipes.len(),
        net.consumers.len(),
        net.pumps.len()
    );
    Ok(net)
}

/// Clasifica los nudos en lado de impulsión / retorno por alcanzabilidad
/// desde las bombas a través de tuberías
fn supply_side_junctions(net: &Network) -> Vec<bool> {
    let mut supply = vec![false; net.junctions.len()];
    let mut queue: Vec<usize> = net.pumps.iter().map(|p| p.flow_junction).collect();
    for &j in &queue {
        supply[j] = true;
    }
    while let Some(j) = queue.pop() {
        for pipe in &net.pipes {
            for (a, b) in [
                (pipe.from_junction, pipe.to_junction),
                (pipe.to_junction, pipe.from_junction),
            ] {
                if a == j && !supply[b] {
                    supply[b] = true;
                    queue.push(b);
                }
            }
        }
    }
    supply
}

/// Exporta la red al formato GeoJSON unificado (v2)
pub fn network_to_unified_geojson(net: &Network) -> Result<String> {
    let supply = supply_side_junctions(net);
    let mut features = Vec::new();

    for pipe in &net.pipes {
        let feature_type = if supply[pipe.from_junction] || supply[pipe.to_junction] {
            "flow"
        } else {
            "return"
        };
        features.push(Feature {
            kind: "Feature".to_string(),
            geometry: Geometry {
                kind: "LineString".to_string(),
                coordinates: vec![
                    [net.junctions[pipe.from_junction].coord.0, net.junctions[pipe.from_junction].coord.1],
                    [net.junctions[pipe.to_junction].coord.0, net.junctions[pipe.to_junction].coord.1],
                ],
            },
            properties: FeatureProps {
                feature_type: Some(feature_type.to_string()),
                segment_id: Some(pipe.id),
                diameter_mm: Some(pipe.diameter_m * 1000.0),
                std_type: pipe.std_type.clone(),
                length_m: Some(pipe.length_km * 1000.0),
                ..Default::default()
            },
        });
    }
    for c in &net.consumers {
        features.push(Feature {
            kind: "Feature".to_string(),
            geometry: Geometry {
                kind: "LineString".to_string(),
                coordinates: vec![
                    [net.junctions[c.to_junction].coord.0, net.junctions[c.to_junction].coord.1],
                    [net.junctions[c.from_junction].coord.0, net.junctions[c.from_junction].coord.1],
                ],
            },
            properties: FeatureProps {
                feature_type: Some("building_connection".to_string()),
                connection_id: Some(c.id),
                heat_demand_w: Some(c.qext_w),
                ..Default::default()
            },
        });
    }
    for p in &net.pumps {
        features.push(Feature {
            kind: "Feature".to_string(),
            geometry: Geometry {
                kind: "LineString".to_string(),
                coordinates: vec![
                    [net.junctions[p.flow_junction].coord.0, net.junctions[p.flow_junction].coord.1],
                    [net.junctions[p.return_junction].coord.0, net.junctions[p.return_junction].coord.1],
                ],
            },
            properties: FeatureProps {
                feature_type: Some("generator_connection".to_string()),
                connection_id: Some(p.id),
                ..Default::default()
            },
        });
    }

    let collection = FeatureCollection {
        kind: "FeatureCollection".to_string(),
        metadata: Some(Metadata {
            version: UNIFIED_VERSION.to_string(),
            crs: Some(Crs {
                kind: "name".to_string(),
                properties: CrsProps {
                    name: DEFAULT_CRS.to_string(),
                },
            }),
        }),
        features,
    };
    Ok(serde_json::to_string_pretty(&collection)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::DEFAULT_CATALOGUE;

    /// Red unificada mínima: una tubería de ida, una de vuelta, un consumidor
    /// y un generador
    fn unified_json() -> String {
        r#"{
          "type": "FeatureCollection",
          "metadata": {"version": "2.0", "crs": {"type": "name", "properties": {"name": "EPSG:25833"}}},
          "features": [
            {"type": "Feature",
             "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [100.0, 0.0]]},
             "properties": {"feature_type": "flow", "segment_id": 0, "std_type": "KMR 100/200-2v", "length_m": 100.0}},
            {"type": "Feature",
             "geometry": {"type": "LineString", "coordinates": [[100.0, -2.0], [0.0, -2.0]]},
             "properties": {"feature_type": "return", "segment_id": 1, "std_type": "KMR 100/200-2v", "length_m": 100.0}},
            {"type": "Feature",
             "geometry": {"type": "LineString", "coordinates": [[100.0, 0.0], [100.0, -2.0]]},
             "properties": {"feature_type": "building_connection", "connection_id": 0, "heat_demand_W": 50000.0}},
            {"type": "Feature",
             "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [0.0, -2.0]]},
             "properties": {"feature_type": "generator_connection", "connection_id": 0}}
          ]
        }"#
        .to_string()
    }

    #[test]
    fn load_unified_network() {
        let net = network_from_unified_geojson(
            &unified_json(),
            &DEFAULT_CATALOGUE,
            &ImportConfig::default(),
        )
        .unwrap();
        assert_eq!(net.junctions.len(), 4);
        assert_eq!(net.pipes.len(), 2);
        assert_eq!(net.consumers.len(), 1);
        assert_eq!(net.pumps.len(), 1);
        // el consumidor queda orientado con `to` en la capa de impulsión
        let c = &net.consumers[0];
        assert_eq!(net.junctions[c.to_junction].coord, (100.0, 0.0));
        assert!((c.qext_w - 50_000.0).abs() < 1e-9);
        // el generador es la bomba principal
        assert!(net.pumps[0].is_pressure_controlled());
    }

    #[test]
    fn reject_legacy_as_unified() {
        let legacy = r#"{"type": "FeatureCollection", "features": []}"#;
        assert!(matches!(
            network_from_unified_geojson(legacy, &DEFAULT_CATALOGUE, &ImportConfig::default()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn export_import_roundtrip() {
        let net = network_from_unified_geojson(
            &unified_json(),
            &DEFAULT_CATALOGUE,
            &ImportConfig::default(),
        )
        .unwrap();
        let exported = network_to_unified_geojson(&net).unwrap();
        let net2 = network_from_unified_geojson(
            &exported,
            &DEFAULT_CATALOGUE,
            &ImportConfig::default(),
        )
        .unwrap();
        assert_eq!(net.junctions.len(), net2.junctions.len());
        assert_eq!(net.pipes.len(), net2.pipes.len());
        assert_eq!(net.consumers.len(), net2.consumers.len());
        assert_eq!(net.pumps.len(), net2.pumps.len());
    }
}
