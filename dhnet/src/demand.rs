// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Demandas térmicas horarias de los edificios (JSON)
//!
//! Mapa de id de edificio (cadena numérica) a sus series anuales de demanda
//! y temperaturas. Las claves no numéricas del archivo se ignoran (metadatos
//! del generador de perfiles); los campos desconocidos dentro de cada
//! edificio se rechazan.

use std::fs::File;
use std::io::{prelude::*, BufReader};
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Series anuales de demanda de un edificio
///
/// Las energías son horarias en kWh (equivalen a kW de potencia media) y las
/// temperaturas en °C
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildingDemand {
    /// Marcas de tiempo ISO de los 8760 pasos
    pub zeitschritte: Vec<String>,
    /// Demanda total, kWh
    #[serde(rename = "wärme")]
    pub waerme: Vec<f64>,
    /// Calefacción, kWh
    #[serde(rename = "heizwärme")]
    pub heizwaerme: Vec<f64>,
    /// Agua caliente sanitaria, kWh
    #[serde(rename = "warmwasserwärme")]
    pub warmwasserwaerme: Vec<f64>,
    /// Temperatura de impulsión del edificio, °C
    pub vorlauftemperatur: Vec<f64>,
    /// Temperatura de retorno del edificio, °C
    #[serde(rename = "rücklauftemperatur")]
    pub ruecklauftemperatur: Vec<f64>,
    /// Carga punta, kW
    pub max_last: f64,
    /// Temperatura de impulsión máxima, °C
    #[serde(rename = "VLT_max")]
    pub vlt_max: f64,
    /// Temperatura de retorno máxima, °C
    #[serde(rename = "RLT_max")]
    pub rlt_max: f64,
}

/// Demandas de todos los edificios conectados, por id
#[derive(Debug, Clone, Default)]
pub struct HeatDemand {
    pub buildings: IndexMap<String, BuildingDemand>,
}

impl HeatDemand {
    /// Lee las demandas desde una cadena JSON
    ///
    /// Solo se cargan las claves de edificio (numéricas); el resto del mapa
    /// se ignora
    pub fn from_json(data: &str) -> Result<Self> {
        let raw: IndexMap<String, serde_json::Value> = serde_json::from_str(data)?;
        let mut buildings = IndexMap::new();
        for (key, value) in raw {
            if !key.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            let building: BuildingDemand = serde_json::from_value(value)
                .map_err(|e| Error::InvalidInput(format!("edificio {}: {}", key, e)))?;
            building.validate(&key)?;
            buildings.insert(key, building);
        }
        if buildings.is_empty() {
            return Err(Error::InvalidInput(
                "el archivo de demandas no contiene ningún edificio".to_string(),
            ));
        }
        Ok(HeatDemand { buildings })
    }

    /// Lee las demandas desde un archivo JSON
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut data = String::new();
        BufReader::new(File::open(path.as_ref())?).read_to_string(&mut data)?;
        Self::from_json(&data)
    }

    /// Demanda total por edificio, en W (perfil de `wärme` en kWh horarias)
    pub fn heat_profiles_w(&self) -> Vec<Vec<f64>> {
        self.buildings
            .values()
            .map(|b| b.waerme.iter().map(|kwh| kwh * 1000.0).collect())
            .collect()
    }

    /// Perfiles de temperatura de retorno por edificio, °C
    pub fn return_temperature_profiles_c(&self) -> Vec<Vec<f64>> {
        self.buildings
            .values()
            .map(|b| b.ruecklauftemperatur.clone())
            .collect()
    }

    /// Temperaturas de impulsión máximas por edificio, °C
    pub fn max_supply_temperatures_c(&self) -> Vec<f64> {
        self.buildings.values().map(|b| b.vlt_max).collect()
    }

    /// Temperaturas de retorno máximas por edificio, °C
    pub fn max_return_temperatures_c(&self) -> Vec<f64> {
        self.buildings.values().map(|b| b.rlt_max).collect()
    }
}

impl BuildingDemand {
    fn validate(&self, key: &str) -> Result<()> {
        let n = self.zeitschritte.len();
        if n != 8760 {
            return Err(Error::InvalidInput(format!(
                "edificio {}: {} pasos de tiempo, se esperaban 8760",
                key, n
            )));
        }
        for (name, series) in [
            ("wärme", &self.waerme),
            ("heizwärme", &self.heizwaerme),
            ("warmwasserwärme", &self.warmwasserwaerme),
            ("vorlauftemperatur", &self.vorlauftemperatur),
            ("rücklauftemperatur", &self.ruecklauftemperatur),
        ] {
            if series.len() != n {
                return Err(Error::InvalidInput(format!(
                    "edificio {}: la serie {} tiene {} valores, se esperaban {}",
                    key,
                    name,
                    series.len(),
                    n
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn building_json(hours: usize) -> String {
        let zeros = vec![0.5; hours];
        let series = serde_json::to_string(&zeros).unwrap();
        let stamps: Vec<String> = (0..hours).map(|i| format!("2021-01-01T{:02}:00:00", i % 24)).collect();
        format!(
            r#"{{"zeitschritte": {}, "wärme": {s}, "heizwärme": {s}, "warmwasserwärme": {s},
                "vorlauftemperatur": {s}, "rücklauftemperatur": {s},
                "max_last": 25.0, "VLT_max": 70.0, "RLT_max": 55.0}}"#,
            serde_json::to_string(&stamps).unwrap(),
            s = series
        )
    }

    #[test]
    fn loads_numeric_keys_only() {
        let json = format!(
            r#"{{"0": {b}, "1": {b}, "meta": {{"quelle": "sintético"}}}}"#,
            b = building_json(8760)
        );
        let demand = HeatDemand::from_json(&json).unwrap();
        assert_eq!(demand.buildings.len(), 2);
        let profiles = demand.heat_profiles_w();
        assert!((profiles[0][0] - 500.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_wrong_length() {
        let json = format!(r#"{{"0": {}}}"#, building_json(100));
        assert!(HeatDemand::from_json(&json).is_err());
    }

    #[test]
    fn rejects_unknown_fields() {
        let json = format!(
            r#"{{"0": {}}}"#,
            building_json(8760).replacen("\"max_last\"", "\"unbekannt\": 1.0, \"max_last\"", 1)
        );
        assert!(HeatDemand::from_json(&json).is_err());
    }
}
