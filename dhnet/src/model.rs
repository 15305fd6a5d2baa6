// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Modelo de la red de calor
//!
//! Contenedor tipado de nudos, tuberías, consumidores (subestaciones) y bombas
//! de circulación, sin física. Los elementos se referencian entre sí por id
//! entero; la red es propietaria exclusiva de todos ellos y de los
//! controladores asociados.
//!
//! Convención de sentidos: en consumidores y bombas `from` es el lado de
//! retorno y `to` el lado de impulsión. En las tuberías el par `from`/`to`
//! define el sentido positivo del caudal.
//!
//! Las temperaturas se almacenan siempre en Kelvin; los °C solo aparecen en
//! las fronteras CSV/JSON.

use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::catalogue::PipeCatalogue;
use crate::common::{Warning, WarningLevel};
use crate::control::Controller;
use crate::error::{Error, Result};
use crate::fluid::Water;

/// Nudo de la red
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Junction {
    /// Id del nudo
    pub id: usize,
    /// Coordenadas (x, y) en un CRS plano, m
    pub coord: (f64, f64),
    /// Presión nominal, bar
    pub p_nom_bar: f64,
    /// Temperatura de referencia del fluido, K
    pub t_ref_k: f64,
    /// Resultado: presión, bar
    #[serde(skip)]
    pub p_bar: f64,
    /// Resultado: temperatura, K
    #[serde(skip)]
    pub t_k: f64,
}

/// Tubería (de impulsión o de retorno)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipe {
    /// Id de la tubería
    pub id: usize,
    /// Nudo aguas arriba (sentido positivo del caudal)
    pub from_junction: usize,
    /// Nudo aguas abajo
    pub to_junction: usize,
    /// Tipo normalizado, si procede del catálogo
    pub std_type: Option<String>,
    /// Diámetro interior, m
    pub diameter_m: f64,
    /// Longitud, km
    pub length_km: f64,
    /// Rugosidad absoluta k, mm
    pub k_mm: f64,
    /// Transmitancia térmica, W/(m²·K)
    pub u_w_per_m2k: f64,
    /// Temperatura exterior al tubo, K
    pub t_ext_k: f64,
    /// Número de secciones de discretización del cálculo térmico
    pub sections: usize,
    /// Marca de dimensionado terminado (escalera de diámetros)
    #[serde(default)]
    pub optimized: bool,
    /// Resultado: velocidad media (con signo), m/s
    #[serde(skip)]
    pub v_mean_m_per_s: f64,
    /// Resultado: caudal volumétrico, m³/s
    #[serde(skip)]
    pub vdot_m3_per_s: f64,
    /// Resultado: caudal másico (con signo), kg/s
    #[serde(skip)]
    pub mdot_kg_per_s: f64,
    /// Resultado: presiones en los extremos, bar
    #[serde(skip)]
    pub p_from_bar: f64,
    #[serde(skip)]
    pub p_to_bar: f64,
    /// Resultado: temperaturas en los extremos, K
    #[serde(skip)]
    pub t_from_k: f64,
    #[serde(skip)]
    pub t_to_k: f64,
    /// Resultado: pérdida térmica, W
    #[serde(skip)]
    pub q_loss_w: f64,
}

/// Subestación de consumo (HAST)
///
/// Puentea la red de impulsión y la de retorno extrayendo la potencia `qext_w`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatConsumer {
    /// Id del consumidor
    pub id: usize,
    /// Nudo del lado de retorno
    pub from_junction: usize,
    /// Nudo del lado de impulsión
    pub to_junction: usize,
    /// Demanda térmica actual, W (la fija el driver de serie temporal)
    pub qext_w: f64,
    /// Consigna de temperatura de retorno, K
    pub treturn_k: f64,
    /// Temperatura mínima de impulsión exigida, °C (None si no aplica)
    pub min_supply_temperature_c: Option<f64>,
    /// Coeficiente de pérdida de carga singular de la subestación
    pub loss_coefficient: f64,
    /// Resultado: temperatura en el lado de retorno, K
    #[serde(skip)]
    pub t_from_k: f64,
    /// Resultado: temperatura observada en el lado de impulsión, K
    #[serde(skip)]
    pub t_to_k: f64,
    /// Resultado: presiones en ambos lados, bar
    #[serde(skip)]
    pub p_from_bar: f64,
    #[serde(skip)]
    pub p_to_bar: f64,
    /// Resultado: caudal volumétrico, m³/s
    #[serde(skip)]
    pub vdot_m3_per_s: f64,
    /// Resultado: caudal másico, kg/s
    #[serde(skip)]
    pub mdot_kg_per_s: f64,
}

impl HeatConsumer {
    /// Presión diferencial impulsión - retorno, bar
    pub fn dp_bar(&self) -> f64 {
        self.p_to_bar - self.p_from_bar
    }
}

/// Modo de control de una bomba de circulación
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PumpControl {
    /// Control por presión: fija la presión de impulsión y la altura de la bomba
    Pressure {
        /// Presión en el nudo de impulsión, bar
        p_flow_bar: f64,
        /// Salto de presión de la bomba, bar
        p_lift_bar: f64,
    },
    /// Control por caudal másico (productores secundarios)
    MassFlow {
        /// Caudal másico consignado, kg/s
        mdot_kg_per_s: f64,
    },
}

/// Bomba de circulación con aporte de calor (productor)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CirculationPump {
    /// Id de la bomba
    pub id: usize,
    /// Nudo del lado de retorno (aspiración)
    pub return_junction: usize,
    /// Nudo del lado de impulsión
    pub flow_junction: usize,
    /// Consigna de temperatura de impulsión, K
    pub t_flow_k: f64,
    /// Modo de control
    pub control: PumpControl,
    /// Porcentaje de la carga total asignado (solo productores secundarios), %
    pub load_percentage: f64,
    /// Resultado: caudal másico impulsado, kg/s
    #[serde(skip)]
    pub mdot_kg_per_s: f64,
    /// Resultado: presiones de retorno e impulsión, bar
    #[serde(skip)]
    pub p_from_bar: f64,
    #[serde(skip)]
    pub p_to_bar: f64,
    /// Resultado: temperaturas de retorno e impulsión, K
    #[serde(skip)]
    pub t_from_k: f64,
    #[serde(skip)]
    pub t_to_k: f64,
}

impl CirculationPump {
    /// ¿Es la bomba principal (control por presión)?
    pub fn is_pressure_controlled(&self) -> bool {
        matches!(self.control, PumpControl::Pressure { .. })
    }

    /// Potencia térmica aportada, kW
    pub fn qext_kw(&self) -> f64 {
        self.mdot_kg_per_s * crate::fluid::CP_WATER_KJ * (self.t_to_k - self.t_from_k)
    }
}

/// Red de calefacción urbana
///
/// Ciclo de vida: se crea vacía → se añaden elementos → se corrigen sentidos
/// de flujo → se inicializan y optimizan diámetros → se pasa al driver de
/// serie temporal
#[derive(Debug, Default)]
pub struct Network {
    pub junctions: Vec<Junction>,
    pub pipes: Vec<Pipe>,
    pub consumers: Vec<HeatConsumer>,
    pub pumps: Vec<CirculationPump>,
    /// Fluido caloportador
    pub fluid: Water,
    /// Controladores, en orden estable de adjunción
    pub controllers: Vec<Controller>,
    /// Índice de coordenadas exactas a nudos, para colapsar duplicados
    coord_index: HashMap<(u64, u64), usize>,
}

impl Network {
    pub fn new() -> Self {
        Network::default()
    }

    /// Añade un nudo; coordenadas idénticas colapsan en el mismo nudo
    pub fn add_junction(&mut self, coord: (f64, f64), p_nom_bar: f64, t_ref_k: f64) -> usize {
        let key = (coord.0.to_bits(), coord.1.to_bits());
        if let Some(&id) = self.coord_index.get(&key) {
            return id;
        }
        let id = self.junctions.len();
        self.junctions.push(Junction {
            id,
            coord,
            p_nom_bar,
            t_ref_k,
            p_bar: f64::NAN,
            t_k: t_ref_k,
        });
        self.coord_index.insert(key, id);
        id
    }

    /// Añade una tubería con diámetro explícito
    #[allow(clippy::too_many_arguments)]
    pub fn add_pipe(
        &mut self,
        from: usize,
        to: usize,
        diameter_m: f64,
        length_km: f64,
        k_mm: f64,
        u_w_per_m2k: f64,
        sections: usize,
        t_ext_k: f64,
    ) -> Result<usize> {
        if diameter_m <= 0.0 || length_km <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "tubería con diámetro o longitud no positivos ({} m, {} km)",
                diameter_m, length_km
            )));
        }
        self.check_junction_ref(from)?;
        self.check_junction_ref(to)?;
        let id = self.pipes.len();
        self.pipes.push(Pipe {
            id,
            from_junction: from,
            to_junction: to,
            std_type: None,
            diameter_m,
            length_km,
            k_mm,
            u_w_per_m2k,
            t_ext_k,
            sections: sections.max(1),
            optimized: false,
            v_mean_m_per_s: f64::NAN,
            vdot_m3_per_s: f64::NAN,
            mdot_kg_per_s: f64::NAN,
            p_from_bar: f64::NAN,
            p_to_bar: f64::NAN,
            t_from_k: f64::NAN,
            t_to_k: f64::NAN,
            q_loss_w: f64::NAN,
        });
        Ok(id)
    }

    /// Añade una tubería de un tipo normalizado del catálogo
    ///
    /// El diámetro y la U quedan ligados a la fila del catálogo
    #[allow(clippy::too_many_arguments)]
    pub fn add_pipe_std_type(
        &mut self,
        from: usize,
        to: usize,
        std_type: &str,
        catalogue: &PipeCatalogue,
        length_km: f64,
        k_mm: f64,
        sections: usize,
        t_ext_k: f64,
    ) -> Result<usize> {
        let ptype = catalogue.lookup(std_type)?;
        let (d, u, name) = (ptype.inner_diameter_m, ptype.u_w_per_m2k, ptype.name.clone());
        let id = self.add_pipe(from, to, d, length_km, k_mm, u, sections, t_ext_k)?;
        self.pipes[id].std_type = Some(name);
        Ok(id)
    }

    /// Añade una subestación de consumo entre el nudo de retorno `from` y el
    /// de impulsión `to`
    pub fn add_heat_consumer(
        &mut self,
        from: usize,
        to: usize,
        qext_w: f64,
        treturn_k: f64,
        loss_coefficient: f64,
    ) -> Result<usize> {
        self.check_junction_ref(from)?;
        self.check_junction_ref(to)?;
        let id = self.consumers.len();
        self.consumers.push(HeatConsumer {
            id,
            from_junction: from,
            to_junction: to,
            qext_w,
            treturn_k,
            min_supply_temperature_c: None,
            loss_coefficient,
            t_from_k: f64::NAN,
            t_to_k: f64::NAN,
            p_from_bar: f64::NAN,
            p_to_bar: f64::NAN,
            vdot_m3_per_s: f64::NAN,
            mdot_kg_per_s: f64::NAN,
        });
        Ok(id)
    }

    /// Añade la bomba principal, con control por presión
    pub fn add_circ_pump_pressure(
        &mut self,
        return_junction: usize,
        flow_junction: usize,
        p_flow_bar: f64,
        p_lift_bar: f64,
        t_flow_k: f64,
    ) -> Result<usize> {
        self.check_junction_ref(return_junction)?;
        self.check_junction_ref(flow_junction)?;
        if self.pumps.iter().any(|p| p.is_pressure_controlled()) {
            return Err(Error::Topology(
                "la red ya tiene una bomba principal con control por presión".to_string(),
            ));
        }
        let id = self.pumps.len();
        self.pumps.push(CirculationPump {
            id,
            return_junction,
            flow_junction,
            t_flow_k,
            control: PumpControl::Pressure {
                p_flow_bar,
                p_lift_bar,
            },
            load_percentage: 100.0,
            mdot_kg_per_s: f64::NAN,
            p_from_bar: f64::NAN,
            p_to_bar: f64::NAN,
            t_from_k: f64::NAN,
            t_to_k: f64::NAN,
        });
        Ok(id)
    }

    /// Añade un productor secundario, con control por caudal másico
    pub fn add_circ_pump_mass(
        &mut self,
        return_junction: usize,
        flow_junction: usize,
        mdot_kg_per_s: f64,
        t_flow_k: f64,
        load_percentage: f64,
    ) -> Result<usize> {
        self.check_junction_ref(return_junction)?;
        self.check_junction_ref(flow_junction)?;
        let id = self.pumps.len();
        self.pumps.push(CirculationPump {
            id,
            return_junction,
            flow_junction,
            t_flow_k,
            control: PumpControl::MassFlow { mdot_kg_per_s },
            load_percentage,
            mdot_kg_per_s: f64::NAN,
            p_from_bar: f64::NAN,
            p_to_bar: f64::NAN,
            t_from_k: f64::NAN,
            t_to_k: f64::NAN,
        });
        Ok(id)
    }

    /// Adjunta un controlador a la lista ordenada de la red
    pub fn attach_controller(&mut self, ctrl: Controller) {
        self.controllers.push(ctrl);
    }

    /// Id de la bomba principal (control por presión)
    pub fn main_pump(&self) -> Result<usize> {
        self.pumps
            .iter()
            .position(CirculationPump::is_pressure_controlled)
            .ok_or_else(|| Error::Topology("la red no tiene bomba principal designada".to_string()))
    }

    /// Ids de los productores secundarios (control por caudal)
    pub fn secondary_pumps(&self) -> Vec<usize> {
        self.pumps
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_pressure_controlled())
            .map(|(i, _)| i)
            .collect()
    }

    /// ¿Están todos los consumidores sin demanda?
    pub fn all_consumers_idle(&self) -> bool {
        self.consumers.iter().all(|c| c.qext_w == 0.0)
    }

    fn check_junction_ref(&self, id: usize) -> Result<()> {
        if id >= self.junctions.len() {
            return Err(Error::Topology(format!("referencia a nudo inexistente {}", id)));
        }
        Ok(())
    }

    /// Comprueba la consistencia de la red y devuelve los avisos detectados
    ///
    /// Los nudos aislados se permiten, pero generan un aviso
    pub fn check(&self) -> Vec<Warning> {
        use WarningLevel::{DANGER, WARNING};

        let mut warnings = Vec::new();
        let mut connected = vec![false; self.junctions.len()];
        for pipe in &self.pipes {
            connected[pipe.from_junction] = true;
            connected[pipe.to_junction] = true;
        }
        for c in &self.consumers {
            if !connected[c.from_junction] || !connected[c.to_junction] {
                warnings.push(Warning {
                    level: DANGER,
                    id: Some(c.id),
                    msg: format!(
                        "Consumidor {} conectado a un nudo sin tuberías ({} - {})",
                        c.id, c.from_junction, c.to_junction
                    ),
                });
            }
            connected[c.from_junction] = true;
            connected[c.to_junction] = true;
        }
        for p in &self.pumps {
            connected[p.return_junction] = true;
            connected[p.flow_junction] = true;
        }
        for j in &self.junctions {
            if !connected[j.id] {
                warnings.push(Warning {
                    level: WARNING,
                    id: Some(j.id),
                    msg: format!("Nudo {} aislado, no conectado a ningún elemento", j.id),
                });
            }
        }
        if self.main_pump().is_err() {
            warnings.push(Warning {
                level: DANGER,
                id: None,
                msg: "La red no tiene bomba principal con control por presión".to_string(),
            });
        }
        warnings
    }

    /// Comprobación de diseño: consumidores activos por debajo de la presión
    /// diferencial mínima
    ///
    /// Solo valida resultados ya calculados, no modifica la bomba
    pub fn validate_pressure(&self, target_dp_min_bar: f64) -> Vec<Warning> {
        let mut violations = Vec::new();
        for c in &self.consumers {
            if c.qext_w == 0.0 {
                continue;
            }
            let dp = c.dp_bar();
            if dp < target_dp_min_bar {
                warn!(
                    "Consumidor {} con dp = {:.3} bar por debajo del mínimo {:.2} bar (déficit {:.3} bar)",
                    c.id,
                    dp,
                    target_dp_min_bar,
                    target_dp_min_bar - dp
                );
                violations.push(Warning {
                    level: WarningLevel::WARNING,
                    id: Some(c.id),
                    msg: format!(
                        "Consumidor {} con presión diferencial {:.3} bar < {:.2} bar",
                        c.id, dp, target_dp_min_bar
                    ),
                });
            }
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_coordinates_collapse() {
        let mut net = Network::new();
        let a = net.add_junction((0.0, 0.0), 5.0, 323.15);
        let b = net.add_junction((100.0, 0.0), 5.0, 323.15);
        let c = net.add_junction((0.0, 0.0), 5.0, 323.15);
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(net.junctions.len(), 2);
    }

    #[test]
    fn single_main_pump() {
        let mut net = Network::new();
        let a = net.add_junction((0.0, 0.0), 5.0, 323.15);
        let b = net.add_junction((0.0, 1.0), 5.0, 323.15);
        net.add_circ_pump_pressure(a, b, 5.0, 2.0, 363.15).unwrap();
        assert!(net.add_circ_pump_pressure(a, b, 5.0, 2.0, 363.15).is_err());
        assert_eq!(net.main_pump().unwrap(), 0);
    }

    #[test]
    fn isolated_junction_warns() {
        let mut net = Network::new();
        let a = net.add_junction((0.0, 0.0), 5.0, 323.15);
        let b = net.add_junction((1.0, 0.0), 5.0, 323.15);
        net.add_junction((99.0, 99.0), 5.0, 323.15);
        net.add_pipe(a, b, 0.1, 0.1, 0.1, 1.0, 5, 283.15).unwrap();
        net.add_circ_pump_pressure(b, a, 5.0, 2.0, 363.15).unwrap();
        let warnings = net.check();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].id, Some(2));
    }

    #[test]
    fn invalid_pipe_geometry() {
        let mut net = Network::new();
        let a = net.add_junction((0.0, 0.0), 5.0, 323.15);
        let b = net.add_junction((1.0, 0.0), 5.0, 323.15);
        assert!(net.add_pipe(a, b, -0.1, 0.1, 0.1, 1.0, 5, 283.15).is_err());
        assert!(net.add_pipe(a, 99, 0.1, 0.1, 0.1, 1.0, 5, 283.15).is_err());
    }
}
