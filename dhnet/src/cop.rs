// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Curvas características de bombas de calor (COP)
//!
//! Matriz de COP en CSV separado por `;`: la primera fila son temperaturas de
//! impulsión (°C), la primera columna temperaturas de la fuente (°C) y el
//! interior los valores de COP. Se interpola bilinealmente y se aplican los
//! límites técnicos de la máquina:
//!
//! - salto térmico máximo de 75 K (impulsión ≤ fuente + 75)
//! - temperatura de impulsión mínima de 35 °C

use crate::error::{Error, Result};

/// Salto térmico máximo entre fuente e impulsión, K
pub const MAX_TEMPERATURE_LIFT: f64 = 75.0;

/// Temperatura de impulsión mínima, °C
pub const MIN_SUPPLY_TEMPERATURE: f64 = 35.0;

/// Matriz de COP de una bomba de calor
#[derive(Debug, Clone, PartialEq)]
pub struct CopTable {
    /// Temperaturas de impulsión (cabecera de columnas), °C
    pub supply_temps: Vec<f64>,
    /// Temperaturas de la fuente (cabecera de filas), °C
    pub source_temps: Vec<f64>,
    /// COP\[fila fuente\]\[columna impulsión\]
    pub values: Vec<Vec<f64>>,
}

impl CopTable {
    /// Lee la matriz desde el contenido de un CSV separado por `;`
    pub fn from_csv(data: &str) -> Result<Self> {
        let parse_row = |line: &str| -> Result<Vec<f64>> {
            line.split(';')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(|f| {
                    f.parse::<f64>().map_err(|_| {
                        Error::InvalidInput(format!("valor no numérico \"{}\" en la matriz de COP", f))
                    })
                })
                .collect()
        };

        let mut rows = data.lines().filter(|l| !l.trim().is_empty());
        let header = rows
            .next()
            .ok_or_else(|| Error::InvalidInput("matriz de COP vacía".to_string()))?;
        // la primera celda de la cabecera es un marcador y se descarta
        let supply_temps = parse_row(header.splitn(2, ';').nth(1).unwrap_or(""))?;

        let mut source_temps = Vec::new();
        let mut values = Vec::new();
        for line in rows {
            let row = parse_row(line)?;
            if row.len() != supply_temps.len() + 1 {
                return Err(Error::InvalidInput(format!(
                    "fila de la matriz de COP con {} columnas, se esperaban {}",
                    row.len(),
                    supply_temps.len() + 1
                )));
            }
            source_temps.push(row[0]);
            values.push(row[1..].to_vec());
        }
        if source_temps.is_empty() {
            return Err(Error::InvalidInput("matriz de COP sin filas de datos".to_string()));
        }
        Ok(CopTable {
            supply_temps,
            source_temps,
            values,
        })
    }

    /// COP para una temperatura de fuente y de impulsión (°C)
    ///
    /// Devuelve también la temperatura de impulsión efectiva tras aplicar los
    /// límites técnicos. Fuera del rango de la matriz se devuelve COP = 0
    /// (máquina parada)
    pub fn cop(&self, supply_c: f64, source_c: f64) -> (f64, f64) {
        let supply_c = supply_c
            .min(source_c + MAX_TEMPERATURE_LIFT)
            .max(MIN_SUPPLY_TEMPERATURE);
        let cop = match (
            interp_pos(&self.source_temps, source_c),
            interp_pos(&self.supply_temps, supply_c),
        ) {
            (Some((i, fi)), Some((j, fj))) => {
                let v00 = self.values[i][j];
                let v01 = self.values[i][(j + 1).min(self.supply_temps.len() - 1)];
                let v10 = self.values[(i + 1).min(self.source_temps.len() - 1)][j];
                let v11 = self.values[(i + 1).min(self.source_temps.len() - 1)]
                    [(j + 1).min(self.supply_temps.len() - 1)];
                let v0 = v00 + (v01 - v00) * fj;
                let v1 = v10 + (v11 - v10) * fj;
                v0 + (v1 - v0) * fi
            }
            _ => 0.0,
        };
        (cop, supply_c)
    }
}

/// Posición y fracción de interpolación de x en un eje creciente
///
/// None si x queda fuera del rango del eje
fn interp_pos(axis: &[f64], x: f64) -> Option<(usize, f64)> {
    if axis.is_empty() || x < axis[0] || x > *axis.last().unwrap() {
        return None;
    }
    if axis.len() == 1 {
        return Some((0, 0.0));
    }
    let i = axis
        .windows(2)
        .position(|w| x <= w[1])
        .unwrap_or(axis.len() - 2);
    let frac = (x - axis[i]) / (axis[i + 1] - axis[i]);
    Some((i, frac))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "QT/VLT;35;45;55;65;75;85\n\
                       0;4.2;3.5;3.0;2.5;2.1;1.8\n\
                       10;5.2;4.3;3.6;3.0;2.5;2.1\n\
                       20;6.5;5.3;4.3;3.6;3.0;2.5\n";

    #[test]
    fn bilinear_interpolation() {
        let table = CopTable::from_csv(CSV).unwrap();
        // puntos de la malla
        let (cop, vlt) = table.cop(35.0, 0.0);
        assert!((cop - 4.2).abs() < 1e-9);
        assert!((vlt - 35.0).abs() < 1e-9);
        // punto intermedio en ambas direcciones
        let (cop, _) = table.cop(40.0, 5.0);
        assert!((cop - (4.2 + 3.5 + 5.2 + 4.3) / 4.0).abs() < 1e-9);
    }

    #[test]
    fn technical_limits() {
        let table = CopTable::from_csv(CSV).unwrap();
        // impulsión por debajo del mínimo se eleva a 35 °C
        let (_, vlt) = table.cop(20.0, 10.0);
        assert!((vlt - 35.0).abs() < 1e-9);
        // salto térmico limitado a 75 K
        let (_, vlt) = table.cop(85.0, 0.0);
        assert!((vlt - 75.0).abs() < 1e-9);
        // fuente fuera de la matriz -> COP 0
        let (cop, _) = table.cop(55.0, 40.0);
        assert!(cop == 0.0);
    }
}
