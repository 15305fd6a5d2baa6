// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Catálogo de tuberías normalizadas
//!
//! Tipos estándar con diámetro interior, transmitancia U y material, usados
//! para el dimensionado por escalera discreta de diámetros. El formato de
//! archivo es el CSV de catálogo de pandapipes (separado por `;`, con columnas
//! `std_type;inner_diameter_mm;u_w_per_m2k;material`).

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tipo de tubería normalizada
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeType {
    /// Denominación del tipo, p. ej. "KMR 100/250-2v"
    pub name: String,
    /// Diámetro interior, m
    pub inner_diameter_m: f64,
    /// Transmitancia térmica referida a la superficie interior, W/(m²·K)
    pub u_w_per_m2k: f64,
    /// Material / sistema constructivo, p. ej. "KMR"
    pub material: String,
}

/// Catálogo de tipos de tubería, indexado por denominación
#[derive(Debug, Clone, Default)]
pub struct PipeCatalogue {
    pub types: IndexMap<String, PipeType>,
}

/// Catálogo KMR (tubería preaislada de acero) por defecto
///
/// Diámetros nominales DN20-DN400 con transmitancias de tubería doble
/// serie 2 según catálogo de fabricante
pub static DEFAULT_CATALOGUE: Lazy<PipeCatalogue> = Lazy::new(|| {
    const KMR: [(&str, f64, f64); 13] = [
        ("KMR 20/90-2v", 0.0217, 0.578),
        ("KMR 25/90-2v", 0.0273, 0.631),
        ("KMR 32/110-2v", 0.0372, 0.775),
        ("KMR 40/110-2v", 0.0431, 0.852),
        ("KMR 50/125-2v", 0.0545, 0.893),
        ("KMR 65/140-2v", 0.0703, 0.964),
        ("KMR 80/160-2v", 0.0825, 1.045),
        ("KMR 100/200-2v", 0.1071, 1.055),
        ("KMR 125/225-2v", 0.1325, 1.129),
        ("KMR 150/250-2v", 0.1603, 1.229),
        ("KMR 200/315-2v", 0.2101, 1.293),
        ("KMR 250/400-2v", 0.263, 1.270),
        ("KMR 300/450-2v", 0.3127, 1.355),
    ];
    let mut cat = PipeCatalogue::default();
    for (name, d, u) in KMR {
        cat.types.insert(
            name.to_string(),
            PipeType {
                name: name.to_string(),
                inner_diameter_m: d,
                u_w_per_m2k: u,
                material: "KMR".to_string(),
            },
        );
    }
    cat
});

impl PipeCatalogue {
    /// Lee un catálogo desde el contenido de un CSV estilo pandapipes
    pub fn from_csv(data: &str) -> Result<Self> {
        let mut lines = data.lines().filter(|l| !l.trim().is_empty());
        let header: Vec<&str> = lines
            .next()
            .ok_or_else(|| Error::InvalidInput("catálogo de tuberías vacío".to_string()))?
            .split(';')
            .map(str::trim)
            .collect();
        let col = |name: &str| -> Result<usize> {
            header
                .iter()
                .position(|h| *h == name)
                .ok_or_else(|| Error::InvalidInput(format!("falta la columna {} en el catálogo", name)))
        };
        let name_col = col("std_type")?;
        let d_col = col("inner_diameter_mm")?;
        let u_col = col("u_w_per_m2k")?;
        let mat_col = col("material")?;

        let mut types = IndexMap::new();
        for (i, line) in lines.enumerate() {
            let fields: Vec<&str> = line.split(';').map(str::trim).collect();
            if fields.len() <= mat_col.max(d_col).max(u_col).max(name_col) {
                return Err(Error::InvalidInput(format!(
                    "fila {} del catálogo con columnas insuficientes",
                    i + 2
                )));
            }
            let parse = |s: &str| -> Result<f64> {
                s.parse::<f64>()
                    .map_err(|_| Error::InvalidInput(format!("valor no numérico \"{}\" en el catálogo", s)))
            };
            let d_mm = parse(fields[d_col])?;
            if d_mm <= 0.0 {
                return Err(Error::InvalidInput(format!(
                    "diámetro no positivo en el tipo {}",
                    fields[name_col]
                )));
            }
            types.insert(
                fields[name_col].to_string(),
                PipeType {
                    name: fields[name_col].to_string(),
                    inner_diameter_m: d_mm / 1000.0,
                    u_w_per_m2k: parse(fields[u_col])?,
                    material: fields[mat_col].to_string(),
                },
            );
        }
        Ok(PipeCatalogue { types })
    }

    /// Busca un tipo por denominación
    pub fn lookup(&self, type_name: &str) -> Result<&PipeType> {
        self.types
            .get(type_name)
            .ok_or_else(|| Error::CatalogueLookup(type_name.to_string()))
    }

    /// Tipos de un material, ordenados por diámetro interior creciente
    ///
    /// La lista resultante es la escalera discreta que recorren los algoritmos
    /// de dimensionado
    pub fn filter_by_material(&self, material: &str) -> Result<Vec<&PipeType>> {
        let mut filtered: Vec<&PipeType> = self
            .types
            .values()
            .filter(|t| t.material == material)
            .collect();
        if filtered.is_empty() {
            return Err(Error::CatalogueLookup(format!("material {}", material)));
        }
        filtered.sort_by(|a, b| a.inner_diameter_m.total_cmp(&b.inner_diameter_m));
        Ok(filtered)
    }

    /// Tipo del material cuyo diámetro interior es el más próximo al requerido
    pub fn closest_type(&self, material: &str, required_diameter_m: f64) -> Result<&PipeType> {
        let ladder = self.filter_by_material(material)?;
        Ok(ladder
            .iter()
            .min_by(|a, b| {
                (a.inner_diameter_m - required_diameter_m)
                    .abs()
                    .total_cmp(&(b.inner_diameter_m - required_diameter_m).abs())
            })
            .copied()
            .expect("escalera de tipos no vacía"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalogue_ladder() {
        let ladder = DEFAULT_CATALOGUE.filter_by_material("KMR").unwrap();
        assert_eq!(ladder.len(), 13);
        // ordenada por diámetro creciente
        for w in ladder.windows(2) {
            assert!(w[0].inner_diameter_m < w[1].inner_diameter_m);
        }
    }

    #[test]
    fn lookup_unknown_type() {
        assert!(matches!(
            DEFAULT_CATALOGUE.lookup("DN9999"),
            Err(Error::CatalogueLookup(_))
        ));
        assert!(matches!(
            DEFAULT_CATALOGUE.filter_by_material("PEX"),
            Err(Error::CatalogueLookup(_))
        ));
    }

    #[test]
    fn csv_roundtrip() {
        let csv = "std_type;inner_diameter_mm;u_w_per_m2k;material\n\
                   DN80;82.5;1.045;KMR\n\
                   DN100;107.1;1.055;KMR\n";
        let cat = PipeCatalogue::from_csv(csv).unwrap();
        let t = cat.lookup("DN100").unwrap();
        assert!((t.inner_diameter_m - 0.1071).abs() < 1e-9);
        let closest = cat.closest_type("KMR", 0.09).unwrap();
        assert_eq!(closest.name, "DN80");
    }
}
