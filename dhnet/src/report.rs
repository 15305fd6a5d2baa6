// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Volcado de resultados de la simulación anual a CSV
//!
//! Formato separado por `;` con cabeceras en alemán, una fila por hora:
//!
//! ```text
//! Zeit; Gesamtwärmebedarf_Gebäude_kW; Gesamtheizlast_Gebäude_kW;
//! Gesamtstrombedarf_Wärmepumpen_Gebäude_kW;
//! Wärmeerzeugung_{p}_{i}_kW; Massenstrom_{p}_{i}_kg/s; Delta p_{p}_{i}_bar;
//! Vorlauftemperatur_{p}_{i}_°C; Rücklauftemperatur_{p}_{i}_°C;
//! Vorlaufdruck_{p}_{i}_bar; Rücklaufdruck_{p}_{i}_bar
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::common::fround3;
use crate::error::Result;
use crate::timeseries::TimeSeriesResults;

/// Escribe el CSV de resultados de la serie temporal
///
/// `building_heat_kw`: demanda total de los edificios; `building_heating_kw`:
/// parte de calefacción; `heat_pump_electricity_kw`: electricidad de bombas de
/// calor descentralizadas (cero salvo en redes frías). Las tres series cubren
/// el rango simulado. `timestamps` opcional; en su defecto se escribe la hora
/// del año
pub fn write_results_csv<W: Write>(
    writer: &mut W,
    results: &TimeSeriesResults,
    building_heat_kw: &[f64],
    building_heating_kw: &[f64],
    heat_pump_electricity_kw: &[f64],
    timestamps: Option<&[String]>,
) -> Result<()> {
    let mut header = vec![
        "Zeit".to_string(),
        "Gesamtwärmebedarf_Gebäude_kW".to_string(),
        "Gesamtheizlast_Gebäude_kW".to_string(),
        "Gesamtstrombedarf_Wärmepumpen_Gebäude_kW".to_string(),
    ];
    for (kind, idx) in results.pumps.keys() {
        let p = kind.label();
        header.push(format!("Wärmeerzeugung_{}_{}_kW", p, idx));
        header.push(format!("Massenstrom_{}_{}_kg/s", p, idx));
        header.push(format!("Delta p_{}_{}_bar", p, idx));
        header.push(format!("Vorlauftemperatur_{}_{}_°C", p, idx));
        header.push(format!("Rücklauftemperatur_{}_{}_°C", p, idx));
        header.push(format!("Vorlaufdruck_{}_{}_bar", p, idx));
        header.push(format!("Rücklaufdruck_{}_{}_bar", p, idx));
    }
    writeln!(writer, "{}", header.join(";"))?;

    for step in 0..results.len() {
        let mut row = Vec::with_capacity(header.len());
        match timestamps.and_then(|ts| ts.get(results.start + step)) {
            Some(ts) => row.push(ts.clone()),
            None => row.push(format!("{}", results.start + step)),
        }
        row.push(format_value(building_heat_kw.get(step)));
        row.push(format_value(building_heating_kw.get(step)));
        row.push(format_value(heat_pump_electricity_kw.get(step)));
        for series in results.pumps.values() {
            row.push(format_value(series.qext_kw.get(step)));
            row.push(format_value(series.mass_flow.get(step)));
            row.push(format_value(series.deltap.get(step)));
            row.push(format_value(series.flow_temp.get(step)));
            row.push(format_value(series.return_temp.get(step)));
            row.push(format_value(series.flow_pressure.get(step)));
            row.push(format_value(series.return_pressure.get(step)));
        }
        writeln!(writer, "{}", row.join(";"))?;
    }
    Ok(())
}

/// Escribe el CSV de resultados en un archivo
pub fn write_results_csv_to_path<P: AsRef<Path>>(
    path: P,
    results: &TimeSeriesResults,
    building_heat_kw: &[f64],
    building_heating_kw: &[f64],
    heat_pump_electricity_kw: &[f64],
    timestamps: Option<&[String]>,
) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write_results_csv(
        &mut writer,
        results,
        building_heat_kw,
        building_heating_kw,
        heat_pump_electricity_kw,
        timestamps,
    )
}

fn format_value(value: Option<&f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{}", fround3(*v)),
        _ => "NaN".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeseries::{ProducerKind, PumpSeries, TimeSeriesResults};

    #[test]
    fn csv_layout() {
        let mut results = TimeSeriesResults {
            start: 0,
            end: 2,
            ..Default::default()
        };
        results.pumps.insert(
            (ProducerKind::Main, 0),
            PumpSeries {
                mass_flow: vec![0.4, 0.41],
                flow_pressure: vec![4.0, 4.0],
                return_pressure: vec![2.5, 2.5],
                deltap: vec![1.5, 1.5],
                flow_temp: vec![85.0, 85.0],
                return_temp: vec![55.0, 55.2],
                qext_kw: vec![50.0, 51.0],
            },
        );
        let mut out = Vec::new();
        write_results_csv(
            &mut out,
            &results,
            &[48.0, 49.0],
            &[40.0, 41.0],
            &[0.0, 0.0],
            None,
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("Zeit;Gesamtwärmebedarf_Gebäude_kW"));
        assert!(header.contains("Wärmeerzeugung_Heizentrale Haupteinspeisung_0_kW"));
        assert!(header.contains("Vorlauftemperatur_Heizentrale Haupteinspeisung_0_°C"));
        let row = lines.next().unwrap();
        assert_eq!(row.split(';').count(), header.split(';').count());
        assert!(row.starts_with("0;48;40;0;50;0.4;1.5;85;55;4;2.5"));
    }
}
