// Copyright (c) 2018-2022 Rafael Villar Burke <pachi@ietcc.csic.es>
// Distributed under the MIT License
// (See accompanying LICENSE file or a copy at http://opensource.org/licenses/MIT)

//! Coste de generación de calor por el método de anualidades (VDI 2067)
//!
//! Para una inversión A0 con vida útil T_N, factores de instalación e
//! inspección, horas de operación, factor de interés q = 1 + i, factor de
//! escalada de precios r y horizonte T:
//!
//! ```text
//! a    = q^T (q − 1) / (q^T − 1)            factor de anualidad
//! a_rT = (1 − (r/q)^T) / (q − r)            valor actual con escalada
//! A_total = A0·a_TN + A0·(f_inst + f_w_insp)/100·a_rT·a
//!         + h_op·s·a_rT·a + E·p·a_rT·a − ingresos·a_rT·a
//! WGK  = A_total / Q_anual                  €/MWh
//! ```

use serde::{Deserialize, Serialize};

/// Parámetros económicos generales del sistema
///
/// Precios de energía en €/MWh, tasa horaria en €/h
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EconomicParameters {
    /// Factor de interés del capital, q = 1 + i
    pub interest_rate_factor: f64,
    /// Factor de escalada de precios, r
    pub price_escalation_factor: f64,
    /// Horizonte de consideración, años
    pub time_period_years: f64,
    /// Precio de la electricidad, €/MWh
    pub electricity_price: f64,
    /// Precio del gas, €/MWh
    pub gas_price: f64,
    /// Precio de la madera, €/MWh
    pub wood_price: f64,
    /// Tasa horaria del personal, €/h
    pub hourly_rate: f64,
}

impl Default for EconomicParameters {
    fn default() -> Self {
        EconomicParameters {
            interest_rate_factor: 1.05,
            price_escalation_factor: 1.03,
            time_period_years: 20.0,
            electricity_price: 150.0,
            gas_price: 70.0,
            wood_price: 60.0,
            hourly_rate: 45.0,
        }
    }
}

/// Factor de anualidad `a = q^T (q − 1) / (q^T − 1)`
pub fn annuity_factor(q: f64, t_years: f64) -> f64 {
    if (q - 1.0).abs() < 1e-12 {
        return 1.0 / t_years;
    }
    let qt = q.powf(t_years);
    qt * (q - 1.0) / (qt - 1.0)
}

/// Factor de valor actual con escalada de precios
/// `a_rT = (1 − (r/q)^T) / (q − r)`
pub fn present_value_factor(q: f64, r: f64, t_years: f64) -> f64 {
    if (q - r).abs() < 1e-12 {
        return t_years / q;
    }
    (1.0 - (r / q).powf(t_years)) / (q - r)
}

/// Anualidad total de una instalación, €
///
/// `a0`: inversión (€); `lifetime_years`: vida útil T_N (para la anualidad de
/// la inversión); `f_inst`, `f_w_insp`: factores anuales de instalación y de
/// mantenimiento e inspección, en % de A0 (VDI 2067); `operating_effort_h`: horas
/// anuales de atención; `energy_mwh` y `energy_price`: consumo anual y su
/// precio; `revenue_eur`: ingresos anuales (p. ej. venta de electricidad
/// de cogeneración), se descuentan con la misma escalada
#[allow(clippy::too_many_arguments)]
pub fn annuity(
    a0: f64,
    lifetime_years: f64,
    f_inst: f64,
    f_w_insp: f64,
    operating_effort_h: f64,
    econ: &EconomicParameters,
    energy_mwh: f64,
    energy_price: f64,
    revenue_eur: f64,
) -> f64 {
    let q = econ.interest_rate_factor;
    let r = econ.price_escalation_factor;
    let t = econ.time_period_years;
    let a = annuity_factor(q, t);
    let a_rt = present_value_factor(q, r, t);

    // la inversión se anualiza sobre su vida útil
    let a_investment = a0 * annuity_factor(q, lifetime_years);
    let a_omi = a0 * (f_inst + f_w_insp) / 100.0 * a_rt * a;
    let a_operation = operating_effort_h * econ.hourly_rate * a_rt * a;
    let a_energy = energy_mwh * energy_price * a_rt * a;
    let a_revenue = revenue_eur * a_rt * a;

    a_investment + a_omi + a_operation + a_energy - a_revenue
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annuity_factor_limits() {
        // con q = 1.05 y 20 años, a ≈ 0.0802
        assert!((annuity_factor(1.05, 20.0) - 0.08024).abs() < 1e-4);
        // sin interés, la anualidad reparte la inversión a partes iguales
        assert!((annuity_factor(1.0, 20.0) - 0.05).abs() < 1e-12);
    }

    #[test]
    fn present_value_factor_values() {
        // q = 1.05, r = 1.03, T = 20: (1 − (r/q)^20)/(q − r)
        let expected = (1.0 - (1.03f64 / 1.05).powf(20.0)) / 0.02;
        assert!((present_value_factor(1.05, 1.03, 20.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn annuity_roundtrip() {
        // invariante: WGK · Q_anual = A_total (hasta 1 ppm)
        let econ = EconomicParameters::default();
        let a_total = annuity(500_000.0, 20.0, 1.0, 2.0, 10.0, &econ, 2000.0, 70.0, 0.0);
        let heat_mwh = 1752.0;
        let wgk = a_total / heat_mwh;
        assert!((wgk * heat_mwh - a_total).abs() / a_total < 1e-6);
        assert!(a_total > 0.0);
    }
}
