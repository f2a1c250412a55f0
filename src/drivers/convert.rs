//! ADC code to physical-unit conversions for an FSR in a voltage divider.
//!
//! The sensor sits between `Vcc` and the analog pin, with a fixed pull-down
//! resistor `Rp` from the pin to ground, so the pin sees
//! `Vout = Vcc / (1 + Rfsr / Rp)` and the sensor resistance follows as
//! `Rfsr = Rp * (Vcc / Vout - 1)`.
//!
//! A code of 0 means "no contact" and converts to 0 in every unit.
use serde::{Deserialize, Serialize};
/// Full-scale code of the 10-bit ADC.
pub const ADC_MAX_CODE: f64 = 1023.0;
/// Power-law fit from the sensor datasheet: grams = 96892 * R^-1.292.
const FORCE_FIT_COEFFICIENT: f64 = 96892.0;
const FORCE_FIT_EXPONENT: f64 = -1.292;
const STANDARD_GRAVITY: f64 = 9.80665;
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnitConverter {
    vcc: f64,
    pulldown_ohms: f64,
}
impl UnitConverter {
    pub fn new(vcc: f64, pulldown_ohms: f64) -> Self {
        Self { vcc, pulldown_ohms }
    }
    pub fn vcc(&self) -> f64 {
        self.vcc
    }
    pub fn pulldown_ohms(&self) -> f64 {
        self.pulldown_ohms
    }
    pub fn to_voltage(&self, code: i64) -> f64 {
        if code > 0 {
            code as f64 * self.vcc / ADC_MAX_CODE
        } else {
            0.0
        }
    }
    pub fn to_resistance(&self, volt: f64) -> f64 {
        if volt > 0.0 {
            self.pulldown_ohms * (self.vcc / volt - 1.0)
        } else {
            0.0
        }
    }
    pub fn to_conductance(&self, resistance: f64) -> f64 {
        if resistance > 0.0 {
            1.0 / resistance
        } else {
            0.0
        }
    }
    pub fn to_force_newtons(&self, resistance: f64) -> f64 {
        if resistance > 0.0 {
            FORCE_FIT_COEFFICIENT * resistance.powf(FORCE_FIT_EXPONENT) * STANDARD_GRAVITY
        } else {
            0.0
        }
    }
    pub fn code_to_resistance(&self, code: i64) -> f64 {
        self.to_resistance(self.to_voltage(code))
    }
    pub fn code_to_force(&self, code: i64) -> f64 {
        self.to_force_newtons(self.code_to_resistance(code))
    }
}
/// Y-axis unit of the live chart.
///
/// Conductance is charted in microsiemens; every other unit is SI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Unit {
    #[default]
    Raw,
    Voltage,
    Resistance,
    Conductance,
    Force,
    VoltageAvg,
    ResistanceAvg,
    ConductanceAvg,
    ForceAvg,
}
impl Unit {
    pub const ALL: [Unit; 9] = [
        Unit::Raw,
        Unit::Voltage,
        Unit::Resistance,
        Unit::Conductance,
        Unit::Force,
        Unit::VoltageAvg,
        Unit::ResistanceAvg,
        Unit::ConductanceAvg,
        Unit::ForceAvg,
    ];
    pub fn label(self) -> &'static str {
        match self {
            Unit::Raw => "Raw value (0-1023)",
            Unit::Voltage => "Voltage (V)",
            Unit::Resistance => "Resistance (Ohm)",
            Unit::Conductance => "Conductance (uS)",
            Unit::Force => "Force (N)",
            Unit::VoltageAvg => "Avg. voltage (V)",
            Unit::ResistanceAvg => "Avg. resistance (Ohm)",
            Unit::ConductanceAvg => "Avg. conductance (uS)",
            Unit::ForceAvg => "Avg. force (N)",
        }
    }
    /// Suffix for a single value; raw codes have none.
    pub fn symbol(self) -> &'static str {
        match self.instantaneous() {
            Unit::Voltage => "V",
            Unit::Resistance => "Ohm",
            Unit::Conductance => "uS",
            Unit::Force => "N",
            _ => "",
        }
    }
    pub fn is_averaged(self) -> bool {
        matches!(
            self,
            Unit::VoltageAvg | Unit::ResistanceAvg | Unit::ConductanceAvg | Unit::ForceAvg
        )
    }
    /// The instantaneous unit an averaged unit is built from.
    pub fn instantaneous(self) -> Unit {
        match self {
            Unit::VoltageAvg => Unit::Voltage,
            Unit::ResistanceAvg => Unit::Resistance,
            Unit::ConductanceAvg => Unit::Conductance,
            Unit::ForceAvg => Unit::Force,
            other => other,
        }
    }
    /// Converts one code, ignoring any averaging.
    pub fn convert(self, code: i64, conv: &UnitConverter) -> f64 {
        match self.instantaneous() {
            Unit::Raw => code as f64,
            Unit::Voltage => conv.to_voltage(code),
            Unit::Resistance => conv.code_to_resistance(code),
            Unit::Conductance => conv.to_conductance(conv.code_to_resistance(code)) * 1e6,
            Unit::Force => conv.code_to_force(code),
            _ => unreachable!("instantaneous() never returns an averaged unit"),
        }
    }
    /// Mean of the instantaneous conversion over `codes`; 0 for an empty window.
    pub fn average<I>(self, codes: I, conv: &UnitConverter) -> f64
    where
        I: IntoIterator<Item = i64>,
    {
        let base = self.instantaneous();
        let (sum, count) = codes
            .into_iter()
            .fold((0.0, 0usize), |(sum, n), code| (sum + base.convert(code, conv), n + 1));
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }
}
impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn conv() -> UnitConverter {
        UnitConverter::new(5.06, 10000.0)
    }
    #[test]
    fn zero_code_is_zero_everywhere() {
        let c = conv();
        assert_eq!(c.to_voltage(0), 0.0);
        assert_eq!(c.to_resistance(0.0), 0.0);
        assert_eq!(c.to_conductance(0.0), 0.0);
        assert_eq!(c.to_force_newtons(0.0), 0.0);
        for unit in Unit::ALL {
            assert_eq!(unit.convert(0, &c), 0.0, "{unit:?}");
        }
    }
    #[test]
    fn negative_inputs_are_guarded() {
        let c = conv();
        assert_eq!(c.to_voltage(-3), 0.0);
        assert_eq!(c.to_resistance(-1.0), 0.0);
        assert_eq!(c.to_conductance(-5.0), 0.0);
        assert_eq!(c.to_force_newtons(-5.0), 0.0);
    }
    #[test]
    fn full_scale_code_reads_vcc_and_zero_resistance() {
        let c = conv();
        assert!((c.to_voltage(1023) - 5.06).abs() < 1e-12);
        assert!(c.code_to_resistance(1023).abs() < 1e-9);
    }
    #[test]
    fn resistance_is_positive_and_decreasing_with_code() {
        let c = conv();
        let mut previous = f64::INFINITY;
        for code in 1..1023 {
            let r = c.code_to_resistance(code);
            assert!(r > 0.0, "code {code}");
            assert!(r < previous, "code {code}");
            previous = r;
        }
    }
    #[test]
    fn force_grows_with_code() {
        let c = conv();
        assert!(c.code_to_force(800) > c.code_to_force(200));
    }
    #[test]
    fn force_is_bit_identical_across_calls() {
        let c = conv();
        for code in [1, 17, 511, 1022] {
            assert_eq!(c.code_to_force(code).to_bits(), c.code_to_force(code).to_bits());
        }
    }
    #[test]
    fn midscale_voltage_matches_divider() {
        let c = conv();
        assert!((c.to_voltage(511) - 2.527_526_881_720_43).abs() < 1e-9);
        // Vout = Vcc/2 means Rfsr == Rp.
        let r = c.to_resistance(5.06 / 2.0);
        assert!((r - 10000.0).abs() < 1e-6);
        assert!((c.to_conductance(r) - 1e-4).abs() < 1e-12);
    }
    #[test]
    fn conductance_is_charted_in_microsiemens() {
        let c = conv();
        let expected = c.to_conductance(c.code_to_resistance(600)) * 1e6;
        assert_eq!(Unit::Conductance.convert(600, &c), expected);
    }
    #[test]
    fn average_uses_instantaneous_base() {
        let c = conv();
        let avg = Unit::VoltageAvg.average([0, 1023], &c);
        assert!((avg - 2.53).abs() < 1e-9);
        assert_eq!(Unit::ForceAvg.average(std::iter::empty(), &c), 0.0);
        assert_eq!(Unit::Raw.average([2, 4], &c), 3.0);
    }
}
