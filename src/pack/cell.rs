//! Battery cell model
//!
//! A cell holds one (temperature, voltage) reading pair. Both values are
//! replaced together so a reader never sees a half-updated cell.

use super::error::PackError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Value that can be read from a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Cell temperature in degrees Celsius
    Temperature,
    /// Cell voltage in millivolts
    Voltage,
}

impl Metric {
    /// Unit suffix used when displaying values of this metric
    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Temperature => "°C",
            Metric::Voltage => "mV",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Temperature => write!(f, "temperature"),
            Metric::Voltage => write!(f, "voltage"),
        }
    }
}

impl FromStr for Metric {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "temperature" | "temp" => Ok(Metric::Temperature),
            "voltage" | "volt" => Ok(Metric::Voltage),
            other => Err(PackError::UnknownMetric(other.to_string())),
        }
    }
}

/// A temperature/voltage pair sampled at the same time
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Reading {
    /// Degrees Celsius
    pub temperature: f64,
    /// Millivolts
    pub voltage: f64,
}

impl Reading {
    pub fn new(temperature: f64, voltage: f64) -> Self {
        Self {
            temperature,
            voltage,
        }
    }

    /// Reading for a cell the source could not supply a value for
    pub fn missing() -> Self {
        Self::new(f64::NAN, f64::NAN)
    }

    /// Get a single value of the pair
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Voltage => self.voltage,
        }
    }
}

/// Thresholds outside of which a cell is reported as abnormal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbnormalLimits {
    #[serde(default = "default_min_voltage")]
    pub min_voltage_mv: f64,

    #[serde(default = "default_max_voltage")]
    pub max_voltage_mv: f64,

    #[serde(default = "default_max_temperature")]
    pub max_temperature_c: f64,
}

fn default_min_voltage() -> f64 {
    3500.0
}

fn default_max_voltage() -> f64 {
    4200.0
}

fn default_max_temperature() -> f64 {
    60.0
}

impl Default for AbnormalLimits {
    fn default() -> Self {
        Self {
            min_voltage_mv: default_min_voltage(),
            max_voltage_mv: default_max_voltage(),
            max_temperature_c: default_max_temperature(),
        }
    }
}

impl AbnormalLimits {
    /// Check a reading against these limits.
    ///
    /// Non-finite values mean "unknown" and never count as abnormal.
    pub fn is_abnormal(&self, reading: &Reading) -> bool {
        let voltage = reading.voltage;
        let temperature = reading.temperature;

        let abnormal_voltage = voltage.is_finite()
            && (voltage < self.min_voltage_mv || voltage > self.max_voltage_mv);
        let abnormal_temperature = temperature.is_finite() && temperature > self.max_temperature_c;

        abnormal_voltage || abnormal_temperature
    }
}

/// A single battery cell
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    reading: Reading,
}

impl Cell {
    /// Create a cell with both values at 0.0
    pub fn new() -> Self {
        Self::default()
    }

    /// Get temperature or voltage of the cell
    pub fn get(&self, metric: Metric) -> f64 {
        self.reading.get(metric)
    }

    pub fn temperature(&self) -> f64 {
        self.reading.temperature
    }

    pub fn voltage(&self) -> f64 {
        self.reading.voltage
    }

    /// Current reading pair
    pub fn reading(&self) -> Reading {
        self.reading
    }

    /// Replace both values at once. No plausibility check happens here.
    pub fn update(&mut self, temperature: f64, voltage: f64) {
        self.reading = Reading::new(temperature, voltage);
    }

    /// Replace the reading pair
    pub fn set_reading(&mut self, reading: Reading) {
        self.reading = reading;
    }

    /// True iff voltage is outside [3500, 4200] mV or temperature is above 60 °C
    pub fn is_abnormal(&self) -> bool {
        self.is_abnormal_within(&AbnormalLimits::default())
    }

    /// Same as [`Cell::is_abnormal`] with explicit limits
    pub fn is_abnormal_within(&self, limits: &AbnormalLimits) -> bool {
        limits.is_abnormal(&self.reading)
    }
}
