use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Capability names exposed to the controlling platform.
pub mod capability {
    pub const THERMOSTAT_MODE: &str = "thermostat_mode";
    pub const TARGET_TEMPERATURE: &str = "target_temperature";
    pub const DHW_OPERATION_MODE: &str = "dhw_operation_mode";
    pub const TARGET_TEMPERATURE_DHW: &str = "target_temperature.dhw";
    pub const DHW_BOOST: &str = "dhw_boost";
    pub const MEASURE_TEMPERATURE: &str = "measure_temperature";
    pub const MEASURE_TEMPERATURE_DHW: &str = "measure_temperature.dhw";
    pub const MEASURE_TEMPERATURE_OUTDOOR: &str = "measure_temperature.outdoor";
    pub const MEASURE_TEMPERATURE_SUPPLY: &str = "measure_temperature.supply";
    pub const MEASURE_TEMPERATURE_RETURN: &str = "measure_temperature.return";
    pub const HEAT_COOL_MODE: &str = "heat_cool_mode";
    pub const MODULATION: &str = "modulation";
    pub const SYSTEM_PRESSURE: &str = "system_pressure";
    pub const HEAT_DEMAND: &str = "heat_demand";
    pub const WORKING_HOURS: &str = "working_hours";
    pub const DHW_CHARGE_REMAINING: &str = "dhw_charge_remaining";
}

/// Typed value held in a capability slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CapabilityValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CapabilityValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CapabilityValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CapabilityValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CapabilityValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for CapabilityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityValue::Bool(b) => write!(f, "{b}"),
            CapabilityValue::Number(n) => write!(f, "{n}"),
            CapabilityValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for CapabilityValue {
    fn from(n: f64) -> Self {
        CapabilityValue::Number(n)
    }
}

impl From<bool> for CapabilityValue {
    fn from(b: bool) -> Self {
        CapabilityValue::Bool(b)
    }
}

impl From<&str> for CapabilityValue {
    fn from(s: &str) -> Self {
        CapabilityValue::Text(s.to_string())
    }
}

impl From<String> for CapabilityValue {
    fn from(s: String) -> Self {
        CapabilityValue::Text(s)
    }
}

/// Platform-facing thermostat mode.
///
/// The vendor only knows `manual` and `auto`, so `Heat` and `Off` both
/// command `manual`. Off is told apart on the device only by its 5 degree
/// setpoint, which a later poll does not interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermostatMode {
    Heat,
    Auto,
    Off,
}

impl ThermostatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThermostatMode::Heat => "heat",
            ThermostatMode::Auto => "auto",
            ThermostatMode::Off => "off",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "heat" => Some(ThermostatMode::Heat),
            "auto" => Some(ThermostatMode::Auto),
            "off" => Some(ThermostatMode::Off),
            _ => None,
        }
    }

    /// Unrecognized vendor modes fall back to `Auto`.
    pub fn from_vendor(s: &str) -> Self {
        match s {
            "manual" => ThermostatMode::Heat,
            "off" => ThermostatMode::Off,
            _ => ThermostatMode::Auto,
        }
    }

    pub fn vendor_mode(&self) -> &'static str {
        match self {
            ThermostatMode::Heat | ThermostatMode::Off => "manual",
            ThermostatMode::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    K40,
    K30,
    Generic,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::K40 => "k40",
            DeviceType::K30 => "k30",
            DeviceType::Generic => "generic",
        }
    }

    /// Classify a system-info string; matching is case-insensitive.
    pub fn from_system_info(info: &str) -> Self {
        let info = info.to_lowercase();
        if info.contains("k40") {
            DeviceType::K40
        } else if info.contains("k30") {
            DeviceType::K30
        } else {
            DeviceType::Generic
        }
    }

    /// Exact type string from a gateway listing; anything else is generic.
    pub fn from_listing(listed: &str) -> Self {
        match listed {
            "k40" => DeviceType::K40,
            "k30" => DeviceType::K30,
            _ => DeviceType::Generic,
        }
    }

    pub fn is_heat_pump(&self) -> bool {
        matches!(self, DeviceType::K40 | DeviceType::K30)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gateway {
    pub id: String,
    pub name: Option<String>,
    pub device_type: Option<String>,
}

/// A gateway that passed discovery as a supported heat pump.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatPump {
    pub gateway_id: String,
    pub name: String,
    pub device_type: DeviceType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable(String),
}

/// Flow triggers raised by the sync engine when observed state changes.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    TemperatureChanged { temperature: f64 },
    OutdoorTemperatureChanged { temperature: f64 },
    DhwTemperatureChanged { temperature: f64 },
    SupplyTemperatureChanged { temperature: f64 },
    ReturnTemperatureChanged { temperature: f64 },
    HeatDemandTrue,
    HeatDemandFalse,
    DhwBoostTrue,
    DhwBoostFalse,
    ThermostatModeChanged { mode: String },
    HeatCoolModeChanged { mode: String },
    DhwModeChanged { mode: String },
    ModulationChanged { modulation: f64 },
    SystemPressureChanged { pressure: f64 },
    SystemPressureLow { pressure: f64 },
}

impl Event {
    /// Trigger card identifier.
    pub fn name(&self) -> &'static str {
        match self {
            Event::TemperatureChanged { .. } => "temperature_changed",
            Event::OutdoorTemperatureChanged { .. } => "outdoor_temperature_changed",
            Event::DhwTemperatureChanged { .. } => "dhw_temperature_changed",
            Event::SupplyTemperatureChanged { .. } => "supply_temperature_changed",
            Event::ReturnTemperatureChanged { .. } => "return_temperature_changed",
            Event::HeatDemandTrue => "heat_demand_true",
            Event::HeatDemandFalse => "heat_demand_false",
            Event::DhwBoostTrue => "dhw_boost_true",
            Event::DhwBoostFalse => "dhw_boost_false",
            Event::ThermostatModeChanged { .. } => "thermostat_mode_changed",
            Event::HeatCoolModeChanged { .. } => "heat_cool_mode_changed",
            Event::DhwModeChanged { .. } => "dhw_mode_changed",
            Event::ModulationChanged { .. } => "modulation_changed",
            Event::SystemPressureChanged { .. } => "system_pressure_changed",
            Event::SystemPressureLow { .. } => "system_pressure_low",
        }
    }

    /// Token payload handed to the trigger.
    pub fn tokens(&self) -> Value {
        match self {
            Event::TemperatureChanged { temperature }
            | Event::OutdoorTemperatureChanged { temperature }
            | Event::DhwTemperatureChanged { temperature }
            | Event::SupplyTemperatureChanged { temperature }
            | Event::ReturnTemperatureChanged { temperature } => {
                json!({ "temperature": temperature })
            }
            Event::HeatDemandTrue
            | Event::HeatDemandFalse
            | Event::DhwBoostTrue
            | Event::DhwBoostFalse => json!({}),
            Event::ThermostatModeChanged { mode }
            | Event::HeatCoolModeChanged { mode }
            | Event::DhwModeChanged { mode } => json!({ "mode": mode }),
            Event::ModulationChanged { modulation } => json!({ "modulation": modulation }),
            Event::SystemPressureChanged { pressure } | Event::SystemPressureLow { pressure } => {
                json!({ "pressure": pressure })
            }
        }
    }
}
