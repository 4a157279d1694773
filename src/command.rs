use serde_json::{Value, json};

use crate::protocol::{CHARGE_START, CHARGE_STOP, OFF_SETPOINT, resource};
use crate::types::capability;
use crate::types::{CapabilityValue, ThermostatMode};
use crate::{Error, Result};

/// A user- or flow-originated write to one of the settable capabilities.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetThermostatMode(ThermostatMode),
    SetTargetTemperature(f64),
    SetDhwMode(String),
    SetDhwTemperature(f64),
    SetDhwBoost(bool),
}

/// One PUT against a gateway resource.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorWrite {
    pub resource: &'static str,
    pub value: Value,
}

impl VendorWrite {
    fn new(resource: &'static str, value: Value) -> Self {
        Self { resource, value }
    }
}

impl Command {
    /// Build a command from a capability name, as the platform's listeners
    /// deliver them.
    pub fn from_capability(name: &str, value: &CapabilityValue) -> Result<Self> {
        let invalid = || Error::InvalidValue {
            capability: name.to_string(),
            value: value.to_string(),
        };
        match name {
            capability::THERMOSTAT_MODE => value
                .as_str()
                .and_then(ThermostatMode::parse)
                .map(Command::SetThermostatMode)
                .ok_or_else(invalid),
            capability::TARGET_TEMPERATURE => value
                .as_f64()
                .map(Command::SetTargetTemperature)
                .ok_or_else(invalid),
            capability::DHW_OPERATION_MODE => value
                .as_str()
                .map(|m| Command::SetDhwMode(m.to_string()))
                .ok_or_else(invalid),
            capability::TARGET_TEMPERATURE_DHW => value
                .as_f64()
                .map(Command::SetDhwTemperature)
                .ok_or_else(invalid),
            capability::DHW_BOOST => value
                .as_bool()
                .map(Command::SetDhwBoost)
                .ok_or_else(invalid),
            other => Err(Error::UnknownCapability(other.to_string())),
        }
    }

    pub fn capability(&self) -> &'static str {
        match self {
            Command::SetThermostatMode(_) => capability::THERMOSTAT_MODE,
            Command::SetTargetTemperature(_) => capability::TARGET_TEMPERATURE,
            Command::SetDhwMode(_) => capability::DHW_OPERATION_MODE,
            Command::SetDhwTemperature(_) => capability::TARGET_TEMPERATURE_DHW,
            Command::SetDhwBoost(_) => capability::DHW_BOOST,
        }
    }

    /// The requested capability value.
    pub fn value(&self) -> CapabilityValue {
        match self {
            Command::SetThermostatMode(mode) => mode.as_str().into(),
            Command::SetTargetTemperature(t) | Command::SetDhwTemperature(t) => (*t).into(),
            Command::SetDhwMode(mode) => mode.as_str().into(),
            Command::SetDhwBoost(on) => (*on).into(),
        }
    }

    /// Vendor writes that carry out this command, in the order they must be sent.
    pub fn plan(&self) -> Vec<VendorWrite> {
        match self {
            Command::SetThermostatMode(mode) => {
                let mut writes = vec![VendorWrite::new(
                    resource::HC_OPERATION_MODE,
                    json!(mode.vendor_mode()),
                )];
                if *mode == ThermostatMode::Off {
                    writes.push(VendorWrite::new(
                        resource::HC_MANUAL_SETPOINT,
                        json!(OFF_SETPOINT),
                    ));
                }
                writes
            }
            Command::SetTargetTemperature(t) => {
                vec![VendorWrite::new(resource::HC_MANUAL_SETPOINT, json!(t))]
            }
            Command::SetDhwMode(mode) => {
                vec![VendorWrite::new(resource::DHW_OPERATION_MODE, json!(mode))]
            }
            Command::SetDhwTemperature(t) => {
                vec![VendorWrite::new(resource::DHW_TEMP_LEVEL_ECO, json!(t))]
            }
            Command::SetDhwBoost(on) => {
                let charge = if *on { CHARGE_START } else { CHARGE_STOP };
                vec![VendorWrite::new(resource::DHW_CHARGE, json!(charge))]
            }
        }
    }
}
