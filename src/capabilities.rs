use std::collections::HashMap;
use std::sync::Mutex;

use crate::Result;
use crate::types::CapabilityValue;
use crate::types::capability::*;

/// Capability slots owned by the platform. The sync engine writes here and
/// reads the previous value to decide whether a trigger fires.
pub trait CapabilityStore: Send + Sync {
    fn get(&self, name: &str) -> Option<CapabilityValue>;
    fn set(&self, name: &str, value: CapabilityValue) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryCapabilities {
    values: Mutex<HashMap<String, CapabilityValue>>,
}

impl MemoryCapabilities {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CapabilityStore for MemoryCapabilities {
    fn get(&self, name: &str) -> Option<CapabilityValue> {
        self.values.lock().ok()?.get(name).cloned()
    }

    fn set(&self, name: &str, value: CapabilityValue) -> Result<()> {
        if let Ok(mut values) = self.values.lock() {
            values.insert(name.to_string(), value);
        }
        Ok(())
    }
}

/// Flow conditions evaluated against current capability values.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    DhwModeIs(String),
    TemperatureAbove(f64),
    OutdoorTemperatureAbove(f64),
    DhwTemperatureAbove(f64),
    HeatDemandIs,
    DhwBoostIs,
    ThermostatModeIs(String),
    HeatCoolModeIs(String),
    ModulationAbove(f64),
    SystemPressureAbove(f64),
}

impl Condition {
    /// Unset capabilities never satisfy a condition.
    pub fn evaluate(&self, store: &dyn CapabilityStore) -> bool {
        let above = |name: &str, limit: f64| {
            store
                .get(name)
                .and_then(|v| v.as_f64())
                .is_some_and(|v| v > limit)
        };
        let text_is = |name: &str, want: &str| {
            store
                .get(name)
                .is_some_and(|v| v.as_str() == Some(want))
        };
        let is_true = |name: &str| store.get(name).and_then(|v| v.as_bool()) == Some(true);

        match self {
            Condition::DhwModeIs(mode) => text_is(DHW_OPERATION_MODE, mode),
            Condition::TemperatureAbove(t) => above(MEASURE_TEMPERATURE, *t),
            Condition::OutdoorTemperatureAbove(t) => above(MEASURE_TEMPERATURE_OUTDOOR, *t),
            Condition::DhwTemperatureAbove(t) => above(MEASURE_TEMPERATURE_DHW, *t),
            Condition::HeatDemandIs => is_true(HEAT_DEMAND),
            Condition::DhwBoostIs => is_true(DHW_BOOST),
            Condition::ThermostatModeIs(mode) => text_is(THERMOSTAT_MODE, mode),
            Condition::HeatCoolModeIs(mode) => text_is(HEAT_COOL_MODE, mode),
            Condition::ModulationAbove(m) => above(MODULATION, *m),
            Condition::SystemPressureAbove(p) => above(SYSTEM_PRESSURE, *p),
        }
    }
}
