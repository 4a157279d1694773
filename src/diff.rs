use serde_json::Value;

use crate::types::capability::*;
use crate::types::{CapabilityValue, Event};

/// Bar. Crossing below this from at or above it raises the low-pressure alarm.
pub const SYSTEM_PRESSURE_LOW_THRESHOLD: f64 = 1.0;

pub(crate) fn diff_json(
    previous: &Value,
    current: &Value,
    path_prefix: &str,
    changes: &mut Vec<(String, Value, Value)>,
) {
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                let path = if path_prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{path_prefix}.{key}")
                };
                match prev_map.get(key) {
                    Some(prev_val) => diff_json(prev_val, curr_val, &path, changes),
                    None => {
                        if curr_val.is_object() {
                            diff_json(&Value::Object(serde_json::Map::new()), curr_val, &path, changes);
                        } else {
                            changes.push((path, Value::Null, curr_val.clone()));
                        }
                    }
                }
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((path_prefix.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}

/// The trigger raised when `capability` moves from `old` to `new`.
///
/// Nothing fires for a first observation (`old` absent), an unchanged value,
/// or a capability without a trigger.
pub(crate) fn change_event(
    capability: &str,
    old: Option<&CapabilityValue>,
    new: &CapabilityValue,
) -> Option<Event> {
    let old = old?;
    if old == new {
        return None;
    }

    match capability {
        MEASURE_TEMPERATURE => Some(Event::TemperatureChanged {
            temperature: new.as_f64()?,
        }),
        MEASURE_TEMPERATURE_OUTDOOR => Some(Event::OutdoorTemperatureChanged {
            temperature: new.as_f64()?,
        }),
        MEASURE_TEMPERATURE_DHW => Some(Event::DhwTemperatureChanged {
            temperature: new.as_f64()?,
        }),
        MEASURE_TEMPERATURE_SUPPLY => Some(Event::SupplyTemperatureChanged {
            temperature: new.as_f64()?,
        }),
        MEASURE_TEMPERATURE_RETURN => Some(Event::ReturnTemperatureChanged {
            temperature: new.as_f64()?,
        }),
        HEAT_DEMAND => Some(if new.as_bool()? {
            Event::HeatDemandTrue
        } else {
            Event::HeatDemandFalse
        }),
        DHW_BOOST => Some(if new.as_bool()? {
            Event::DhwBoostTrue
        } else {
            Event::DhwBoostFalse
        }),
        THERMOSTAT_MODE => Some(Event::ThermostatModeChanged {
            mode: new.as_str()?.to_string(),
        }),
        HEAT_COOL_MODE => Some(Event::HeatCoolModeChanged {
            mode: new.as_str()?.to_string(),
        }),
        DHW_OPERATION_MODE => Some(Event::DhwModeChanged {
            mode: new.as_str()?.to_string(),
        }),
        MODULATION => Some(Event::ModulationChanged {
            modulation: new.as_f64()?,
        }),
        SYSTEM_PRESSURE => Some(Event::SystemPressureChanged {
            pressure: new.as_f64()?,
        }),
        _ => None,
    }
}

/// Falling-edge check for the low-pressure alarm. A first reading never fires.
pub(crate) fn pressure_dropped_low(previous: Option<f64>, current: f64) -> bool {
    matches!(previous, Some(prev) if prev >= SYSTEM_PRESSURE_LOW_THRESHOLD)
        && current < SYSTEM_PRESSURE_LOW_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn diff_detects_leaf_change() {
        let prev = json!({"heat_source": {"system_pressure": 1.4}});
        let curr = json!({"heat_source": {"system_pressure": 1.2}});
        let mut changes = vec![];
        diff_json(&prev, &curr, "", &mut changes);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].0, "heat_source.system_pressure");
        assert_eq!(changes[0].1, json!(1.4));
        assert_eq!(changes[0].2, json!(1.2));
    }

    #[test]
    fn diff_ignores_unchanged() {
        let val = json!({"dhw": {"actual_temp": 48.0, "charge": "stop"}});
        let mut changes = vec![];
        diff_json(&val, &val, "", &mut changes);
        assert!(changes.is_empty());
    }

    #[test]
    fn diff_detects_new_key() {
        let prev = json!({"dhw": {}});
        let curr = json!({"dhw": {"actual_temp": 48.0}});
        let mut changes = vec![];
        diff_json(&prev, &curr, "", &mut changes);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].0, "dhw.actual_temp");
    }

    #[test]
    fn first_observation_is_silent() {
        assert_eq!(change_event(MEASURE_TEMPERATURE, None, &21.0.into()), None);
    }

    #[test]
    fn unchanged_value_is_silent() {
        let v = CapabilityValue::from(21.0);
        assert_eq!(change_event(MEASURE_TEMPERATURE, Some(&v), &v), None);
    }

    #[test]
    fn temperature_change_carries_new_value() {
        let event = change_event(MEASURE_TEMPERATURE_OUTDOOR, Some(&4.0.into()), &3.5.into());
        assert_eq!(event, Some(Event::OutdoorTemperatureChanged { temperature: 3.5 }));
    }

    #[test]
    fn boolean_toggles_split_into_two_triggers() {
        assert_eq!(
            change_event(HEAT_DEMAND, Some(&false.into()), &true.into()),
            Some(Event::HeatDemandTrue)
        );
        assert_eq!(
            change_event(DHW_BOOST, Some(&true.into()), &false.into()),
            Some(Event::DhwBoostFalse)
        );
    }

    #[test]
    fn mode_change_carries_mode() {
        match change_event(DHW_OPERATION_MODE, Some(&"eco".into()), &"high".into()) {
            Some(Event::DhwModeChanged { mode }) => assert_eq!(mode, "high"),
            other => panic!("expected DhwModeChanged, got {other:?}"),
        }
    }

    #[test]
    fn capabilities_without_trigger() {
        assert_eq!(change_event(WORKING_HOURS, Some(&1.0.into()), &2.0.into()), None);
        assert_eq!(change_event(TARGET_TEMPERATURE, Some(&20.0.into()), &21.0.into()), None);
    }

    #[test]
    fn pressure_alarm_falling_edge_only() {
        assert!(pressure_dropped_low(Some(1.2), 0.9));
        assert!(pressure_dropped_low(Some(1.0), 0.99));
        assert!(!pressure_dropped_low(None, 0.5));
        assert!(!pressure_dropped_low(Some(0.9), 0.8));
        assert!(!pressure_dropped_low(Some(1.5), 1.0));
    }
}
