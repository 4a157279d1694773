use serde::Deserialize;
use serde_json::{Value, json};

pub const API_DOMAIN: &str = "https://pointt-api.bosch-thermotechnology.com";
pub const GATEWAYS_PATH: &str = "/pointt-api/api/v1/gateways/";

pub const OAUTH_DOMAIN: &str = "https://singlekey-id.com";
pub const OAUTH_AUTH_PATH: &str = "/auth/connect/authorize";
pub const OAUTH_TOKEN_PATH: &str = "/auth/connect/token";
pub const OAUTH_CLIENT_ID: &str = "762162C0-FA2D-4540-AE66-6489F189FADC";
pub const OAUTH_REDIRECT_URI: &str = "com.bosch.tt.dashtt.pointt://app/login";
pub const OAUTH_SCOPE: &str = "openid email profile offline_access pointt.gateway.claiming \
    pointt.gateway.removal pointt.gateway.list pointt.gateway.users \
    pointt.gateway.resource.dashapp pointt.castt.flow.token-exchange bacon hcc.tariff.read";

/// Fixed PKCE verifier accepted by the vendor's browser login.
pub const OAUTH_CODE_VERIFIER: &str =
    "AZbpLzMvXigq_jz7_riwNDV8BQYT30prXGDyRHdQMo0GYre3si9YJfG4b1U-QWERtOiX_9mCJE2SAPvJMeM2yA";
/// S256 challenge of [`OAUTH_CODE_VERIFIER`].
pub const OAUTH_CODE_CHALLENGE: &str = "Fc6eY3uMBJkFqa4VqcULuLuKC5Do70XMw7oa_Pxafw0";

/// Gateway resource paths, relative to `/gateways/<id>`.
pub mod resource {
    pub const FIRMWARE: &str = "/resource/gateway/versionFirmware";
    pub const SYSTEM_INFO: &str = "/resource/system/info";

    pub const HC_OPERATION_MODE: &str = "/resource/heatingCircuits/hc1/operationMode";
    pub const HC_HEAT_COOL_MODE: &str = "/resource/heatingCircuits/hc1/heatCoolMode";
    pub const HC_ROOM_TEMP: &str = "/resource/heatingCircuits/hc1/roomtemperature";
    pub const HC_ROOM_HUMIDITY: &str = "/resource/heatingCircuits/hc1/actualHumidity";
    pub const HC_CURRENT_SETPOINT: &str = "/resource/heatingCircuits/hc1/currentRoomSetpoint";
    pub const HC_MANUAL_SETPOINT: &str = "/resource/heatingCircuits/hc1/manualRoomSetpoint";

    pub const DHW_OPERATION_MODE: &str = "/resource/dhwCircuits/dhw1/operationMode";
    pub const DHW_CURRENT_TEMP_LEVEL: &str = "/resource/dhwCircuits/dhw1/currentTemperatureLevel";
    pub const DHW_TEMP_LEVEL_ECO: &str = "/resource/dhwCircuits/dhw1/temperatureLevels/eco";
    pub const DHW_TEMP_LEVEL_COMFORT: &str = "/resource/dhwCircuits/dhw1/temperatureLevels/comfort";
    pub const DHW_TEMP_LEVEL_ECOPLUS: &str = "/resource/dhwCircuits/dhw1/temperatureLevels/eco+";
    pub const DHW_ACTUAL_TEMP: &str = "/resource/dhwCircuits/dhw1/actualTemp";
    pub const DHW_CHARGE: &str = "/resource/dhwCircuits/dhw1/charge";
    pub const DHW_CHARGE_DURATION: &str = "/resource/dhwCircuits/dhw1/chargeDuration";
    pub const DHW_REMAINING_CHARGE_TIME: &str = "/resource/dhwCircuits/dhw1/chargeRemainingTime";
    pub const DHW_CHARGE_SETPOINT: &str = "/resource/dhwCircuits/dhw1/singleChargeSetpoint";

    pub const OUTDOOR_TEMP: &str = "/resource/system/sensors/temperatures/outdoor_t1";

    pub const HS_SUPPLY_TEMP: &str = "/resource/heatSources/actualSupplyTemperature";
    pub const HS_RETURN_TEMP: &str = "/resource/heatSources/returnTemperature";
    pub const HS_MODULATION: &str = "/resource/heatSources/actualModulation";
    pub const HS_SYSTEM_PRESSURE: &str = "/resource/heatSources/systemPressure";
    pub const HS_HEAT_DEMAND: &str = "/resource/heatSources/actualHeatDemand";
    pub const HS_WORKING_TIME: &str = "/resource/heatSources/workingTime/totalSystem";
}

/// Raw reading reported by an "open" (disconnected) sensor.
pub const OPEN_SENSOR_VALUE: f64 = -32768.0;

/// Setpoint written alongside manual mode when the thermostat is turned off.
pub const OFF_SETPOINT: f64 = 5.0;

pub const CHARGE_START: &str = "start";
pub const CHARGE_STOP: &str = "stop";

/// Vendor DHW operation modes as accepted by K30/K40 controllers.
pub mod dhw_mode {
    pub const OFF: &str = "Off";
    pub const ECO: &str = "eco";
    pub const LOW: &str = "low";
    pub const HIGH: &str = "high";
    pub const OWN_PROGRAM: &str = "ownprogram";
}

pub fn gateway_path(gateway_id: &str, resource: &str) -> String {
    format!("{GATEWAYS_PATH}{gateway_id}{resource}")
}

pub fn value_body(value: Value) -> Value {
    json!({ "value": value })
}

/// Standard envelope the vendor wraps every resource in.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceValue {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub value: Option<Value>,
    pub values: Option<Vec<Value>>,
    pub writeable: Option<bool>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub allowed_values: Option<Vec<String>>,
    pub step_size: Option<f64>,
    pub unit_of_measure: Option<String>,
}

impl ResourceValue {
    /// Numeric reading, treating the open-sensor sentinel as absent.
    pub fn number(&self) -> Option<f64> {
        self.value
            .as_ref()
            .and_then(|v| v.as_f64())
            .filter(|n| *n != OPEN_SENSOR_VALUE)
    }

    /// Non-empty string reading.
    pub fn text(&self) -> Option<&str> {
        self.value
            .as_ref()
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Demand-style flag carried in the `values` array: active iff the first
    /// entry is a non-empty string.
    pub fn first_value_active(&self) -> Option<bool> {
        let values = self.values.as_ref()?;
        Some(matches!(values.first(), Some(Value::String(s)) if !s.is_empty()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GatewayEntry {
    pub device_id: Option<String>,
    pub gateway_id: Option<String>,
    pub name: Option<String>,
    pub device_type: Option<String>,
}

/// The gateway listing is either a bare array or wrapped in `{"gateways": [...]}`.
pub(crate) fn parse_gateways(body: &Value) -> Vec<GatewayEntry> {
    let list = match body {
        Value::Array(_) => body,
        other => match other.get("gateways") {
            Some(list) => list,
            None => return vec![],
        },
    };
    serde_json::from_value(list.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_paths() {
        assert_eq!(
            gateway_path("101", resource::DHW_CHARGE),
            "/pointt-api/api/v1/gateways/101/resource/dhwCircuits/dhw1/charge"
        );
    }

    #[test]
    fn value_body_structure() {
        let body = value_body(json!("manual"));
        assert_eq!(body["value"], "manual");
        assert_eq!(value_body(json!(5.0))["value"], 5.0);
    }

    #[test]
    fn open_sensor_is_absent() {
        let rv: ResourceValue = serde_json::from_value(json!({"value": -32768})).unwrap();
        assert_eq!(rv.number(), None);
        let rv: ResourceValue = serde_json::from_value(json!({"value": 21.5})).unwrap();
        assert_eq!(rv.number(), Some(21.5));
    }

    #[test]
    fn demand_flag_from_values() {
        let active: ResourceValue =
            serde_json::from_value(json!({"values": ["heating"]})).unwrap();
        assert_eq!(active.first_value_active(), Some(true));
        let idle: ResourceValue = serde_json::from_value(json!({"values": [""]})).unwrap();
        assert_eq!(idle.first_value_active(), Some(false));
        let empty: ResourceValue = serde_json::from_value(json!({"values": []})).unwrap();
        assert_eq!(empty.first_value_active(), Some(false));
        let missing: ResourceValue = serde_json::from_value(json!({"value": 1})).unwrap();
        assert_eq!(missing.first_value_active(), None);
    }

    #[test]
    fn envelope_metadata() {
        let rv: ResourceValue = serde_json::from_value(json!({
            "id": "/dhwCircuits/dhw1/operationMode",
            "type": "stringValue",
            "value": "eco",
            "writeable": true,
            "allowedValues": ["Off", "eco", "high"]
        }))
        .unwrap();
        assert_eq!(rv.kind.as_deref(), Some("stringValue"));
        assert_eq!(rv.text(), Some("eco"));
        assert_eq!(rv.allowed_values.unwrap().len(), 3);
    }

    #[test]
    fn gateways_bare_and_wrapped() {
        let bare = json!([{"deviceId": "101", "deviceType": "K40"}]);
        assert_eq!(parse_gateways(&bare)[0].device_id.as_deref(), Some("101"));
        let wrapped = json!({"gateways": [{"gatewayId": "202"}]});
        assert_eq!(parse_gateways(&wrapped)[0].gateway_id.as_deref(), Some("202"));
        assert!(parse_gateways(&json!({})).is_empty());
    }
}
