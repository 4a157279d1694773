use serde::Serialize;
use tracing::debug;

use crate::Error;
use crate::client::ApiClient;
use crate::protocol::{ResourceValue, resource};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeatingCircuit {
    pub operation_mode: Option<String>,
    pub room_temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub current_setpoint: Option<f64>,
    pub manual_setpoint: Option<f64>,
    pub heat_cool_mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DhwCircuit {
    pub operation_mode: Option<String>,
    pub actual_temp: Option<f64>,
    pub current_setpoint: Option<f64>,
    pub level_eco: Option<f64>,
    pub level_comfort: Option<f64>,
    pub level_eco_plus: Option<f64>,
    pub charge: Option<String>,
    pub charge_duration: Option<f64>,
    pub remaining_charge_time: Option<f64>,
    pub charge_setpoint: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeatSource {
    pub supply_temperature: Option<f64>,
    pub return_temperature: Option<f64>,
    pub modulation: Option<f64>,
    pub system_pressure: Option<f64>,
    pub heat_demand: Option<bool>,
    pub working_time: Option<f64>,
}

/// A resource fetch that failed while assembling a snapshot.
#[derive(Debug)]
pub struct FetchFailure {
    pub resource: &'static str,
    pub error: Error,
}

/// Point-in-time readings of one gateway. Every field is independently
/// optional; an absent reading is not zero.
#[derive(Debug, Default, Serialize)]
pub struct Snapshot {
    pub heating_circuit: HeatingCircuit,
    pub dhw: DhwCircuit,
    pub outdoor_temperature: Option<f64>,
    pub heat_source: HeatSource,
    #[serde(skip)]
    pub failures: Vec<FetchFailure>,
}

impl Snapshot {
    /// True when no reading at all was obtained.
    pub fn is_empty(&self) -> bool {
        self.heating_circuit == HeatingCircuit::default()
            && self.dhw == DhwCircuit::default()
            && self.outdoor_temperature.is_none()
            && self.heat_source == HeatSource::default()
    }

    /// The error to report when nothing could be read. Auth failures win
    /// over transport failures so the device asks for a new login.
    pub fn failure(&self) -> Option<&Error> {
        if !self.is_empty() {
            return None;
        }
        self.failures
            .iter()
            .find(|f| f.error.is_auth())
            .or_else(|| self.failures.first())
            .map(|f| &f.error)
    }
}

struct Fetch<'a> {
    api: &'a ApiClient,
    gateway_id: &'a str,
    failures: Vec<FetchFailure>,
}

impl Fetch<'_> {
    async fn resource(&mut self, resource: &'static str) -> Option<ResourceValue> {
        match self.api.get_value(self.gateway_id, resource).await {
            Ok(v) => Some(v),
            Err(error) => {
                debug!(resource, "reading unavailable: {error}");
                self.failures.push(FetchFailure { resource, error });
                None
            }
        }
    }

    async fn number(&mut self, resource: &'static str) -> Option<f64> {
        self.resource(resource).await?.number()
    }

    async fn text(&mut self, resource: &'static str) -> Option<String> {
        self.resource(resource).await?.text().map(str::to_string)
    }

    /// String reading kept even when empty.
    async fn raw_text(&mut self, resource: &'static str) -> Option<String> {
        let value = self.resource(resource).await?.value?;
        value.as_str().map(str::to_string)
    }

    async fn heating_circuit(&mut self) -> HeatingCircuit {
        HeatingCircuit {
            room_temperature: self.number(resource::HC_ROOM_TEMP).await,
            humidity: self.number(resource::HC_ROOM_HUMIDITY).await,
            current_setpoint: self.number(resource::HC_CURRENT_SETPOINT).await,
            manual_setpoint: self.number(resource::HC_MANUAL_SETPOINT).await,
            operation_mode: self.text(resource::HC_OPERATION_MODE).await,
            heat_cool_mode: self.text(resource::HC_HEAT_COOL_MODE).await,
        }
    }

    async fn dhw(&mut self) -> DhwCircuit {
        DhwCircuit {
            operation_mode: self.text(resource::DHW_OPERATION_MODE).await,
            actual_temp: self.number(resource::DHW_ACTUAL_TEMP).await,
            current_setpoint: self.number(resource::DHW_CURRENT_TEMP_LEVEL).await,
            level_eco: self.number(resource::DHW_TEMP_LEVEL_ECO).await,
            level_comfort: self.number(resource::DHW_TEMP_LEVEL_COMFORT).await,
            level_eco_plus: self.number(resource::DHW_TEMP_LEVEL_ECOPLUS).await,
            charge: self.raw_text(resource::DHW_CHARGE).await,
            charge_duration: self.number(resource::DHW_CHARGE_DURATION).await,
            remaining_charge_time: self.number(resource::DHW_REMAINING_CHARGE_TIME).await,
            charge_setpoint: self.number(resource::DHW_CHARGE_SETPOINT).await,
        }
    }

    async fn heat_source(&mut self) -> HeatSource {
        HeatSource {
            supply_temperature: self.number(resource::HS_SUPPLY_TEMP).await,
            return_temperature: self.number(resource::HS_RETURN_TEMP).await,
            modulation: self.number(resource::HS_MODULATION).await,
            system_pressure: self.number(resource::HS_SYSTEM_PRESSURE).await,
            heat_demand: self
                .resource(resource::HS_HEAT_DEMAND)
                .await
                .and_then(|v| v.first_value_active()),
            working_time: self.number(resource::HS_WORKING_TIME).await,
        }
    }
}

impl ApiClient {
    /// Read every tracked resource of a gateway into one snapshot.
    ///
    /// Never fails: unreadable resources are left absent and recorded in
    /// [`Snapshot::failures`]. Groups are read in a fixed order (heating
    /// circuit, hot water, outdoor, heat source).
    pub async fn fetch_snapshot(&self, gateway_id: &str) -> Snapshot {
        let mut fetch = Fetch {
            api: self,
            gateway_id,
            failures: Vec::new(),
        };

        let heating_circuit = fetch.heating_circuit().await;
        let dhw = fetch.dhw().await;
        let outdoor_temperature = fetch.number(resource::OUTDOOR_TEMP).await;
        let heat_source = fetch.heat_source().await;

        let snapshot = Snapshot {
            heating_circuit,
            dhw,
            outdoor_temperature,
            heat_source,
            failures: fetch.failures,
        };

        if let Ok(body) = serde_json::to_value(&snapshot) {
            self.log(|l| l.log_snapshot(&body));
        }
        snapshot
    }
}
