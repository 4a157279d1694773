use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde_json::json;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::capabilities::{CapabilityStore, Condition, MemoryCapabilities};
use crate::client::ApiClient;
use crate::command::Command;
use crate::diff::{change_event, pressure_dropped_low};
use crate::protocol::{CHARGE_START, CHARGE_STOP, resource, value_body};
use crate::settings::{DEFAULT_POLL_INTERVAL_SECS, poll_interval};
use crate::telemetry::Snapshot;
use crate::types::capability::*;
use crate::types::{Availability, CapabilityValue, Event, ThermostatMode};
use crate::{Error, Result};

pub const AUTH_EXPIRED_REASON: &str =
    "Authentication expired. Open the device settings and choose Repair to log in again.";
pub const UNREACHABLE_REASON: &str = "Unable to communicate with the device";

type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;
type AvailabilityCallback = Box<dyn Fn(&Availability) + Send + Sync>;

/// Result of writing one capability during a sync.
#[derive(Debug)]
pub struct FieldWrite {
    pub capability: &'static str,
    pub value: CapabilityValue,
    pub result: Result<()>,
}

/// Everything one sync cycle applied.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub writes: Vec<FieldWrite>,
    pub events: Vec<Event>,
}

impl SyncReport {
    pub fn failed_writes(&self) -> impl Iterator<Item = &FieldWrite> {
        self.writes.iter().filter(|w| w.result.is_err())
    }

    pub fn is_complete(&self) -> bool {
        self.failed_writes().next().is_none()
    }

    pub fn written(&self, capability: &str) -> Option<&CapabilityValue> {
        self.writes
            .iter()
            .find(|w| w.capability == capability && w.result.is_ok())
            .map(|w| &w.value)
    }
}

#[derive(Debug)]
pub enum SyncOutcome {
    /// Another sync was already running.
    Skipped,
    /// The device was removed while the snapshot was in flight.
    Discarded,
    Applied(SyncReport),
    /// Nothing could be read; the device is now unavailable for this reason.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Applied,
    /// Dropped because a sync cycle was applying vendor state.
    Ignored,
}

/// Raised while a sync cycle runs so that capability listeners do not echo
/// vendor state back as commands. Cleared on drop, whatever the exit path.
struct EchoGuard<'a>(&'a AtomicBool);

impl<'a> EchoGuard<'a> {
    fn engage(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for EchoGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct DeviceBuilder {
    gateway_id: String,
    api: ApiClient,
    capabilities: Option<Arc<dyn CapabilityStore>>,
    event_callbacks: Vec<EventCallback>,
    availability_callbacks: Vec<AvailabilityCallback>,
    poll_interval: Duration,
}

impl DeviceBuilder {
    pub fn new(gateway_id: impl Into<String>, api: ApiClient) -> Self {
        Self {
            gateway_id: gateway_id.into(),
            api,
            capabilities: None,
            event_callbacks: Vec::new(),
            availability_callbacks: Vec::new(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }

    pub fn capabilities(mut self, store: Arc<dyn CapabilityStore>) -> Self {
        self.capabilities = Some(store);
        self
    }

    pub fn on_event(mut self, f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.event_callbacks.push(Box::new(f));
        self
    }

    pub fn on_availability(mut self, f: impl Fn(&Availability) + Send + Sync + 'static) -> Self {
        self.availability_callbacks.push(Box::new(f));
        self
    }

    /// Poll period in seconds; 0 selects the default, values below 15 are raised to 15.
    pub fn poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval = poll_interval(secs);
        self
    }

    pub fn build(self) -> Arc<Device> {
        Arc::new(Device {
            gateway_id: self.gateway_id,
            api: self.api,
            capabilities: self
                .capabilities
                .unwrap_or_else(|| Arc::new(MemoryCapabilities::new())),
            event_callbacks: self.event_callbacks,
            availability_callbacks: self.availability_callbacks,
            sync_permit: Semaphore::new(1),
            applying: AtomicBool::new(false),
            previous_pressure: Mutex::new(None),
            availability: Mutex::new(Availability::Available),
            poll_interval: Mutex::new(self.poll_interval),
            poller: Mutex::new(None),
            removed: AtomicBool::new(false),
        })
    }
}

/// One paired heat pump: keeps capability state in step with the vendor
/// API and turns capability writes into vendor commands.
pub struct Device {
    gateway_id: String,
    api: ApiClient,
    capabilities: Arc<dyn CapabilityStore>,
    event_callbacks: Vec<EventCallback>,
    availability_callbacks: Vec<AvailabilityCallback>,
    sync_permit: Semaphore,
    applying: AtomicBool,
    previous_pressure: Mutex<Option<f64>>,
    availability: Mutex<Availability>,
    poll_interval: Mutex<Duration>,
    poller: Mutex<Option<Poller>>,
    removed: AtomicBool,
}

impl Device {
    pub fn builder(gateway_id: impl Into<String>, api: ApiClient) -> DeviceBuilder {
        DeviceBuilder::new(gateway_id, api)
    }

    pub fn gateway_id(&self) -> &str {
        &self.gateway_id
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn capability_value(&self, name: &str) -> Option<CapabilityValue> {
        self.capabilities.get(name)
    }

    pub fn check(&self, condition: &Condition) -> bool {
        condition.evaluate(self.capabilities.as_ref())
    }

    pub fn availability(&self) -> Availability {
        self.availability
            .lock()
            .map(|a| a.clone())
            .unwrap_or(Availability::Available)
    }

    /// Whether a sync cycle is currently applying vendor state.
    pub fn is_applying(&self) -> bool {
        self.applying.load(Ordering::SeqCst)
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }

    // -- Sync --

    /// Pull a fresh snapshot and reconcile capabilities against it.
    ///
    /// A call made while another sync runs returns [`SyncOutcome::Skipped`]
    /// without touching the network. Errors never escape: they become the
    /// device's availability.
    pub async fn sync(&self) -> SyncOutcome {
        let Ok(_permit) = self.sync_permit.try_acquire() else {
            debug!(gateway_id = %self.gateway_id, "sync skipped, already running");
            return SyncOutcome::Skipped;
        };
        let _echo = EchoGuard::engage(&self.applying);
        debug!(gateway_id = %self.gateway_id, "sync started");

        let snapshot = self.api.fetch_snapshot(&self.gateway_id).await;

        if self.is_removed() {
            debug!(gateway_id = %self.gateway_id, "device removed, discarding snapshot");
            return SyncOutcome::Discarded;
        }

        if let Some(error) = snapshot.failure() {
            let reason = if error.is_auth() {
                AUTH_EXPIRED_REASON
            } else {
                UNREACHABLE_REASON
            };
            warn!(gateway_id = %self.gateway_id, "failed to sync device state: {error}");
            self.set_availability(Availability::Unavailable(reason.to_string()));
            return SyncOutcome::Failed(reason.to_string());
        }

        let report = self.apply(&snapshot);

        for event in &report.events {
            for cb in &self.event_callbacks {
                cb(event);
            }
        }
        self.set_availability(Availability::Available);

        debug!(
            gateway_id = %self.gateway_id,
            writes = report.writes.len(),
            events = report.events.len(),
            "sync completed"
        );
        SyncOutcome::Applied(report)
    }

    /// Map a snapshot onto capabilities. Absent readings leave their
    /// capability untouched; groups apply in a fixed order.
    fn apply(&self, snapshot: &Snapshot) -> SyncReport {
        let mut apply = Apply {
            store: self.capabilities.as_ref(),
            report: SyncReport::default(),
        };

        let hc = &snapshot.heating_circuit;
        apply.number(MEASURE_TEMPERATURE, hc.room_temperature);
        apply.text(HEAT_COOL_MODE, hc.heat_cool_mode.as_deref());
        apply.number(TARGET_TEMPERATURE, hc.current_setpoint.or(hc.manual_setpoint));
        if let Some(mode) = &hc.operation_mode {
            apply.write(THERMOSTAT_MODE, ThermostatMode::from_vendor(mode).as_str());
        }

        let dhw = &snapshot.dhw;
        apply.text(DHW_OPERATION_MODE, dhw.operation_mode.as_deref());
        apply.number(MEASURE_TEMPERATURE_DHW, dhw.actual_temp);
        apply.number(TARGET_TEMPERATURE_DHW, dhw.level_eco.or(dhw.current_setpoint));
        if let Some(charge) = &dhw.charge {
            apply.write(DHW_BOOST, charge == CHARGE_START);
        }
        apply.number(DHW_CHARGE_REMAINING, dhw.remaining_charge_time);

        apply.number(MEASURE_TEMPERATURE_OUTDOOR, snapshot.outdoor_temperature);

        let hs = &snapshot.heat_source;
        apply.number(MEASURE_TEMPERATURE_SUPPLY, hs.supply_temperature);
        apply.number(MEASURE_TEMPERATURE_RETURN, hs.return_temperature);
        apply.number(MODULATION, hs.modulation);
        if let Some(pressure) = hs.system_pressure {
            apply.write(SYSTEM_PRESSURE, pressure);
            if let Ok(mut previous) = self.previous_pressure.lock() {
                if pressure_dropped_low(*previous, pressure) {
                    apply.report.events.push(Event::SystemPressureLow { pressure });
                }
                *previous = Some(pressure);
            }
        }
        if let Some(demand) = hs.heat_demand {
            apply.write(HEAT_DEMAND, demand);
        }
        if let Some(seconds) = hs.working_time {
            apply.write(WORKING_HOURS, (seconds / 3600.0).round());
        }

        for failed in apply.report.failed_writes() {
            warn!(capability = failed.capability, "capability write failed");
        }
        apply.report
    }

    fn set_availability(&self, next: Availability) {
        let changed = match self.availability.lock() {
            Ok(mut current) if *current != next => {
                *current = next.clone();
                true
            }
            _ => false,
        };
        if changed {
            if let Availability::Unavailable(reason) = &next {
                warn!(gateway_id = %self.gateway_id, reason = %reason, "device unavailable");
            }
            for cb in &self.availability_callbacks {
                cb(&next);
            }
        }
    }

    // -- Commands --

    /// Carry out a capability write and resync.
    ///
    /// Ignored while a sync cycle is applying. The vendor writes are sent in
    /// order and the first failure aborts the command. A DHW mode change is
    /// verified against the post-sync capability, since the vendor may
    /// accept the write and keep the old mode.
    pub async fn set_capability(&self, command: Command) -> Result<Dispatch> {
        let capability = command.capability();
        if self.is_applying() {
            debug!(capability, "ignoring command while sync applies vendor state");
            return Ok(Dispatch::Ignored);
        }

        let value = command.value();
        for write in command.plan() {
            self.api
                .log(|l| l.log_command(capability, &value_body(write.value.clone())));
            self.api
                .put_value(&self.gateway_id, write.resource, write.value)
                .await
                .map_err(|e| Error::command(capability, &value, Some(e)))?;
        }

        self.sync().await;

        if let Command::SetDhwMode(mode) = &command {
            let actual = self.capabilities.get(DHW_OPERATION_MODE);
            if actual.as_ref().and_then(|v| v.as_str()) != Some(mode.as_str()) {
                return Err(Error::command(capability, mode, None));
            }
        }
        Ok(Dispatch::Applied)
    }

    /// String-keyed entry point for platform capability listeners.
    pub async fn set_capability_value(&self, name: &str, value: CapabilityValue) -> Result<Dispatch> {
        let command = Command::from_capability(name, &value)?;
        self.set_capability(command).await
    }

    /// Start a DHW charge, optionally setting its duration first. A failed
    /// duration write is logged and the charge is started regardless.
    pub async fn start_dhw_charge(&self, duration_minutes: Option<u32>) -> Result<()> {
        if let Some(minutes) = duration_minutes
            && let Err(e) = self
                .api
                .put_value(&self.gateway_id, resource::DHW_CHARGE_DURATION, json!(minutes))
                .await
        {
            warn!(minutes, "failed to set charge duration: {e}");
        }
        self.api
            .put_value(&self.gateway_id, resource::DHW_CHARGE, json!(CHARGE_START))
            .await
            .map_err(|e| Error::command(DHW_BOOST, true, Some(e)))
    }

    pub async fn stop_dhw_charge(&self) -> Result<()> {
        self.api
            .put_value(&self.gateway_id, resource::DHW_CHARGE, json!(CHARGE_STOP))
            .await
            .map_err(|e| Error::command(DHW_BOOST, false, Some(e)))
    }

    /// Set duration and charge setpoint, then start the charge. Stops at the
    /// first failed write.
    pub async fn start_dhw_charge_with_settings(
        &self,
        duration_minutes: u32,
        temperature: f64,
    ) -> Result<()> {
        self.api
            .put_value(&self.gateway_id, resource::DHW_CHARGE_DURATION, json!(duration_minutes))
            .await
            .map_err(|e| Error::command("dhw_charge_duration", duration_minutes, Some(e)))?;
        self.api
            .put_value(&self.gateway_id, resource::DHW_CHARGE_SETPOINT, json!(temperature))
            .await
            .map_err(|e| Error::command("dhw_charge_setpoint", temperature, Some(e)))?;
        self.api
            .put_value(&self.gateway_id, resource::DHW_CHARGE, json!(CHARGE_START))
            .await
            .map_err(|e| Error::command(DHW_BOOST, true, Some(e)))
    }

    // -- Polling --

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
            .lock()
            .map(|d| *d)
            .unwrap_or(Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS))
    }

    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .map(|p| p.as_ref().is_some_and(|p| !p.task.is_finished()))
            .unwrap_or(false)
    }

    /// Sync every poll interval until stopped. Must be called from within a
    /// tokio runtime. The task holds only a weak reference to the device.
    pub fn start_polling(self: &Arc<Self>) {
        if self.is_removed() {
            return;
        }
        let period = self.poll_interval();
        let device: Weak<Device> = Arc::downgrade(self);
        let stop = Arc::new(Notify::new());
        let stopped = stop.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stopped.notified() => break,
                    _ = ticker.tick() => {}
                }
                let Some(device) = device.upgrade() else {
                    break;
                };
                if device.is_removed() {
                    break;
                }
                // runs to completion even if polling is stopped meanwhile
                device.sync().await;
            }
        });
        debug!(gateway_id = %self.gateway_id, ?period, "polling started");
        if let Ok(mut poller) = self.poller.lock()
            && let Some(previous) = poller.replace(Poller { stop, task })
        {
            previous.stop.notify_one();
        }
    }

    /// Stop the timer. A sync started by the last tick is left to finish.
    pub fn stop_polling(&self) {
        if let Ok(mut poller) = self.poller.lock()
            && let Some(previous) = poller.take()
        {
            previous.stop.notify_one();
            debug!(gateway_id = %self.gateway_id, "polling stopped");
        }
    }

    /// Change the poll period, restarting the timer if it is running.
    pub fn set_poll_interval(self: &Arc<Self>, secs: u64) {
        let period = poll_interval(secs);
        if let Ok(mut current) = self.poll_interval.lock() {
            *current = period;
        }
        if self.is_polling() {
            self.stop_polling();
            self.start_polling();
        }
    }

    /// Stop polling for good. A sync already in flight completes but its
    /// results are discarded.
    pub fn remove(&self) {
        self.removed.store(true, Ordering::SeqCst);
        self.stop_polling();
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

struct Poller {
    stop: Arc<Notify>,
    task: JoinHandle<()>,
}

struct Apply<'a> {
    store: &'a dyn CapabilityStore,
    report: SyncReport,
}

impl Apply<'_> {
    fn write(&mut self, capability: &'static str, value: impl Into<CapabilityValue>) {
        let value = value.into();
        let previous = self.store.get(capability);
        let result = self.store.set(capability, value.clone());
        if result.is_ok()
            && let Some(event) = change_event(capability, previous.as_ref(), &value)
        {
            self.report.events.push(event);
        }
        self.report.writes.push(FieldWrite {
            capability,
            value,
            result,
        });
    }

    fn number(&mut self, capability: &'static str, value: Option<f64>) {
        if let Some(v) = value {
            self.write(capability, v);
        }
    }

    fn text(&mut self, capability: &'static str, value: Option<&str>) {
        if let Some(v) = value {
            self.write(capability, v);
        }
    }
}
