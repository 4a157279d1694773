mod capabilities;
mod client;
mod command;
mod device;
mod diff;
mod error;
mod logger;
mod oauth;
pub mod protocol;
mod settings;
mod telemetry;
mod token;
mod types;

pub use capabilities::{CapabilityStore, Condition, MemoryCapabilities};
pub use client::{ApiClient, ApiClientBuilder};
pub use command::{Command, VendorWrite};
pub use device::{
    AUTH_EXPIRED_REASON, Device, DeviceBuilder, Dispatch, FieldWrite, SyncOutcome, SyncReport,
    UNREACHABLE_REASON,
};
pub use diff::SYSTEM_PRESSURE_LOW_THRESHOLD;
pub use error::{Error, Result};
pub use logger::MessageLogMode;
pub use oauth::{OAuthClient, OAuthClientBuilder};
pub use settings::{
    DEFAULT_POLL_INTERVAL_SECS, JsonFileSettings, MIN_POLL_INTERVAL_SECS, MemorySettings,
    OAUTH_TOKEN_KEY, POLL_INTERVAL_KEY, SettingsStore, poll_interval, read_poll_interval,
};
pub use telemetry::{DhwCircuit, FetchFailure, HeatSource, HeatingCircuit, Snapshot};
pub use token::{EXPIRY_BUFFER_MS, Token, TokenStore};
pub use types::*;
