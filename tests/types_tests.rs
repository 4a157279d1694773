use std::sync::Arc;

use bosch_homecom::{
    CapabilityValue, DeviceType, EXPIRY_BUFFER_MS, Event, MemorySettings, OAUTH_TOKEN_KEY,
    SettingsStore, ThermostatMode, Token, TokenStore,
};
use serde_json::json;

#[test]
fn thermostat_mode_vendor_mapping() {
    assert_eq!(ThermostatMode::from_vendor("manual"), ThermostatMode::Heat);
    assert_eq!(ThermostatMode::from_vendor("off"), ThermostatMode::Off);
    assert_eq!(ThermostatMode::from_vendor("auto"), ThermostatMode::Auto);
    assert_eq!(ThermostatMode::from_vendor("holiday"), ThermostatMode::Auto);

    assert_eq!(ThermostatMode::Heat.vendor_mode(), "manual");
    assert_eq!(ThermostatMode::Off.vendor_mode(), "manual");
    assert_eq!(ThermostatMode::Auto.vendor_mode(), "auto");
    assert_eq!(ThermostatMode::parse("cool"), None);
}

#[test]
fn device_type_matching_is_case_insensitive() {
    assert_eq!(DeviceType::from_system_info("CS7800iAW K40"), DeviceType::K40);
    assert_eq!(DeviceType::from_system_info("k30 RF"), DeviceType::K30);
    assert_eq!(DeviceType::from_system_info(""), DeviceType::Generic);
    assert!(!DeviceType::Generic.is_heat_pump());
    assert_eq!(DeviceType::K40.as_str(), "k40");
}

#[test]
fn capability_values_serialize_untagged() {
    assert_eq!(serde_json::to_value(CapabilityValue::from(21.5)).unwrap(), json!(21.5));
    assert_eq!(serde_json::to_value(CapabilityValue::from(true)).unwrap(), json!(true));
    assert_eq!(serde_json::to_value(CapabilityValue::from("eco")).unwrap(), json!("eco"));
    assert_eq!(CapabilityValue::from("eco").as_f64(), None);
}

#[test]
fn event_tokens() {
    assert_eq!(Event::DhwBoostTrue.name(), "dhw_boost_true");
    assert_eq!(Event::DhwBoostTrue.tokens(), json!({}));
    assert_eq!(
        Event::DhwModeChanged { mode: "high".into() }.tokens(),
        json!({"mode": "high"})
    );
    assert_eq!(
        Event::SystemPressureLow { pressure: 0.8 }.tokens(),
        json!({"pressure": 0.8})
    );
}

// -- Token store --

fn token_with_lifetime(expires_in: u64) -> Token {
    Token {
        refresh_token: Some("r".into()),
        expires_in: Some(expires_in),
        ..Token::bearer("a")
    }
}

#[test]
fn stored_token_is_stamped_and_valid() {
    let store = TokenStore::new(Arc::new(MemorySettings::new()));
    let stamped = store.store(&token_with_lifetime(3600)).unwrap();
    let stored_at = stamped.stored_at.expect("stamp set");

    assert_eq!(store.read(), Some(stamped));
    assert_eq!(store.access_token().as_deref(), Some("a"));
    assert!(store.is_valid_at(stored_at));
}

#[test]
fn token_expires_inside_buffer() {
    let store = TokenStore::new(Arc::new(MemorySettings::new()));
    let stored_at = store
        .store(&token_with_lifetime(3600))
        .unwrap()
        .stored_at
        .unwrap();
    let expires_at = stored_at + 3_600_000;

    assert!(store.is_valid_at(expires_at - EXPIRY_BUFFER_MS));
    assert!(!store.is_valid_at(expires_at - EXPIRY_BUFFER_MS + 1));
}

#[test]
fn token_without_lifetime_never_expires() {
    let token = Token::bearer("a");
    assert!(token.is_valid_at(i64::MAX));
    assert!(!Token::bearer("").is_valid_at(0));
}

#[test]
fn overflowing_lifetime_is_invalid() {
    let token = Token {
        expires_in: Some(u64::MAX / 2),
        stored_at: Some(1_700_000_000_000),
        ..Token::bearer("a")
    };
    assert!(!token.is_valid_at(1_700_000_000_000));

    let token = Token {
        expires_in: Some(3600),
        stored_at: Some(i64::MAX - 1000),
        ..Token::bearer("a")
    };
    assert!(!token.is_valid_at(0));
}

#[test]
fn stored_token_with_huge_lifetime_is_not_valid() {
    let settings = Arc::new(MemorySettings::new());
    settings
        .set(
            OAUTH_TOKEN_KEY,
            r#"{"access_token":"a","expires_in":18446744073709551615,"stored_at":1700000000000}"#,
        )
        .unwrap();
    let store = TokenStore::new(settings);
    assert!(store.read().is_some());
    assert!(!store.is_valid());
}

#[test]
fn malformed_or_missing_token_reads_as_none() {
    let settings = Arc::new(MemorySettings::new());
    let store = TokenStore::new(settings.clone());
    assert_eq!(store.read(), None);
    assert!(!store.is_valid());

    settings.set(OAUTH_TOKEN_KEY, "{not json").unwrap();
    assert_eq!(store.read(), None);
    assert_eq!(store.access_token(), None);
}

#[test]
fn clear_removes_token() {
    let store = TokenStore::new(Arc::new(MemorySettings::new()));
    store.store(&Token::bearer("a")).unwrap();
    store.clear().unwrap();
    assert_eq!(store.read(), None);
}
