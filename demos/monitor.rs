use bosch_homecom::{
    ApiClient, Device, JsonFileSettings, OAuthClient, TokenStore, read_poll_interval,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

#[tokio::main]
async fn main() -> bosch_homecom::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let settings_path = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| "homecom.json".to_string());

    let settings = Arc::new(JsonFileSettings::new(settings_path));
    let store = TokenStore::new(settings.clone());
    let oauth = OAuthClient::builder().build();

    let token = match store.read() {
        Some(token) if store.is_valid() || token.refresh_token.is_some() => token,
        _ => {
            println!("Open this URL, log in, and paste the code from the final redirect:");
            println!("{}", oauth.authorization_url());
            print!("code: ");
            io::stdout().flush()?;
            let mut code = String::new();
            io::stdin().lock().read_line(&mut code)?;
            oauth.reauthorize(&code, &store).await?
        }
    };

    let client = ApiClient::builder()
        .oauth(oauth, token)
        .token_store(store)
        .build()?;

    let pumps = client.discover_heat_pumps().await?;
    let Some(pump) = pumps.into_iter().next() else {
        println!("No K30/K40 heat pump found on this account.");
        return Ok(());
    };
    println!(
        "Monitoring {} ({}, gateway {})",
        pump.name,
        pump.device_type.as_str(),
        pump.gateway_id
    );

    let period = read_poll_interval(settings.as_ref());
    let device = Device::builder(pump.gateway_id, client)
        .poll_interval_secs(period.as_secs())
        .on_event(|event| {
            println!("{}: {}", event.name(), event.tokens());
        })
        .on_availability(|availability| {
            println!("availability: {availability:?}");
        })
        .build();

    device.sync().await;
    for name in [
        "measure_temperature",
        "measure_temperature.outdoor",
        "measure_temperature.dhw",
        "thermostat_mode",
        "dhw_operation_mode",
        "system_pressure",
    ] {
        if let Some(value) = device.capability_value(name) {
            println!("{name} = {value}");
        }
    }

    device.start_polling();
    println!("Polling every {}s. Ctrl-C to stop.", device.poll_interval().as_secs());
    tokio::signal::ctrl_c().await?;
    device.remove();
    Ok(())
}
