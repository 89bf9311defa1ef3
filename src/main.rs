use std::{sync::Arc, time::Duration};

use color_eyre::Result;
use controller::{ControllerOptions, PositionController};
use desk::{
    discovery::discover_actuators, polling::start_desk_poll_loop, rest::DeskServerClient,
};
use log::info;
use mqtt::{accessory::start_accessory_loop, events::start_mqtt_events_loop};
use protocols::{
    https::{mk_hyper_https_client, DeskServerHttp},
    mqtt::mk_mqtt_client,
};

use crate::settings::read_settings;

mod controller;
mod desk;
mod error;
mod mqtt;
mod protocols;
mod settings;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();

    let settings = read_settings()?;
    settings.validate()?;
    let range = settings.travel_range()?;

    let https_client = mk_hyper_https_client(&settings)?;
    let desk_client = DeskServerClient::new(DeskServerHttp::new(&settings, https_client)?);

    let discovered = discover_actuators(&settings, &desk_client).await?;
    let actuators: Vec<_> = discovered.iter().map(|d| d.actuator.clone()).collect();

    let (controller, accessory_rx) = PositionController::new(
        Arc::new(desk_client),
        range,
        ControllerOptions::from_settings(&settings),
    );

    let mqtt_client = mk_mqtt_client(&settings).await?;
    start_accessory_loop(accessory_rx, &actuators, &settings, &mqtt_client);

    for discovered in discovered {
        let initial = discovered.initial_position(&controller.range());
        controller.register(discovered.actuator, initial).await;
    }

    start_mqtt_events_loop(&mqtt_client, &controller);

    if let Some(seconds) = settings.controller.poll_interval_seconds {
        start_desk_poll_loop(&controller, Duration::from_secs(seconds));
    }

    info!(
        "Controlling {} actuator(s), travel range {}..{}",
        actuators.len(),
        range.base(),
        range.max()
    );

    tokio::signal::ctrl_c().await?;

    Ok(())
}
