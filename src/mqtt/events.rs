use color_eyre::Result;
use eyre::{eyre, WrapErr};
use log::{debug, error, warn};
use rumqttc::QoS;

use super::{mqtt_desk::SetRequest, topic};
use crate::{
    controller::{range::clamp_percentage, PositionController},
    desk::rest::HeightClient,
    protocols::mqtt::MqttClient,
    settings::Settings,
};

#[derive(Clone, Debug, PartialEq)]
pub enum IncomingMessage {
    /// The host wants the actuator to move
    SetTarget { id: String, target: f64 },
    /// The host asks for a fresh reading
    Refresh { id: String },
    /// Pushed height telemetry, keyed by actuator name
    Height { name: String, height: f64 },
}

impl IncomingMessage {
    /// Messages that make an earlier queued one obsolete.
    fn supersedes(&self, other: &IncomingMessage) -> bool {
        match (self, other) {
            (IncomingMessage::SetTarget { id: a, .. }, IncomingMessage::SetTarget { id: b, .. }) => {
                a == b
            }
            (IncomingMessage::Refresh { id: a }, IncomingMessage::Refresh { id: b }) => a == b,
            (
                IncomingMessage::Height { name: a, .. },
                IncomingMessage::Height { name: b, .. },
            ) => a == b,
            _ => false,
        }
    }
}

pub fn parse_publish(
    settings: &Settings,
    topic_name: &str,
    payload: &[u8],
) -> Result<Option<IncomingMessage>> {
    if let Some(id) = topic::extract(&settings.mqtt.cover_topic_set, "{id}", topic_name) {
        let request: SetRequest = serde_json::from_slice(payload)
            .wrap_err_with(|| format!("Invalid set request on {topic_name}"))?;

        return Ok(Some(IncomingMessage::SetTarget {
            id: id.to_string(),
            target: request.target_position,
        }));
    }

    if let Some(id) = topic::extract(&settings.mqtt.cover_topic_get, "{id}", topic_name) {
        return Ok(Some(IncomingMessage::Refresh { id: id.to_string() }));
    }

    if let Some(name) = topic::extract(&settings.mqtt.height_topic, "{name}", topic_name) {
        let height: f64 = std::str::from_utf8(payload)?
            .trim()
            .parse()
            .wrap_err_with(|| format!("Invalid height on {topic_name}"))?;

        if !height.is_finite() {
            return Err(eyre!("Invalid height on {topic_name}: {height}"));
        }

        return Ok(Some(IncomingMessage::Height {
            name: name.to_string(),
            height,
        }));
    }

    Ok(None)
}

/// Wildcard subscriptions for every topic we accept messages on.
pub fn subscriptions(settings: &Settings) -> Vec<String> {
    [
        (&settings.mqtt.cover_topic_set, "{id}"),
        (&settings.mqtt.cover_topic_get, "{id}"),
        (&settings.mqtt.height_topic, "{name}"),
    ]
    .into_iter()
    .map(|(template, placeholder)| topic::subscription(template, placeholder))
    .collect()
}

pub async fn handle_incoming_mqtt_event(
    event: rumqttc::Event,
    mqtt_client: &MqttClient,
    settings: &Settings,
) -> Result<()> {
    match event {
        rumqttc::Event::Incoming(rumqttc::Packet::ConnAck(_)) => {
            // (Re)subscribe after every connect, the broker may have lost our
            // session. Runs in its own task since the request channel is only
            // drained by the event loop calling us, and may already be full.
            let client = mqtt_client.client.clone();
            let topics = subscriptions(settings);

            tokio::spawn(async move {
                for topic in topics {
                    if let Err(e) = client.subscribe(&topic, QoS::AtMostOnce).await {
                        error!("Failed to subscribe to {topic}: {:?}", e);
                    }
                }
            });
        }
        rumqttc::Event::Incoming(rumqttc::Packet::Publish(msg)) => {
            let Some(message) = parse_publish(settings, &msg.topic, &msg.payload)? else {
                return Ok(());
            };

            debug!("MQTT message: {message:?}");

            // Push message to the unhandled messages queue, removing any
            // queued message it makes obsolete.
            let mut unhandled_messages = mqtt_client.unhandled_messages.write().await;
            unhandled_messages.retain(|m| !message.supersedes(m));
            unhandled_messages.push_back(message);

            // Notify controller task that there are new messages
            mqtt_client.notify.notify_one();
        }
        _ => {}
    }

    Ok(())
}

pub fn start_mqtt_events_loop<C: HeightClient>(
    mqtt_client: &MqttClient,
    controller: &PositionController<C>,
) {
    let unhandled_messages = mqtt_client.unhandled_messages.clone();
    let notify = mqtt_client.notify.clone();
    let controller = controller.clone();

    tokio::spawn(async move {
        loop {
            let next_message = {
                let mut unhandled_messages = unhandled_messages.write().await;
                unhandled_messages.pop_front()
            };

            match next_message {
                Some(message) => {
                    if let Err(e) = process_mqtt_message(message, &controller).await {
                        error!("Error while processing MQTT message: {:?}", e);
                    }
                }
                None => {
                    // Wait until we get notified that there are new messages.
                    notify.notified().await;
                }
            }
        }
    });
}

pub async fn process_mqtt_message<C: HeightClient>(
    message: IncomingMessage,
    controller: &PositionController<C>,
) -> Result<()> {
    match message {
        IncomingMessage::SetTarget { id, target } => {
            controller.request_move(&id, clamp_percentage(target)).await?;
        }
        IncomingMessage::Refresh { id } => {
            // The result reaches the host through the accessory channel
            let current = controller.current_position(&id).await?;
            let target = controller.target_position(&id).await?;
            let state = controller.position_state(&id).await?;

            debug!("Refreshed {id}: current {current}, target {target}, {state:?}");
        }
        IncomingMessage::Height { name, height } => {
            let Some(id) = controller.actuator_id_by_name(&name).await else {
                warn!("Ignoring height telemetry for unknown desk {name}");
                return Ok(());
            };

            controller.ingest_telemetry(&id, height).await?;
        }
    }

    Ok(())
}
