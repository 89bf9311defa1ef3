use color_eyre::Result;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use super::topic;
use crate::{controller::motion::MotionState, protocols::mqtt::MqttClient, settings::Settings};

/// Retained state document for one actuator, published on the cover topic.
#[derive(Builder, Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[builder(setter(into, strip_option), default)]
pub struct MqttDesk {
    pub id: String,
    pub name: String,
    pub current_position: Option<u8>,
    pub target_position: Option<u8>,
    pub position_state: Option<MotionState>,
    pub available: Option<bool>,
}

/// Payload accepted on the set topic. Values outside 0..=100 are clamped.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SetRequest {
    pub target_position: f64,
}

pub async fn publish_mqtt_desk(
    mqtt_client: &MqttClient,
    settings: &Settings,
    mqtt_desk: &MqttDesk,
) -> Result<()> {
    let topic = topic::render(&settings.mqtt.cover_topic, "{id}", &mqtt_desk.id);

    let json = serde_json::to_string(&mqtt_desk)?;

    mqtt_client
        .client
        .publish(topic, rumqttc::QoS::AtLeastOnce, true, json)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_state_document() {
        let desk = MqttDeskBuilder::default()
            .id("office")
            .name("Office")
            .current_position(40u8)
            .target_position(60u8)
            .position_state(MotionState::Increasing)
            .available(true)
            .build()
            .unwrap();

        let json: serde_json::Value = serde_json::to_value(&desk).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "office",
                "name": "Office",
                "current_position": 40,
                "target_position": 60,
                "position_state": "increasing",
                "available": true,
            })
        );
    }

    #[test]
    fn set_request_accepts_fractions() {
        let request: SetRequest = serde_json::from_str(r#"{"target_position": 42.5}"#).unwrap();

        assert_eq!(request.target_position, 42.5);
    }
}
