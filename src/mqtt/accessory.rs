use std::collections::HashMap;

use log::{debug, error};

use super::mqtt_desk::{publish_mqtt_desk, MqttDesk, MqttDeskBuilder};
use crate::{
    controller::{AccessoryRx, AccessoryUpdate},
    desk::actuator::Actuator,
    protocols::mqtt::MqttClient,
    settings::Settings,
};

pub fn actuators_to_mqtt_desks(actuators: &[Actuator]) -> HashMap<String, MqttDesk> {
    actuators
        .iter()
        .map(|actuator| {
            let mqtt_desk = MqttDeskBuilder::default()
                .id(actuator.id.clone())
                .name(actuator.name.clone())
                .build()
                .unwrap_or_default();

            (actuator.id.clone(), mqtt_desk)
        })
        .collect()
}

/// Folds a controller update into the matching state document and returns
/// the document to publish.
pub fn apply_accessory_update(
    mqtt_desks: &mut HashMap<String, MqttDesk>,
    update: AccessoryUpdate,
) -> Option<MqttDesk> {
    let id = match &update {
        AccessoryUpdate::CurrentPosition { id, .. }
        | AccessoryUpdate::TargetPosition { id, .. }
        | AccessoryUpdate::PositionState { id, .. }
        | AccessoryUpdate::Unresponsive { id, .. } => id.clone(),
    };

    let mqtt_desk = mqtt_desks.get_mut(&id)?;

    match update {
        AccessoryUpdate::CurrentPosition { position, .. } => {
            mqtt_desk.current_position = Some(position);
            mqtt_desk.available = Some(true);
        }
        AccessoryUpdate::TargetPosition { position, .. } => {
            mqtt_desk.target_position = Some(position);
        }
        AccessoryUpdate::PositionState { state, .. } => {
            mqtt_desk.position_state = Some(state);
        }
        AccessoryUpdate::Unresponsive { reason, .. } => {
            debug!("Marking {id} unavailable: {reason}");
            mqtt_desk.available = Some(false);
        }
    }

    Some(mqtt_desk.clone())
}

/// Mirrors controller state to the cover topics.
pub fn start_accessory_loop(
    mut accessory_rx: AccessoryRx,
    actuators: &[Actuator],
    settings: &Settings,
    mqtt_client: &MqttClient,
) {
    let mut mqtt_desks = actuators_to_mqtt_desks(actuators);
    let settings = settings.clone();
    let mqtt_client = mqtt_client.clone();

    tokio::spawn(async move {
        while let Some(update) = accessory_rx.recv().await {
            let Some(mqtt_desk) = apply_accessory_update(&mut mqtt_desks, update) else {
                continue;
            };

            if let Err(e) = publish_mqtt_desk(&mqtt_client, &settings, &mqtt_desk).await {
                error!("{:?}", e);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::motion::MotionState;

    fn desks() -> HashMap<String, MqttDesk> {
        actuators_to_mqtt_desks(&[Actuator::single("d1", "Left")])
    }

    #[test]
    fn updates_accumulate_into_one_document() {
        let mut mqtt_desks = desks();

        apply_accessory_update(
            &mut mqtt_desks,
            AccessoryUpdate::TargetPosition {
                id: "d1".into(),
                position: 70,
            },
        );
        let mqtt_desk = apply_accessory_update(
            &mut mqtt_desks,
            AccessoryUpdate::PositionState {
                id: "d1".into(),
                state: MotionState::Increasing,
            },
        )
        .unwrap();

        assert_eq!(mqtt_desk.name, "Left");
        assert_eq!(mqtt_desk.target_position, Some(70));
        assert_eq!(mqtt_desk.position_state, Some(MotionState::Increasing));
        assert_eq!(mqtt_desk.current_position, None);
    }

    #[test]
    fn unresponsive_until_next_reading() {
        let mut mqtt_desks = desks();

        let mqtt_desk = apply_accessory_update(
            &mut mqtt_desks,
            AccessoryUpdate::Unresponsive {
                id: "d1".into(),
                reason: "timed out".into(),
            },
        )
        .unwrap();
        assert_eq!(mqtt_desk.available, Some(false));

        let mqtt_desk = apply_accessory_update(
            &mut mqtt_desks,
            AccessoryUpdate::CurrentPosition {
                id: "d1".into(),
                position: 30,
            },
        )
        .unwrap();
        assert_eq!(mqtt_desk.available, Some(true));
        assert_eq!(mqtt_desk.current_position, Some(30));
    }

    #[test]
    fn unknown_actuator_is_ignored() {
        let mut mqtt_desks = desks();

        let result = apply_accessory_update(
            &mut mqtt_desks,
            AccessoryUpdate::CurrentPosition {
                id: "ghost".into(),
                position: 30,
            },
        );

        assert!(result.is_none());
    }
}
