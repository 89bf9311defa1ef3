use std::{collections::VecDeque, sync::Arc, time::Duration};

use color_eyre::Result;
use log::error;
use rumqttc::{AsyncClient, MqttOptions};
use tokio::{
    sync::{Notify, RwLock},
    task,
};

use crate::{
    mqtt::events::{handle_incoming_mqtt_event, IncomingMessage},
    settings::Settings,
};

#[derive(Clone)]
pub struct MqttClient {
    pub client: AsyncClient,
    pub unhandled_messages: Arc<RwLock<VecDeque<IncomingMessage>>>,
    pub notify: Arc<Notify>,
}

pub async fn mk_mqtt_client(settings: &Settings) -> Result<MqttClient> {
    let mut options = MqttOptions::new(
        settings.mqtt.id.clone(),
        settings.mqtt.host.clone(),
        settings.mqtt.port,
    );
    options.set_keep_alive(Duration::from_secs(5));

    if let (Some(username), Some(password)) = (&settings.mqtt.username, &settings.mqtt.password) {
        options.set_credentials(username.clone(), password.clone());
    }

    let (client, mut eventloop) = AsyncClient::new(options, 10);

    let mqtt_client = MqttClient {
        client,
        unhandled_messages: Default::default(),
        notify: Default::default(),
    };

    {
        let mqtt_client = mqtt_client.clone();
        let settings = settings.clone();

        task::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(event) => {
                        let result = handle_incoming_mqtt_event(event, &mqtt_client, &settings).await;

                        if let Err(e) = result {
                            error!("MQTT error: {:?}", e);
                        }
                    }
                    Err(e) => {
                        error!("MQTT connection error, reconnecting in 5 seconds: {:?}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        });
    }

    Ok(mqtt_client)
}
