use std::time::Duration;

use futures::future::join_all;
use log::debug;

use crate::{controller::PositionController, desk::rest::HeightClient};

/// Periodically read every actuator's height from the desk server.
///
/// Push telemetry only covers desks the MQTT feed knows about, and a desk
/// moved by its own buttons is otherwise only noticed when the host asks.
pub fn start_desk_poll_loop<C: HeightClient>(
    controller: &PositionController<C>,
    interval: Duration,
) {
    let controller = controller.clone();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let actuators = controller.actuators().await;
            let results = join_all(
                actuators
                    .iter()
                    .map(|actuator| controller.current_position(&actuator.id)),
            )
            .await;

            for (actuator, result) in actuators.iter().zip(results) {
                // Failures are already reported as unresponsive by the controller
                if let Err(e) = result {
                    debug!("Failed to poll {}: {e}", actuator.name);
                }
            }
        }
    });
}
