use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use log::{debug, info, warn};
use tokio::sync::{mpsc, RwLock};

use self::{debounce::PendingMove, motion::MotionState, range::TravelRange};
use crate::{
    desk::{
        actuator::{Actuator, ActuatorKind},
        rest::HeightClient,
    },
    error::{ControllerError, TransportError},
    settings::Settings,
};

pub mod debounce;
pub mod motion;
pub mod range;

/// State changes the accessory side needs to mirror.
#[derive(Clone, Debug, PartialEq)]
pub enum AccessoryUpdate {
    CurrentPosition { id: String, position: u8 },
    TargetPosition { id: String, position: u8 },
    PositionState { id: String, state: MotionState },
    /// One operation against the desk server failed
    Unresponsive { id: String, reason: String },
}

pub type AccessoryTx = mpsc::UnboundedSender<AccessoryUpdate>;
pub type AccessoryRx = mpsc::UnboundedReceiver<AccessoryUpdate>;

#[derive(Clone, Debug)]
pub struct ControllerOptions {
    pub settle: Duration,
    pub dispatch: Duration,
    pub request_timeout: Duration,
    pub sync_target_on_read: bool,
}

impl ControllerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        ControllerOptions {
            settle: Duration::from_millis(settings.controller.settle_ms),
            dispatch: Duration::from_millis(settings.controller.dispatch_ms),
            request_timeout: settings.request_timeout(),
            sync_target_on_read: settings.controller.sync_target_on_read,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionState {
    pub current: u8,
    pub target: u8,
}

struct ActuatorSlot {
    actuator: Actuator,
    position: PositionState,
    pending: PendingMove,
}

impl ActuatorSlot {
    /// Where the desk is headed. A pending or in-flight move wins over the
    /// stored target since reads may have synced the latter back to the
    /// current position.
    fn heading(&self) -> u8 {
        self.pending
            .target()
            .or(self.pending.in_flight())
            .unwrap_or(self.position.target)
    }
}

/// Owns position state for every actuator and turns host requests into
/// debounced height commands.
pub struct PositionController<C> {
    client: Arc<C>,
    range: TravelRange,
    options: ControllerOptions,
    slots: Arc<RwLock<HashMap<String, ActuatorSlot>>>,
    accessory_tx: AccessoryTx,
}

impl<C> Clone for PositionController<C> {
    fn clone(&self) -> Self {
        PositionController {
            client: self.client.clone(),
            range: self.range,
            options: self.options.clone(),
            slots: self.slots.clone(),
            accessory_tx: self.accessory_tx.clone(),
        }
    }
}

impl<C: HeightClient> PositionController<C> {
    pub fn new(
        client: Arc<C>,
        range: TravelRange,
        options: ControllerOptions,
    ) -> (Self, AccessoryRx) {
        let (accessory_tx, accessory_rx) = mpsc::unbounded_channel();

        let controller = PositionController {
            client,
            range,
            options,
            slots: Default::default(),
            accessory_tx,
        };

        (controller, accessory_rx)
    }

    pub fn range(&self) -> TravelRange {
        self.range
    }

    /// Starts tracking `actuator` with both positions at `initial`.
    pub async fn register(&self, actuator: Actuator, initial: u8) {
        debug!("Registering actuator {} ({})", actuator.name, actuator.id);

        let id = actuator.id.clone();
        let slot = ActuatorSlot {
            actuator,
            position: PositionState {
                current: initial,
                target: initial,
            },
            pending: PendingMove::default(),
        };

        {
            let mut slots = self.slots.write().await;

            if let Some(other) = slots.values().find(|other| {
                other.actuator.id != id && other.actuator.name == slot.actuator.name
            }) {
                warn!(
                    "Actuators {} and {id} share the name {}, telemetry prefers the single desk",
                    other.actuator.id, slot.actuator.name
                );
            }

            if let Some(replaced) = slots.insert(id.clone(), slot) {
                warn!(
                    "Actuator id {id} registered twice, {} replaces {}",
                    slots[&id].actuator.name, replaced.actuator.name
                );
            }
        }

        self.publish(AccessoryUpdate::CurrentPosition {
            id: id.clone(),
            position: initial,
        });
        self.publish(AccessoryUpdate::TargetPosition {
            id: id.clone(),
            position: initial,
        });
        self.publish(AccessoryUpdate::PositionState {
            id,
            state: MotionState::Stopped,
        });
    }

    pub async fn actuators(&self) -> Vec<Actuator> {
        let slots = self.slots.read().await;
        slots.values().map(|slot| slot.actuator.clone()).collect()
    }

    /// Resolves a desk name from telemetry. Single desks win over groups of
    /// the same name since telemetry always comes from one physical desk.
    pub async fn actuator_id_by_name(&self, name: &str) -> Option<String> {
        let slots = self.slots.read().await;
        slots
            .values()
            .filter(|slot| slot.actuator.name == name)
            .min_by_key(|slot| {
                let is_group = matches!(slot.actuator.kind, ActuatorKind::Group { .. });
                (is_group, slot.actuator.id.clone())
            })
            .map(|slot| slot.actuator.id.clone())
    }

    pub async fn position(&self, id: &str) -> Result<PositionState, ControllerError> {
        let slots = self.slots.read().await;
        let slot = slots
            .get(id)
            .ok_or_else(|| ControllerError::UnknownActuator(id.to_string()))?;

        Ok(slot.position)
    }

    pub async fn target_position(&self, id: &str) -> Result<u8, ControllerError> {
        Ok(self.position(id).await?.target)
    }

    pub async fn position_state(&self, id: &str) -> Result<MotionState, ControllerError> {
        let slots = self.slots.read().await;
        let slot = slots
            .get(id)
            .ok_or_else(|| ControllerError::UnknownActuator(id.to_string()))?;

        Ok(MotionState::derive(slot.position.current, slot.heading()))
    }

    /// Records `target` right away and schedules a move to it once requests
    /// for this actuator have been quiet for the settle delay.
    pub async fn request_move(&self, id: &str, target: u8) -> Result<(), ControllerError> {
        let target = target.min(100);

        {
            let mut slots = self.slots.write().await;
            let slot = slots
                .get_mut(id)
                .ok_or_else(|| ControllerError::UnknownActuator(id.to_string()))?;

            let generation = slot.pending.rearm(target);
            slot.position.target = target;

            debug!("Target for {id} set to {target}, waiting {:?} to settle", self.options.settle);

            let handle = tokio::spawn(self.clone().run_pending_move(id.to_string(), generation));
            slot.pending.attach(handle);
        }

        self.publish(AccessoryUpdate::TargetPosition {
            id: id.to_string(),
            position: target,
        });

        Ok(())
    }

    async fn run_pending_move(self, id: String, generation: u64) {
        tokio::time::sleep(self.options.settle).await;

        {
            let slots = self.slots.read().await;
            let state = match slots.get(&id) {
                Some(slot) if slot.pending.is_current(generation) => {
                    MotionState::derive(slot.position.current, slot.heading())
                }
                _ => return,
            };

            // Announce motion before the command goes out. Published under
            // the lock so a newer request can't slip in between.
            self.publish(AccessoryUpdate::PositionState {
                id: id.clone(),
                state,
            });
        }

        tokio::time::sleep(self.options.dispatch).await;

        let dispatch = {
            let mut slots = self.slots.write().await;
            slots.get_mut(&id).and_then(|slot| {
                let target = slot.pending.take_for_dispatch(generation)?;
                Some((slot.actuator.clone(), target))
            })
        };

        let Some((actuator, target)) = dispatch else {
            return;
        };

        // Failures were already reported to the accessory side
        let _ = self.execute_move(&actuator, target).await;

        if let Some(slot) = self.slots.write().await.get_mut(&id) {
            slot.pending.finish(generation);
        }
    }

    /// Sends the height command for `target` and waits for one readback as a
    /// completion barrier. Position state is only touched on success.
    pub async fn execute_move(&self, actuator: &Actuator, target: u8) -> Result<(), ControllerError> {
        let height = self.range.percentage_to_height(f64::from(target));

        debug!(
            "Moving {} to {target}% ({height}) via {}",
            actuator.name,
            actuator.height_target().path()
        );

        let result = async {
            self.with_timeout(self.client.set_height(actuator.height_target(), height))
                .await?;

            if let Some(desk_id) = actuator.readback_desk() {
                self.with_timeout(self.client.get_height(desk_id)).await?;
            }

            Ok::<(), TransportError>(())
        }
        .await;

        if let Err(e) = result {
            return Err(self.report_unresponsive(&actuator.id, e));
        }

        info!("Moved {} to {target}%", actuator.name);

        let mut slots = self.slots.write().await;
        let Some(slot) = slots.get_mut(&actuator.id) else {
            return Ok(());
        };

        slot.position.current = target;

        self.publish(AccessoryUpdate::CurrentPosition {
            id: actuator.id.clone(),
            position: target,
        });

        // A read while the move was under way may have synced the target back
        if slot.pending.target().is_none() && slot.position.target != target {
            slot.position.target = target;

            self.publish(AccessoryUpdate::TargetPosition {
                id: actuator.id.clone(),
                position: target,
            });
        }

        self.publish(AccessoryUpdate::PositionState {
            id: actuator.id.clone(),
            state: MotionState::derive(slot.position.current, slot.heading()),
        });

        Ok(())
    }

    /// Reads the actuator's height from the desk server and folds it into
    /// the current position.
    pub async fn current_position(&self, id: &str) -> Result<u8, ControllerError> {
        let (actuator, cached) = {
            let slots = self.slots.read().await;
            let slot = slots
                .get(id)
                .ok_or_else(|| ControllerError::UnknownActuator(id.to_string()))?;
            (slot.actuator.clone(), slot.position.current)
        };

        let Some(desk_id) = actuator.readback_desk() else {
            return Ok(cached);
        };

        let height = match self.with_timeout(self.client.get_height(desk_id)).await {
            Ok(height) => height,
            Err(e) => return Err(self.report_unresponsive(id, e)),
        };

        let position = self.range.height_to_percentage(height);

        let synced_target = {
            let mut slots = self.slots.write().await;
            let Some(slot) = slots.get_mut(id) else {
                return Ok(position);
            };

            slot.position.current = position;

            // A move that is pending or under way still reflects what the user wants
            if self.options.sync_target_on_read && !slot.pending.is_busy() {
                slot.position.target = position;
                true
            } else {
                false
            }
        };

        debug!("Read {} at {height} ({position}%)", actuator.name);

        self.publish(AccessoryUpdate::CurrentPosition {
            id: id.to_string(),
            position,
        });

        if synced_target {
            self.publish(AccessoryUpdate::TargetPosition {
                id: id.to_string(),
                position,
            });
            self.publish(AccessoryUpdate::PositionState {
                id: id.to_string(),
                state: MotionState::Stopped,
            });
        }

        Ok(position)
    }

    /// Folds an out-of-band height reading into the current position. The
    /// target and any pending move are left alone.
    pub async fn ingest_telemetry(&self, id: &str, height: f64) -> Result<u8, ControllerError> {
        let position = self.range.height_to_percentage(height);

        {
            let mut slots = self.slots.write().await;
            let slot = slots
                .get_mut(id)
                .ok_or_else(|| ControllerError::UnknownActuator(id.to_string()))?;
            slot.position.current = position;
        }

        debug!("Telemetry for {id}: {height} ({position}%)");

        self.publish(AccessoryUpdate::CurrentPosition {
            id: id.to_string(),
            position,
        });

        Ok(position)
    }

    async fn with_timeout<T>(
        &self,
        fut: impl Future<Output = Result<T, TransportError>>,
    ) -> Result<T, TransportError> {
        tokio::time::timeout(self.options.request_timeout, fut)
            .await
            .map_err(|_| TransportError::Timeout)?
    }

    fn report_unresponsive(&self, id: &str, e: TransportError) -> ControllerError {
        warn!("Desk server request for {id} failed: {e}");

        self.publish(AccessoryUpdate::Unresponsive {
            id: id.to_string(),
            reason: e.to_string(),
        });

        ControllerError::Transport(e)
    }

    fn publish(&self, update: AccessoryUpdate) {
        if self.accessory_tx.send(update).is_err() {
            debug!("Accessory channel closed, dropping update");
        }
    }
}
