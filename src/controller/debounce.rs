use tokio::task::JoinHandle;

/// Single-slot holder for the move an actuator is waiting to make.
///
/// Re-arming aborts the scheduled task, which covers both the settle and the
/// dispatch delay since they run in the same task. Each arm gets a new
/// generation so a task that was already past its last await when it got
/// superseded can still tell it is stale.
///
/// Once a move has been sent its generation stays recorded as in flight
/// until `finish`, so reads can tell the desk is still on its way.
#[derive(Debug, Default)]
pub struct PendingMove {
    generation: u64,
    target: Option<u8>,
    handle: Option<JoinHandle<()>>,
    in_flight: Option<(u64, u8)>,
}

impl PendingMove {
    /// Cancels whatever was scheduled and records `target` as the new
    /// pending value. Returns the generation the new task must carry.
    pub fn rearm(&mut self, target: u8) -> u64 {
        self.cancel();
        self.generation = self.generation.wrapping_add(1);
        self.target = Some(target);
        self.generation
    }

    pub fn attach(&mut self, handle: JoinHandle<()>) {
        self.handle = Some(handle);
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.target = None;
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.target.is_some()
    }

    pub fn target(&self) -> Option<u8> {
        self.target
    }

    /// Target of a move that was sent and hasn't completed yet.
    pub fn in_flight(&self) -> Option<u8> {
        self.in_flight.map(|(_, target)| target)
    }

    /// Whether a move is either waiting to be sent or on its way.
    pub fn is_busy(&self) -> bool {
        self.target.is_some() || self.in_flight.is_some()
    }

    pub fn finish(&mut self, generation: u64) {
        if matches!(self.in_flight, Some((g, _)) if g == generation) {
            self.in_flight = None;
        }
    }

    /// Empties the slot for a move that is about to be sent. The task is
    /// detached, so a later `rearm` no longer aborts it.
    pub fn take_for_dispatch(&mut self, generation: u64) -> Option<u8> {
        if !self.is_current(generation) {
            return None;
        }

        // Dropping a JoinHandle detaches the task instead of aborting it
        self.handle.take();
        let target = self.target.take()?;
        self.in_flight = Some((generation, target));

        Some(target)
    }
}

impl Drop for PendingMove {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rearm_aborts_previous_task() {
        let mut pending = PendingMove::default();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let first = pending.rearm(30);
        pending.attach(tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        }));

        let second = pending.rearm(80);

        // The aborted task drops its sender
        assert!(rx.await.is_err());
        assert_ne!(first, second);
        assert!(!pending.is_current(first));
        assert!(pending.is_current(second));
        assert_eq!(pending.target(), Some(80));
    }

    #[tokio::test]
    async fn dispatched_move_stays_in_flight_until_finished() {
        let mut pending = PendingMove::default();

        let first = pending.rearm(80);
        assert_eq!(pending.take_for_dispatch(first), Some(80));
        assert_eq!(pending.target(), None);
        assert_eq!(pending.in_flight(), Some(80));
        assert!(pending.is_busy());

        // A newer request doesn't clear the move already on its way
        let second = pending.rearm(20);
        assert_eq!(pending.in_flight(), Some(80));

        pending.finish(second);
        assert_eq!(pending.in_flight(), Some(80));

        pending.finish(first);
        assert_eq!(pending.in_flight(), None);
        assert!(pending.is_busy());

        pending.cancel();
        assert!(!pending.is_busy());
    }

    #[tokio::test]
    async fn stale_generation_cannot_dispatch() {
        let mut pending = PendingMove::default();

        let stale = pending.rearm(30);
        let current = pending.rearm(80);

        assert_eq!(pending.take_for_dispatch(stale), None);
        assert_eq!(pending.take_for_dispatch(current), Some(80));
        assert_eq!(pending.target(), None);
        assert_eq!(pending.take_for_dispatch(current), None);
    }
}
