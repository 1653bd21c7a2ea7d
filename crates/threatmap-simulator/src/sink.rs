//! Outbound event channels.

use std::sync::{Arc, Mutex, PoisonError};

use threatmap_domain::SimEvent;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

/// Broadcast channel capacity
pub const CHANNEL_CAPACITY: usize = 1024;

/// Anything that accepts published simulation events.
///
/// Publishing never fails from the simulator's point of view; sinks log
/// and drop what they cannot deliver.
pub trait EventSink {
    fn publish(&self, event: SimEvent);
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn publish(&self, event: SimEvent) {
        (**self).publish(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &S {
    fn publish(&self, event: SimEvent) {
        (**self).publish(event);
    }
}

/// Fan-out to every connected consumer through a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<SimEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SimEvent> {
        self.tx.subscribe()
    }

    pub fn sender(&self) -> broadcast::Sender<SimEvent> {
        self.tx.clone()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(CHANNEL_CAPACITY)
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: SimEvent) {
        // no subscribers is normal between client connections
        if let Err(err) = self.tx.send(event) {
            trace!(event = err.0.name(), "No subscribers for event");
        }
    }
}

/// In-memory sink that keeps everything it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SimEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events in publish order
    pub fn events(&self) -> Vec<SimEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return recorded events
    pub fn take(&self) -> Vec<SimEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| event.name() == name)
            .count()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: SimEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Headless sink: lifecycle events to the log, optionally every event as
/// a JSON line on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink {
    pub json_lines: bool,
}

impl LogSink {
    pub const fn new(json_lines: bool) -> Self {
        Self { json_lines }
    }
}

impl EventSink for LogSink {
    fn publish(&self, event: SimEvent) {
        if self.json_lines {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(err) => debug!(error = %err, "Failed to encode event"),
            }
        }

        match &event {
            SimEvent::AttackEvent(attack) => info!(
                attack_id = %attack.id,
                "New attack: {} {} -> {} ({}, {:.0} km, {:.0} ms)",
                attack.attack_type,
                attack.source.id,
                attack.target.id,
                attack.threat_level,
                attack.total_distance_m / 1000.0,
                attack.attack_travel_time_ms
            ),
            SimEvent::AttackFinal(hit) => info!(attack_id = %hit.id, "Attack HIT target"),
            SimEvent::DefenseLaunch(launch) => info!(
                attack_id = %launch.attack_id,
                sim_id = %launch.sim_id,
                "Defense from {} | delay {:.0} ms | flight {:.0} ms",
                launch.center.id,
                launch.delay_ms,
                launch.interceptor_time_ms
            ),
            SimEvent::InterceptResult(result) => info!(
                attack_id = %result.attack_id,
                sim_id = %result.sim_id,
                "Interceptor {} ({:?})",
                if result.intercepted { "INTERCEPTED" } else { "MISSED" },
                result.resolution
            ),
            SimEvent::AttackUpdate(_) | SimEvent::DefenseUpdate(_) => {
                trace!(event = event.name(), "Position update");
            }
            SimEvent::CenterInfo(_) | SimEvent::ServerStatus(_) => {
                debug!(event = event.name(), "Bootstrap event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threatmap_domain::ServerStatus;
    use tokio_test::{assert_pending, assert_ready_ok, task};

    fn status() -> SimEvent {
        SimEvent::ServerStatus(ServerStatus {
            ok: true,
            message: "online".into(),
        })
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.publish(status());
        (&sink).publish(status());
        assert_eq!(sink.count("server-status"), 2);
        assert_eq!(sink.take().len(), 2);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_broadcast_without_subscribers() {
        let sink = BroadcastSink::default();
        sink.publish(status());
    }

    #[tokio::test]
    async fn test_broadcast_delivers_to_subscribers() {
        let sink = BroadcastSink::new(16);
        let mut rx_a = sink.subscribe();
        let mut rx_b = sink.subscribe();
        Arc::new(sink).publish(status());

        assert_eq!(rx_a.recv().await.unwrap().name(), "server-status");
        assert_eq!(rx_b.recv().await.unwrap().name(), "server-status");
    }

    #[test]
    fn test_subscriber_wakes_on_publish() {
        let sink = BroadcastSink::new(4);
        let mut rx = sink.subscribe();
        let mut recv = task::spawn(rx.recv());
        assert_pending!(recv.poll());

        sink.publish(status());
        assert!(recv.is_woken());
        let event = assert_ready_ok!(recv.poll());
        assert_eq!(event.name(), "server-status");
    }
}
