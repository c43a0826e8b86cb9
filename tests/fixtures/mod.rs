//! Test fixtures and mock implementations for integration testing

use animal_matchmaking::matchmaking::{MatchmakingEngine, SeedSource};
use animal_matchmaking::metrics::MetricsCollector;
use animal_matchmaking::transport::{Dispatcher, GameMatchedPayload, Notifier, ServerEvent};
use animal_matchmaking::types::{Animal, Player};
use std::sync::{Arc, Mutex};

/// Where a recorded event was sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Connection(String),
    Everyone,
}

/// Notifier that captures every event for later inspection
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(Recipient, ServerEvent)>>,
    disconnected: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make deliveries to `connection_id` fail from now on
    pub fn disconnect(&self, connection_id: &str) {
        self.disconnected
            .lock()
            .unwrap()
            .push(connection_id.to_string());
    }

    /// Get all recorded events (for testing)
    pub fn events(&self) -> Vec<(Recipient, ServerEvent)> {
        self.events.lock().unwrap().clone()
    }

    /// Events delivered to one connection, in order
    pub fn events_for(&self, connection_id: &str) -> Vec<ServerEvent> {
        self.events()
            .into_iter()
            .filter_map(|(recipient, event)| match recipient {
                Recipient::Connection(id) if id == connection_id => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Count events with the given wire name
    pub fn count_events_of_type(&self, name: &str) -> usize {
        self.events()
            .iter()
            .filter(|(_, event)| event.name() == name)
            .count()
    }

    /// Matched payloads delivered to one connection
    pub fn matches_for(&self, connection_id: &str) -> Vec<GameMatchedPayload> {
        self.events_for(connection_id)
            .into_iter()
            .filter_map(|event| match event {
                ServerEvent::GameMatched(payload) => Some(payload),
                _ => None,
            })
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn send_to(&self, connection_id: &str, event: ServerEvent) -> bool {
        if self
            .disconnected
            .lock()
            .unwrap()
            .iter()
            .any(|id| id == connection_id)
        {
            return false;
        }

        self.events
            .lock()
            .unwrap()
            .push((Recipient::Connection(connection_id.to_string()), event));
        true
    }

    fn broadcast(&self, event: ServerEvent) -> usize {
        self.events.lock().unwrap().push((Recipient::Everyone, event));
        1
    }
}

/// Create a test player whose id is also its connection id
pub fn create_test_player(connection_id: &str, animal: Animal) -> Player {
    Player::new(connection_id, format!("{}-nick", connection_id), animal)
}

/// Engine with its own metrics registry
pub fn create_test_engine() -> Arc<MatchmakingEngine> {
    let metrics_collector = Arc::new(MetricsCollector::new().unwrap());
    Arc::new(MatchmakingEngine::with_metrics(metrics_collector))
}

/// Engine with a deterministic seed source
pub fn create_seeded_engine(seed: u64) -> Arc<MatchmakingEngine> {
    let metrics_collector = Arc::new(MetricsCollector::new().unwrap());
    Arc::new(MatchmakingEngine::with_seed_source(
        Arc::new(SeedSource::from_seed(seed)),
        metrics_collector,
    ))
}

/// Dispatcher wired to a recording notifier
pub fn create_test_dispatcher() -> (Dispatcher, Arc<RecordingNotifier>, Arc<MatchmakingEngine>) {
    let metrics_collector = Arc::new(MetricsCollector::new().unwrap());
    let engine = Arc::new(MatchmakingEngine::with_metrics(metrics_collector.clone()));
    let notifier = Arc::new(RecordingNotifier::new());
    let dispatcher = Dispatcher::new(engine.clone(), notifier.clone(), metrics_collector);
    (dispatcher, notifier, engine)
}

/// JSON hub frame for a join request
pub fn hub_join_frame(nickname: &str, animal: Animal) -> String {
    serde_json::json!({
        "type": "join_matchmaking",
        "nickname": nickname,
        "selected_animal": animal.index()
    })
    .to_string()
}
