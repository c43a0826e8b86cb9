//! Routes decoded client requests to the matchmaking engine
//!
//! The dispatcher calls the engine first and only then queues notifications,
//! so no engine lock is ever held while a client is being notified. Queuing
//! an event never blocks; socket writes happen in each connection's writer
//! task.
//!
//! Joins go through a dispatcher-level gate covering the insert, the queued
//! acknowledgement and the pairing pass. A player can therefore only be
//! paired once their acknowledgement is already queued, so every client sees
//! `matchmaking_joined` before `game_matched`.

use crate::matchmaking::{MatchOutcome, MatchmakingEngine};
use crate::metrics::{MetricsCollector, TransportKind};
use crate::transport::hub::Notifier;
use crate::transport::protocol::{
    decode_hub_request, ClientRequest, GameMatchedPayload, ServerEvent, ALREADY_WAITING_MESSAGE,
    JOINED_MESSAGE, JOINED_WAITING_MESSAGE, LEFT_MESSAGE, NOT_WAITING_MESSAGE, SERVER_SENDER,
};
use crate::transport::text::decode_text_frame;
use crate::types::{Animal, Player};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Connects transports to the engine
#[derive(Clone)]
pub struct Dispatcher {
    engine: Arc<MatchmakingEngine>,
    notifier: Arc<dyn Notifier>,
    metrics_collector: Arc<MetricsCollector>,
    join_gate: Arc<Mutex<()>>,
}

impl Dispatcher {
    pub fn new(
        engine: Arc<MatchmakingEngine>,
        notifier: Arc<dyn Notifier>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            engine,
            notifier,
            metrics_collector,
            join_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn engine(&self) -> Arc<MatchmakingEngine> {
        self.engine.clone()
    }

    /// Decode a raw frame for the given transport and handle it
    pub fn handle_frame(&self, connection_id: &str, transport: TransportKind, frame: &str) {
        let start_time = Instant::now();

        let decoded = match transport {
            TransportKind::Hub => decode_hub_request(frame).map(Some),
            TransportKind::Text => decode_text_frame(frame),
        };

        match decoded {
            Ok(Some(request)) => {
                debug!(
                    "Request '{}' from {} ({})",
                    request.kind(),
                    connection_id,
                    transport.as_str()
                );
                self.handle_request(connection_id, transport, request);
                self.metrics_collector
                    .record_message(transport, true, start_time.elapsed());
            }
            Ok(None) => {
                debug!("Ignoring unrecognised frame from {}", connection_id);
                self.metrics_collector
                    .record_message(transport, false, start_time.elapsed());
            }
            Err(e) => {
                warn!("Rejected frame from {}: {}", connection_id, e);
                self.notify(connection_id, ServerEvent::error(e.to_string()));
                self.metrics_collector
                    .record_message(transport, false, start_time.elapsed());
            }
        }
    }

    /// Handle a decoded request
    pub fn handle_request(
        &self,
        connection_id: &str,
        transport: TransportKind,
        request: ClientRequest,
    ) {
        match request {
            ClientRequest::Join { nickname, animal } => {
                self.handle_join(connection_id, nickname, animal)
            }
            ClientRequest::Leave => self.handle_leave(connection_id, transport),
            ClientRequest::GetWaitingCount => {
                let count = self.engine.get_waiting_count();
                self.notify(connection_id, ServerEvent::WaitingCount { count });
            }
            ClientRequest::SendMessage { message } => {
                info!("Broadcast message from {}: {}", connection_id, message);
                let delivered = self.notifier.broadcast(ServerEvent::ReceiveMessage {
                    sender: connection_id.to_string(),
                    message,
                });
                debug!("Broadcast delivered to {} connections", delivered);
            }
            ClientRequest::SendToCaller { message } => {
                self.notify(
                    connection_id,
                    ServerEvent::ReceiveMessage {
                        sender: SERVER_SENDER.to_string(),
                        message,
                    },
                );
            }
        }
    }

    fn handle_join(&self, connection_id: &str, nickname: String, animal: Animal) {
        let player = Player::new(connection_id, nickname, animal);

        // Held only while events are pushed onto unbounded channels
        let _gate = self.join_gate.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = self.engine.join_matchmaking(player, connection_id);

        if !outcome.accepted {
            self.notify(connection_id, ServerEvent::error(ALREADY_WAITING_MESSAGE));
            return;
        }

        let message = if outcome.waiting_count == 1 {
            JOINED_WAITING_MESSAGE
        } else {
            JOINED_MESSAGE
        };
        self.notify(
            connection_id,
            ServerEvent::MatchmakingJoined {
                message: message.to_string(),
                waiting_count: outcome.waiting_count,
            },
        );

        if let MatchOutcome::Matched { room, paired } = self.engine.try_match_players() {
            let payload = GameMatchedPayload::from(&room);
            for (paired_id, _) in &paired {
                self.notify(paired_id, ServerEvent::GameMatched(payload.clone()));
            }
        }
    }

    fn handle_leave(&self, connection_id: &str, transport: TransportKind) {
        if self.engine.leave_matchmaking(connection_id) {
            self.notify(
                connection_id,
                ServerEvent::MatchmakingLeft {
                    message: LEFT_MESSAGE.to_string(),
                },
            );
            return;
        }

        // The hub channel ignores redundant leaves; the text channel reports them
        if transport == TransportKind::Text {
            self.notify(connection_id, ServerEvent::error(NOT_WAITING_MESSAGE));
        }
    }

    /// Clean up after a closed connection
    pub fn handle_disconnect(&self, connection_id: &str) {
        if self.engine.leave_matchmaking(connection_id) {
            info!("Removed disconnected connection {} from matchmaking", connection_id);
        }
    }

    fn notify(&self, connection_id: &str, event: ServerEvent) -> bool {
        let name = event.name();
        let delivered = self.notifier.send_to(connection_id, event);
        if !delivered {
            warn!("Could not deliver {} to {}", name, connection_id);
        }
        self.metrics_collector.record_notification(name, delivered);
        delivered
    }
}
