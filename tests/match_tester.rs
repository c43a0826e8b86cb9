//! Match Testing Tool and End-to-End Test Suite
//!
//! This module provides a WebSocket client for exercising a running server:
//! - Connecting over the JSON hub channel or the text channel
//! - Joining players and waiting for matched notifications
//! - Load runs that pair many clients concurrently
//!
//! Run with: `cargo test --test match_tester`
//! Or use the CLI tool: `cargo run --bin match-tester`

use std::collections::HashSet;
use std::time::{Duration, Instant};

use animal_matchmaking::transport::{ClientRequest, GameMatchedPayload, ServerEvent};
use animal_matchmaking::types::Animal;
use anyhow::{anyhow, bail, Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

/// Channel a test client talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Hub,
    Text,
}

impl Channel {
    fn path(self) -> &'static str {
        match self {
            Channel::Hub => "/gamehub",
            Channel::Text => "/ws",
        }
    }
}

/// A single WebSocket client
pub struct TestClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    channel: Channel,
}

impl TestClient {
    /// Connect to `base_url` (for example `ws://127.0.0.1:5000`)
    pub async fn connect(base_url: &str, channel: Channel) -> Result<Self> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), channel.path());
        let (stream, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;
        debug!("Connected to {}", url);
        Ok(Self { stream, channel })
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Send a raw frame as is
    pub async fn send_raw(&mut self, frame: &str) -> Result<()> {
        self.stream
            .send(Message::Text(frame.to_string()))
            .await
            .context("Failed to send frame")
    }

    /// Encode a request for this client's channel and send it
    pub async fn send_request(&mut self, request: &ClientRequest) -> Result<()> {
        let frame = match self.channel {
            Channel::Hub => serde_json::to_string(request)?,
            Channel::Text => match request {
                ClientRequest::Join { nickname, animal } => {
                    format!("JOIN:{}:{}", nickname, animal.index())
                }
                ClientRequest::Leave => "LEAVE".to_string(),
                ClientRequest::GetWaitingCount => "COUNT".to_string(),
                other => bail!("'{}' is not available on the text channel", other.kind()),
            },
        };
        self.send_raw(&frame).await
    }

    pub async fn join(&mut self, nickname: &str, animal: Animal) -> Result<()> {
        self.send_request(&ClientRequest::Join {
            nickname: nickname.to_string(),
            animal,
        })
        .await
    }

    /// Wait for the next text frame
    pub async fn next_frame(&mut self, wait: Duration) -> Result<String> {
        loop {
            let message = timeout(wait, self.stream.next())
                .await
                .map_err(|_| anyhow!("Timed out after {:?} waiting for a frame", wait))?
                .ok_or_else(|| anyhow!("Connection closed"))??;

            match message {
                Message::Text(text) => return Ok(text),
                Message::Close(_) => bail!("Connection closed by server"),
                _ => continue,
            }
        }
    }

    /// Wait for the next hub event
    pub async fn next_event(&mut self, wait: Duration) -> Result<ServerEvent> {
        let frame = self.next_frame(wait).await?;
        serde_json::from_str(&frame).with_context(|| format!("Unexpected frame: {}", frame))
    }

    /// Read hub events until a match arrives
    pub async fn wait_for_match(&mut self, wait: Duration) -> Result<GameMatchedPayload> {
        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.next_event(remaining).await? {
                ServerEvent::GameMatched(payload) => return Ok(payload),
                ServerEvent::MatchmakingError { message } => {
                    bail!("Server reported error: {}", message)
                }
                other => debug!("Skipping {:?}", other),
            }
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await.context("Failed to close")
    }
}

/// Statistics from a load run
#[derive(Debug, Default, Clone)]
pub struct LoadStats {
    pub pairs_requested: usize,
    pub players_matched: usize,
    pub distinct_rooms: usize,
    pub distinct_seeds: usize,
    pub elapsed_ms: u128,
}

/// Drives scenarios against a server
pub struct MatchTester {
    base_url: String,
    wait: Duration,
}

impl MatchTester {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            wait: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Join two hub players and return what each of them was told
    pub async fn run_pair(
        &self,
        first: (&str, Animal),
        second: (&str, Animal),
    ) -> Result<(GameMatchedPayload, GameMatchedPayload)> {
        let mut a = TestClient::connect(&self.base_url, Channel::Hub).await?;
        let mut b = TestClient::connect(&self.base_url, Channel::Hub).await?;

        a.join(first.0, first.1).await?;
        match a.next_event(self.wait).await? {
            ServerEvent::MatchmakingJoined { .. } => {}
            other => bail!("Expected join acknowledgement, got {:?}", other),
        }

        b.join(second.0, second.1).await?;
        let matched_b = b.wait_for_match(self.wait).await?;
        let matched_a = a.wait_for_match(self.wait).await?;

        a.close().await.ok();
        b.close().await.ok();
        Ok((matched_a, matched_b))
    }

    /// Ask the server for its waiting count
    pub async fn waiting_count(&self) -> Result<usize> {
        let mut client = TestClient::connect(&self.base_url, Channel::Hub).await?;
        client.send_request(&ClientRequest::GetWaitingCount).await?;
        let event = client.next_event(self.wait).await?;
        client.close().await.ok();

        match event {
            ServerEvent::WaitingCount { count } => Ok(count),
            other => bail!("Expected waiting count, got {:?}", other),
        }
    }

    /// Connect `pairs * 2` hub clients at once and wait until all are matched
    pub async fn run_load(&self, pairs: usize) -> Result<LoadStats> {
        let start = Instant::now();
        let mut handles = Vec::with_capacity(pairs * 2);

        for i in 0..pairs * 2 {
            let base_url = self.base_url.clone();
            let wait = self.wait;
            handles.push(tokio::spawn(async move {
                let animal = Animal::ALL[i % Animal::ALL.len()];
                let mut client = TestClient::connect(&base_url, Channel::Hub).await?;
                client.join(&format!("load-{}", i), animal).await?;
                let payload = client.wait_for_match(wait).await?;
                client.close().await.ok();
                Ok::<_, anyhow::Error>(payload)
            }));
        }

        let mut rooms = HashSet::new();
        let mut seeds = HashSet::new();
        let mut players_matched = 0;
        for handle in handles {
            let payload = handle.await.context("Load client panicked")??;
            rooms.insert(payload.room_id);
            seeds.insert(payload.random_seed);
            players_matched += 1;
        }

        let stats = LoadStats {
            pairs_requested: pairs,
            players_matched,
            distinct_rooms: rooms.len(),
            distinct_seeds: seeds.len(),
            elapsed_ms: start.elapsed().as_millis(),
        };
        info!("Load run finished: {:?}", stats);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use animal_matchmaking::config::AppConfig;
    use animal_matchmaking::service::AppState;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    const WAIT: Duration = Duration::from_secs(5);

    async fn spawn_server() -> (String, Arc<AppState>) {
        spawn_server_with(AppConfig::default()).await
    }

    async fn spawn_server_with(config: AppConfig) -> (String, Arc<AppState>) {
        let app_state = Arc::new(AppState::new(config).await.unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = app_state.router();

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        (format!("ws://{}", addr), app_state)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        condition()
    }

    #[tokio::test]
    async fn test_hub_clients_are_matched() {
        let (base_url, _app_state) = spawn_server().await;

        let mut alice = TestClient::connect(&base_url, Channel::Hub).await.unwrap();
        let mut bob = TestClient::connect(&base_url, Channel::Hub).await.unwrap();

        alice.join("Alice", Animal::Cat).await.unwrap();
        assert_eq!(
            alice.next_event(WAIT).await.unwrap(),
            ServerEvent::MatchmakingJoined {
                message: "Joined matchmaking. Waiting for an opponent...".to_string(),
                waiting_count: 1
            }
        );

        bob.join("Bob", Animal::Dog).await.unwrap();
        assert_eq!(
            bob.next_event(WAIT).await.unwrap(),
            ServerEvent::MatchmakingJoined {
                message: "Joined matchmaking.".to_string(),
                waiting_count: 2
            }
        );

        let for_alice = alice.wait_for_match(WAIT).await.unwrap();
        let for_bob = bob.wait_for_match(WAIT).await.unwrap();

        assert_eq!(for_alice, for_bob);
        assert_eq!(for_alice.players.len(), 2);
        assert_eq!(for_alice.players[0].nickname, "Alice");
        assert_eq!(for_alice.players[0].selected_animal, Animal::Cat);
        assert_eq!(for_alice.players[1].nickname, "Bob");
        assert_eq!(for_alice.players[1].selected_animal, Animal::Dog);
    }

    #[tokio::test]
    async fn test_disconnect_leaves_queue() {
        let (base_url, app_state) = spawn_server().await;
        let engine = app_state.engine();

        let mut client = TestClient::connect(&base_url, Channel::Hub).await.unwrap();
        client.join("Quitter", Animal::Fox).await.unwrap();
        client.next_event(WAIT).await.unwrap();
        assert_eq!(engine.get_waiting_count(), 1);

        client.close().await.unwrap();
        assert!(wait_until(|| engine.get_waiting_count() == 0).await);
        assert!(wait_until(|| app_state.hub().connection_count() == 0).await);
    }

    #[tokio::test]
    async fn test_text_clients_are_matched() {
        let (base_url, _app_state) = spawn_server().await;

        let mut carol = TestClient::connect(&base_url, Channel::Text).await.unwrap();
        let mut dave = TestClient::connect(&base_url, Channel::Text).await.unwrap();

        carol.send_raw("JOIN:Carol:2").await.unwrap();
        assert_eq!(
            carol.next_frame(WAIT).await.unwrap(),
            "JOINED:Joined matchmaking. Waiting for an opponent..."
        );

        dave.send_raw("JOIN:Dave:3").await.unwrap();
        assert_eq!(dave.next_frame(WAIT).await.unwrap(), "JOINED:Joined matchmaking.");

        let for_carol = carol.next_frame(WAIT).await.unwrap();
        let for_dave = dave.next_frame(WAIT).await.unwrap();
        assert!(for_carol.starts_with("MATCHED:"), "Got {}", for_carol);
        assert_eq!(for_carol, for_dave);
        assert_eq!(for_carol.split(':').count(), 3);
    }

    #[tokio::test]
    async fn test_text_channel_errors() {
        let (base_url, _app_state) = spawn_server().await;
        let mut client = TestClient::connect(&base_url, Channel::Text).await.unwrap();

        client.send_raw("LEAVE").await.unwrap();
        assert_eq!(
            client.next_frame(WAIT).await.unwrap(),
            "ERROR:Not waiting for a match"
        );

        client.send_raw("JOIN:Eve:12").await.unwrap();
        assert_eq!(client.next_frame(WAIT).await.unwrap(), "ERROR:Unknown animal: 12");

        // Unknown commands get no reply, so the next frame answers COUNT
        client.send_raw("HELLO").await.unwrap();
        client.send_raw("COUNT").await.unwrap();
        assert_eq!(client.next_frame(WAIT).await.unwrap(), "COUNT:0");
    }

    #[tokio::test]
    async fn test_hub_and_text_clients_share_one_queue() {
        let (base_url, _app_state) = spawn_server().await;

        let mut hub_client = TestClient::connect(&base_url, Channel::Hub).await.unwrap();
        let mut text_client = TestClient::connect(&base_url, Channel::Text).await.unwrap();

        hub_client.join("Hub", Animal::Rabbit).await.unwrap();
        hub_client.next_event(WAIT).await.unwrap();
        text_client.join("Text", Animal::Bear).await.unwrap();
        text_client.next_frame(WAIT).await.unwrap();

        let payload = hub_client.wait_for_match(WAIT).await.unwrap();
        let frame = text_client.next_frame(WAIT).await.unwrap();
        assert_eq!(
            frame,
            format!("MATCHED:{}:{}", payload.room_id, payload.random_seed)
        );
    }

    #[tokio::test]
    async fn test_connection_limit_is_enforced() {
        let mut config = AppConfig::default();
        config.matchmaking.max_connections = 1;
        let (url, app_state) = spawn_server_with(config).await;

        let first = TestClient::connect(&url, Channel::Hub).await.unwrap();
        assert!(wait_until(|| app_state.hub().connection_count() == 1).await);

        let refused = TestClient::connect(&url, Channel::Text).await;
        assert!(refused.is_err(), "second socket should be refused");
        assert_eq!(app_state.transport_state().available_slots(), 0);

        first.close().await.unwrap();

        let deadline = Instant::now() + WAIT;
        let second = loop {
            match TestClient::connect(&url, Channel::Text).await {
                Ok(client) => break client,
                Err(_) if Instant::now() < deadline => {
                    tokio::time::sleep(Duration::from_millis(20)).await
                }
                Err(e) => panic!("Slot was never released: {}", e),
            }
        };
        second.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_hub_frame() {
        let (base_url, app_state) = spawn_server().await;
        let mut client = TestClient::connect(&base_url, Channel::Hub).await.unwrap();

        client.send_raw(r#"{"type":"join_matchmaking"}"#).await.unwrap();
        match client.next_event(WAIT).await.unwrap() {
            ServerEvent::MatchmakingError { message } => {
                assert!(message.starts_with("Invalid request"))
            }
            other => panic!("Expected an error, got {:?}", other),
        }
        assert_eq!(app_state.engine().get_waiting_count(), 0);
    }

    #[tokio::test]
    async fn test_tester_pair_and_load() {
        let (base_url, app_state) = spawn_server().await;
        let tester = MatchTester::new(base_url);

        let (a, b) = tester
            .run_pair(("First", Animal::Cat), ("Second", Animal::Dog))
            .await
            .unwrap();
        assert_eq!(a.room_id, b.room_id);
        assert_eq!(a.random_seed, b.random_seed);

        let stats = tester.run_load(10).await.unwrap();
        assert_eq!(stats.players_matched, 20);
        assert_eq!(stats.distinct_rooms, 10);
        assert_eq!(stats.distinct_seeds, 10);

        assert_eq!(tester.waiting_count().await.unwrap(), 0);
        assert_eq!(app_state.engine().room_count(), 11);
    }
}
