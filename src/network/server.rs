//! WebSocket Game Server
//!
//! The network boundary: accepts connections, routes each one to exactly
//! one connection class for its lifetime (matchmaking or challenge; a
//! matched connection doubles as the match connection), pumps outbound
//! messages in order, and withdraws participants from queue, broker, and
//! session when a socket closes.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::catalog::CardCatalog;
use crate::game::ParticipantId;
use crate::lobby::challenge::ChallengeBroker;
use crate::lobby::matchmaking::{MatchmakingQueue, PairHandler, QueueEntry};
use crate::lobby::SessionSpawner;
use crate::network::connection::ConnectionHandle;
use crate::network::protocol::{ClientMessage, ServerMessage};
use crate::session::{MatchSession, SeatInfo, SessionConfig, SessionHandle};
use crate::store::PlayerStore;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Per-connection outbound channel capacity.
    pub outbound_capacity: usize,
    /// Session tunables handed to every constructed match.
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().expect("static bind address"),
            outbound_capacity: 64,
            session: SessionConfig::default(),
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind or accept.
    #[error("network i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Which class a physical connection belongs to for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionClass {
    /// Queue membership; becomes the match connection once paired.
    Matchmaking {
        /// Skip the queue and start against the scripted opponent.
        practice: bool,
    },
    /// Challenge traffic; becomes the match connection on acceptance.
    Challenge,
}

/// Parsed upgrade target: path class plus the participant identity.
#[derive(Debug, Clone)]
struct Route {
    class: ConnectionClass,
    participant: ParticipantId,
}

impl Route {
    fn parse(uri: &str) -> Option<Route> {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, query),
            None => (uri, ""),
        };
        let mut participant = None;
        let mut practice = false;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("participant", value)) if !value.is_empty() => {
                    participant = Some(ParticipantId::from(value));
                }
                Some(("mode", "practice")) => practice = true,
                _ => {}
            }
        }
        let class = match path {
            "/ws/matchmaking" => ConnectionClass::Matchmaking { practice },
            "/ws/challenge" => ConnectionClass::Challenge,
            _ => return None,
        };
        Some(Route {
            class,
            participant: participant?,
        })
    }
}

/// Maps participants to the session currently hosting their match.
///
/// Entries whose session task has finished are dropped lazily on lookup.
pub struct SessionRouter {
    inner: Mutex<HashMap<ParticipantId, SessionHandle>>,
}

impl SessionRouter {
    /// Empty router.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn locked(&self) -> MutexGuard<'_, HashMap<ParticipantId, SessionHandle>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Point a participant at a session.
    pub fn register(&self, participant: ParticipantId, handle: SessionHandle) {
        self.locked().insert(participant, handle);
    }

    /// The participant's live session, if any.
    pub fn lookup(&self, participant: &ParticipantId) -> Option<SessionHandle> {
        let mut map = self.locked();
        match map.get(participant) {
            Some(handle) if !handle.is_closed() => Some(handle.clone()),
            Some(_) => {
                map.remove(participant);
                None
            }
            None => None,
        }
    }

    /// Number of routed participants, live or not yet reaped.
    pub fn len(&self) -> usize {
        self.locked().len()
    }

    /// Whether no participant is routed.
    pub fn is_empty(&self) -> bool {
        self.locked().is_empty()
    }
}

impl Default for SessionRouter {
    fn default() -> Self {
        Self::new()
    }
}

fn make_spawner(
    catalog: Arc<CardCatalog>,
    store: Arc<dyn PlayerStore>,
    router: Arc<SessionRouter>,
    session_config: SessionConfig,
) -> SessionSpawner {
    Arc::new(move |first: SeatInfo, second: SeatInfo| {
        match MatchSession::spawn(
            Arc::clone(&catalog),
            Arc::clone(&store),
            session_config.clone(),
            first.clone(),
            second.clone(),
        ) {
            Ok(handle) => {
                router.register(first.id.clone(), handle.clone());
                router.register(second.id.clone(), handle);
            }
            Err(err) => {
                warn!("failed to construct match session: {err}");
                for seat in [&first, &second] {
                    if let Some(conn) = &seat.conn {
                        conn.notify(ServerMessage::Error {
                            message: "Failed to start the match.".to_string(),
                        });
                    }
                }
            }
        }
    })
}

/// Pairing callback: re-fetch authoritative records, re-validate both
/// connections and decks, then hand two seats to the spawner. Aborting
/// notifies whichever connection is still open.
fn make_pair_handler(store: Arc<dyn PlayerStore>, spawner: SessionSpawner) -> PairHandler {
    Arc::new(move |a: QueueEntry, b: QueueEntry| {
        if !a.conn.is_open() || !b.conn.is_open() {
            warn!(
                first = %a.participant_id,
                second = %b.participant_id,
                "paired connection closed before match construction"
            );
            for entry in [&a, &b] {
                if entry.conn.is_open() {
                    entry.conn.notify(ServerMessage::MatchmakingCancelled {
                        reason: "Opponent disconnected before the match could start.".to_string(),
                    });
                }
            }
            return;
        }

        let record_a = store.get(&a.participant_id);
        let record_b = store.get(&b.participant_id);
        let deck_a = record_a
            .active_deck()
            .filter(|d| !d.card_ids.is_empty())
            .cloned();
        let deck_b = record_b
            .active_deck()
            .filter(|d| !d.card_ids.is_empty())
            .cloned();
        let (Some(deck_a), Some(deck_b)) = (deck_a, deck_b) else {
            warn!(
                first = %a.participant_id,
                second = %b.participant_id,
                "pairing aborted: missing active deck"
            );
            for entry in [&a, &b] {
                entry.conn.notify(ServerMessage::MatchmakingCancelled {
                    reason: "Active deck not found.".to_string(),
                });
            }
            return;
        };

        let first = SeatInfo::human(
            record_a.id.clone(),
            record_a.name.clone(),
            record_a.avatar_url.clone(),
            deck_a.card_ids,
            record_a.rating,
            a.conn.clone(),
        );
        let second = SeatInfo::human(
            record_b.id.clone(),
            record_b.name.clone(),
            record_b.avatar_url.clone(),
            deck_b.card_ids,
            record_b.rating,
            b.conn.clone(),
        );
        spawner(first, second);
    })
}

fn scripted_seat(catalog: &CardCatalog) -> SeatInfo {
    let suffix = Uuid::new_v4().simple().to_string();
    SeatInfo::scripted(
        ParticipantId::from(format!("bot_{}", &suffix[..8])),
        "Krendi Bot".to_string(),
        catalog.starter_deck(),
    )
}

/// The game server.
pub struct GameServer {
    config: ServerConfig,
    catalog: Arc<CardCatalog>,
    store: Arc<dyn PlayerStore>,
    queue: Arc<MatchmakingQueue>,
    broker: Arc<ChallengeBroker>,
    router: Arc<SessionRouter>,
    spawn_session: SessionSpawner,
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Wire up queue, broker, and router around the injected catalog and
    /// player store.
    pub fn new(config: ServerConfig, catalog: Arc<CardCatalog>, store: Arc<dyn PlayerStore>) -> Self {
        let router = Arc::new(SessionRouter::new());
        let spawn_session = make_spawner(
            Arc::clone(&catalog),
            Arc::clone(&store),
            Arc::clone(&router),
            config.session.clone(),
        );
        let queue = Arc::new(MatchmakingQueue::new(make_pair_handler(
            Arc::clone(&store),
            Arc::clone(&spawn_session),
        )));
        let broker = Arc::new(ChallengeBroker::new(
            Arc::clone(&store),
            Arc::clone(&spawn_session),
        ));
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            catalog,
            store,
            queue,
            broker,
            router,
            spawn_session,
            shutdown_tx,
        }
    }

    /// Run the accept loop until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        info!("game server listening on {}", self.config.bind_addr);

        let pairing_task = self.queue.spawn_pairing_task();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            debug!("new connection from {addr}");
                            self.handle_connection(stream, addr);
                        }
                        Err(err) => error!("accept error: {err}"),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        pairing_task.abort();
        Ok(())
    }

    /// Signal the accept loop to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Waiting queue size.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Participants reachable for challenges.
    pub fn challenge_online(&self) -> usize {
        self.broker.online_count()
    }

    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let catalog = Arc::clone(&self.catalog);
        let store = Arc::clone(&self.store);
        let queue = Arc::clone(&self.queue);
        let broker = Arc::clone(&self.broker);
        let router = Arc::clone(&self.router);
        let spawner = Arc::clone(&self.spawn_session);
        let outbound_capacity = self.config.outbound_capacity;

        tokio::spawn(async move {
            connection_task(
                stream, addr, catalog, store, queue, broker, router, spawner,
                outbound_capacity,
            )
            .await;
        });
    }
}

#[allow(clippy::too_many_arguments)]
async fn connection_task(
    stream: TcpStream,
    addr: SocketAddr,
    catalog: Arc<CardCatalog>,
    store: Arc<dyn PlayerStore>,
    queue: Arc<MatchmakingQueue>,
    broker: Arc<ChallengeBroker>,
    router: Arc<SessionRouter>,
    spawner: SessionSpawner,
    outbound_capacity: usize,
) {
    let mut uri = String::new();
    let ws_stream = match accept_hdr_async(stream, |request: &Request, response: Response| {
        uri = request.uri().to_string();
        Ok(response)
    })
    .await
    {
        Ok(ws) => ws,
        Err(err) => {
            warn!("websocket handshake failed for {addr}: {err}");
            return;
        }
    };

    let Some(route) = Route::parse(&uri) else {
        warn!("rejecting {addr}: unroutable upgrade target {uri}");
        return;
    };
    let participant = route.participant.clone();

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (conn, mut outbound_rx) = ConnectionHandle::channel(outbound_capacity);

    // Write pump: the ordered delivery primitive for this connection.
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let text = match message.to_json() {
                Ok(text) => text,
                Err(err) => {
                    error!("failed to serialize outbound message: {err}");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    match route.class {
        ConnectionClass::Matchmaking { practice } => {
            let record = store.get(&participant);
            let deck = record
                .active_deck()
                .filter(|d| !d.card_ids.is_empty())
                .cloned();
            let Some(deck) = deck else {
                warn!(participant = %participant, "refusing matchmaking: no usable active deck");
                conn.notify(ServerMessage::Error {
                    message: "No active or valid deck found. Please set one up.".to_string(),
                });
                writer.abort();
                return;
            };
            if practice {
                let seat = SeatInfo::human(
                    record.id.clone(),
                    record.name.clone(),
                    record.avatar_url.clone(),
                    deck.card_ids,
                    record.rating,
                    conn.clone(),
                );
                spawner(seat, scripted_seat(&catalog));
            } else {
                queue.enqueue(QueueEntry {
                    participant_id: participant.clone(),
                    rating: record.rating,
                    deck_id: deck.id,
                    conn: conn.clone(),
                    enqueued_at: Instant::now(),
                });
                conn.notify(ServerMessage::MatchmakingQueued {
                    message: "You are in the matchmaking queue.".to_string(),
                });
            }
        }
        ConnectionClass::Challenge => {
            broker.connect(participant.clone(), conn.clone());
        }
    }

    // Read loop.
    while let Some(incoming) = ws_rx.next().await {
        match incoming {
            Ok(Message::Text(text)) => {
                let parsed = match ClientMessage::from_json(&text) {
                    Ok(message) => message,
                    Err(err) => {
                        debug!("malformed message from {addr}: {err}");
                        conn.notify(ServerMessage::Error {
                            message: "Invalid message format.".to_string(),
                        });
                        continue;
                    }
                };
                dispatch_message(&participant, parsed, &conn, &queue, &broker, &router).await;
            }
            Ok(Message::Close(_)) => {
                debug!("{addr} closed the connection");
                break;
            }
            Ok(_) => {}
            Err(err) => {
                warn!("websocket error for {addr}: {err}");
                break;
            }
        }
    }

    // Connection gone: silent removal from queue and broker, forfeit for
    // any running match.
    queue.cancel(&participant);
    broker.disconnect(&participant);
    if let Some(session) = router.lookup(&participant) {
        session.disconnect(participant.clone()).await;
    }
    writer.abort();
    info!(participant = %participant, "connection {addr} cleaned up");
}

async fn dispatch_message(
    participant: &ParticipantId,
    message: ClientMessage,
    conn: &ConnectionHandle,
    queue: &MatchmakingQueue,
    broker: &ChallengeBroker,
    router: &SessionRouter,
) {
    match message {
        ClientMessage::PlayerAction(action) => {
            if let Some(session) = router.lookup(participant) {
                session.submit(participant.clone(), action).await;
            } else {
                conn.notify(ServerMessage::Error {
                    message: "No active match.".to_string(),
                });
            }
        }
        ClientMessage::CancelFindMatch => {
            if queue.cancel(participant) {
                conn.notify(ServerMessage::MatchmakingCancelled {
                    reason: "Matchmaking cancelled by user.".to_string(),
                });
            }
        }
        ClientMessage::ChallengeFriend { friend_id } => {
            broker.challenge(participant, &friend_id);
        }
        ClientMessage::ChallengeResponse {
            challenge_id,
            accepted,
        } => {
            broker.respond(participant, challenge_id, accepted);
        }
    }
}
