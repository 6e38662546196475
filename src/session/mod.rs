//! Match Session
//!
//! One running match: its authoritative state, the two participant
//! connections, the turn timer, and scripted-opponent scheduling. Each
//! session is a single-owner tokio task fed by an mpsc command channel, so
//! at most one mutation of a given match state is ever in flight. The
//! [`SessionHandle`] is the only way in.

pub mod rewards;

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::CardCatalog;
use crate::game::engine::{self, EngineError, ParticipantSetup};
use crate::game::state::{MatchId, MatchState, OpponentKind, ParticipantId};
use crate::game::{bot, Action};
use crate::network::connection::ConnectionHandle;
use crate::network::protocol::ServerMessage;
use crate::store::PlayerStore;

/// Tunables for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Time a human participant gets per turn before an EndTurn is
    /// synthesized on their behalf.
    pub turn_duration: Duration,
    /// Bounds of the randomized scripted-opponent think delay.
    pub scripted_delay: (Duration, Duration),
    /// Command channel capacity.
    pub channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            turn_duration: Duration::from_secs(45),
            scripted_delay: (Duration::from_millis(1000), Duration::from_millis(2500)),
            channel_capacity: 64,
        }
    }
}

/// One side of a match as handed to the session by matchmaking, a
/// challenge, or practice-mode construction.
#[derive(Clone)]
pub struct SeatInfo {
    /// Participant identifier.
    pub id: ParticipantId,
    /// Display name.
    pub name: String,
    /// Avatar reference, if any.
    pub avatar_url: Option<String>,
    /// Deck as catalog card ids.
    pub deck_card_ids: Vec<String>,
    /// Rating at match construction time.
    pub rating: u32,
    /// Whether this seat is played by the scripted opponent.
    pub scripted: bool,
    /// Connection, absent for scripted seats.
    pub conn: Option<ConnectionHandle>,
}

impl SeatInfo {
    /// A network-connected human seat.
    pub fn human(
        id: ParticipantId,
        name: String,
        avatar_url: Option<String>,
        deck_card_ids: Vec<String>,
        rating: u32,
        conn: ConnectionHandle,
    ) -> Self {
        Self {
            id,
            name,
            avatar_url,
            deck_card_ids,
            rating,
            scripted: false,
            conn: Some(conn),
        }
    }

    /// A scripted-opponent seat.
    pub fn scripted(id: ParticipantId, name: String, deck_card_ids: Vec<String>) -> Self {
        Self {
            id,
            name,
            avatar_url: None,
            deck_card_ids,
            rating: 0,
            scripted: true,
            conn: None,
        }
    }

    fn setup(&self) -> ParticipantSetup {
        ParticipantSetup {
            id: self.id.clone(),
            name: self.name.clone(),
            avatar_url: self.avatar_url.clone(),
            deck_card_ids: self.deck_card_ids.clone(),
        }
    }
}

/// Commands consumed by the session task.
#[derive(Debug)]
enum SessionCommand {
    /// An inbound action from a connection.
    Action {
        from: ParticipantId,
        action: Action,
    },
    /// A connection closed or errored.
    Disconnect { participant: ParticipantId },
    /// The turn timer fired.
    TurnExpired { epoch: u64 },
    /// A scheduled scripted move is due.
    ScriptedMove { epoch: u64 },
}

/// Cloneable handle for feeding a running session.
#[derive(Clone)]
pub struct SessionHandle {
    match_id: MatchId,
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// The match this handle drives.
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Submit an action on behalf of a participant.
    pub async fn submit(&self, from: ParticipantId, action: Action) -> bool {
        self.tx
            .send(SessionCommand::Action { from, action })
            .await
            .is_ok()
    }

    /// Report a participant's connection as gone.
    pub async fn disconnect(&self, participant: ParticipantId) -> bool {
        self.tx
            .send(SessionCommand::Disconnect { participant })
            .await
            .is_ok()
    }

    /// Whether the session task has finished.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A running match bound to its two participants.
pub struct MatchSession {
    state: MatchState,
    seats: [SeatInfo; 2],
    config: SessionConfig,
    catalog: Arc<CardCatalog>,
    store: Arc<dyn PlayerStore>,
    cmd_tx: mpsc::Sender<SessionCommand>,
    cmd_rx: mpsc::Receiver<SessionCommand>,
    /// Bumped whenever turn ownership changes; stale timer and scripted
    /// wake-ups carry an old epoch and are ignored.
    turn_epoch: u64,
    turn_timer: Option<JoinHandle<()>>,
    scripted_task: Option<JoinHandle<()>>,
}

impl MatchSession {
    /// Initialize a match for two seats and spawn its owner task.
    pub fn spawn(
        catalog: Arc<CardCatalog>,
        store: Arc<dyn PlayerStore>,
        config: SessionConfig,
        first: SeatInfo,
        second: SeatInfo,
    ) -> Result<SessionHandle, EngineError> {
        let opponent_kind = if first.scripted || second.scripted {
            OpponentKind::Scripted
        } else {
            OpponentKind::Human
        };
        let state = engine::initialize(
            &catalog,
            first.setup(),
            second.setup(),
            opponent_kind,
            &mut rand::thread_rng(),
        )?;

        let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_capacity);
        let handle = SessionHandle {
            match_id: state.match_id,
            tx: cmd_tx.clone(),
        };

        let session = Self {
            state,
            seats: [first, second],
            config,
            catalog,
            store,
            cmd_tx,
            cmd_rx,
            turn_epoch: 0,
            turn_timer: None,
            scripted_task: None,
        };
        tokio::spawn(session.run());
        Ok(handle)
    }

    async fn run(mut self) {
        info!(
            match_id = %self.state.match_id,
            first = %self.seats[0].id,
            second = %self.seats[1].id,
            "match session started"
        );
        self.broadcast_state().await;
        self.schedule_turn();

        while let Some(command) = self.cmd_rx.recv().await {
            match command {
                SessionCommand::Action { from, action } => self.handle_action(from, action).await,
                SessionCommand::Disconnect { participant } => {
                    self.handle_disconnect(participant)
                }
                SessionCommand::TurnExpired { epoch } => self.handle_timeout(epoch).await,
                SessionCommand::ScriptedMove { epoch } => self.handle_scripted(epoch).await,
            }
            if self.state.is_game_over {
                break;
            }
        }

        self.finalize().await;
    }

    async fn handle_action(&mut self, from: ParticipantId, action: Action) {
        if self.state.is_game_over {
            self.reject(&from, "The match is already over.").await;
            return;
        }
        if self.state.current_turn != from {
            self.reject(&from, "Not your turn.").await;
            return;
        }
        debug!(match_id = %self.state.match_id, participant = %from, ?action, "applying action");
        self.apply_and_broadcast(action).await;
    }

    async fn apply_and_broadcast(&mut self, action: Action) {
        let was_end_turn = matches!(action, Action::EndTurn);
        let turn_before = self.state.current_turn.clone();

        engine::apply(&self.catalog, &mut self.state, action);
        self.broadcast_state().await;

        if self.state.is_game_over {
            return;
        }
        if self.state.current_turn != turn_before || was_end_turn {
            self.turn_epoch += 1;
            self.schedule_turn();
        } else if self.acting_seat().scripted {
            // The scripted side keeps acting within its turn, one move
            // per wake-up.
            self.schedule_scripted_move();
        }
    }

    fn handle_disconnect(&mut self, participant: ParticipantId) {
        if self.state.is_game_over {
            return;
        }
        warn!(
            match_id = %self.state.match_id,
            participant = %participant,
            "participant disconnected mid-match"
        );
        engine::concede(&mut self.state, &participant, "connection lost");
    }

    async fn handle_timeout(&mut self, epoch: u64) {
        if epoch != self.turn_epoch || self.state.is_game_over || self.acting_seat().scripted {
            return;
        }
        let acting = self.state.current_turn.clone();
        info!(match_id = %self.state.match_id, participant = %acting, "turn timed out");
        let name = self
            .state
            .participant(self.state.acting_slot())
            .name
            .clone();
        self.state.push_log(format!("{name} ran out of time!"));
        self.apply_and_broadcast(Action::EndTurn).await;
    }

    async fn handle_scripted(&mut self, epoch: u64) {
        if epoch != self.turn_epoch || self.state.is_game_over || !self.acting_seat().scripted {
            return;
        }
        let action = bot::choose_action(&self.state);
        debug!(match_id = %self.state.match_id, ?action, "scripted opponent acts");
        self.apply_and_broadcast(action).await;
    }

    /// Arm whatever drives the new acting side: a turn timer for a human,
    /// a delayed wake-up for the scripted opponent. Anything still pending
    /// from the previous turn is aborted first.
    fn schedule_turn(&mut self) {
        self.cancel_pending();
        if self.state.is_game_over {
            return;
        }
        if self.acting_seat().scripted {
            self.schedule_scripted_move();
        } else {
            self.arm_turn_timer();
        }
    }

    fn arm_turn_timer(&mut self) {
        let epoch = self.turn_epoch;
        let tx = self.cmd_tx.clone();
        let duration = self.config.turn_duration;
        self.turn_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = tx.send(SessionCommand::TurnExpired { epoch }).await;
        }));
    }

    fn schedule_scripted_move(&mut self) {
        if let Some(task) = self.scripted_task.take() {
            task.abort();
        }
        let epoch = self.turn_epoch;
        let tx = self.cmd_tx.clone();
        let (min, max) = self.config.scripted_delay;
        let delay = if max > min {
            let jitter = rand::thread_rng().gen_range(0..=(max - min).as_millis() as u64);
            min + Duration::from_millis(jitter)
        } else {
            min
        };
        self.scripted_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SessionCommand::ScriptedMove { epoch }).await;
        }));
    }

    fn cancel_pending(&mut self) {
        if let Some(timer) = self.turn_timer.take() {
            timer.abort();
        }
        if let Some(task) = self.scripted_task.take() {
            task.abort();
        }
    }

    fn acting_seat(&self) -> &SeatInfo {
        &self.seats[self.state.acting_slot().index()]
    }

    fn seat_of(&self, participant: &ParticipantId) -> Option<&SeatInfo> {
        self.seats.iter().find(|s| s.id == *participant)
    }

    async fn reject(&self, participant: &ParticipantId, message: &str) {
        if let Some(conn) = self.seat_of(participant).and_then(|s| s.conn.as_ref()) {
            conn.send(ServerMessage::Error {
                message: message.to_string(),
            })
            .await;
        }
    }

    /// Send the full state to both connections, in order, before the next
    /// command is consumed.
    async fn broadcast_state(&self) {
        for seat in &self.seats {
            if let Some(conn) = &seat.conn {
                conn.send(ServerMessage::GameStateUpdate(Box::new(self.state.clone())))
                    .await;
            }
        }
    }

    /// Runs exactly once, when the session task winds down.
    async fn finalize(&mut self) {
        self.cancel_pending();
        if !self.state.is_game_over {
            info!(match_id = %self.state.match_id, "session closed without a result");
            return;
        }
        let Some(winner) = self.state.winner.clone() else {
            return;
        };
        info!(match_id = %self.state.match_id, winner = %winner, "match finished");

        for seat in &self.seats {
            if let Some(conn) = &seat.conn {
                conn.send(ServerMessage::GameOver {
                    winner_id: winner.clone(),
                    match_id: self.state.match_id,
                })
                .await;
            }
        }

        for index in 0..2 {
            let seat = &self.seats[index];
            if seat.scripted {
                continue;
            }
            let versus_scripted = self.seats[1 - index].scripted;
            let won = seat.id == winner;
            let update =
                rewards::settle_participant(self.store.as_ref(), &seat.id, won, versus_scripted);
            if let Some(conn) = &seat.conn {
                if conn.is_open() {
                    conn.send(ServerMessage::XpUpdate(update)).await;
                }
            }
        }
    }
}
