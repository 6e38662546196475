//! Challenge Broker
//!
//! Direct friend challenges: tracks which participants are reachable on a
//! challenge connection, holds outstanding invitations, and constructs a
//! match session on acceptance. The broker owns its registries and gets
//! the player store and the session spawner injected.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::ParticipantId;
use crate::lobby::SessionSpawner;
use crate::network::connection::ConnectionHandle;
use crate::network::protocol::ServerMessage;
use crate::session::SeatInfo;
use crate::store::PlayerStore;

/// Unique challenge identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallengeId(Uuid);

impl ChallengeId {
    /// Mint a fresh challenge id.
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of a challenge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    /// Waiting for the challenged participant's response.
    Pending,
    /// Accepted; a session was constructed.
    Accepted,
    /// Declined by the challenged participant.
    Declined,
    /// Voided by a disconnect or a failed validation.
    Cancelled,
}

/// An outstanding invitation.
///
/// The challenger's connection and deck card ids are snapshotted at
/// invitation time; the responder's deck is read fresh at acceptance.
#[derive(Clone)]
pub struct Challenge {
    /// Challenge identifier.
    pub id: ChallengeId,
    /// Who issued the invitation.
    pub challenger_id: ParticipantId,
    /// Who it is addressed to.
    pub challenged_id: ParticipantId,
    /// Challenger connection at invitation time.
    pub challenger_conn: ConnectionHandle,
    /// Challenger active-deck card ids at invitation time.
    pub challenger_deck: Vec<String>,
    /// Current lifecycle state.
    pub status: ChallengeStatus,
}

#[derive(Default)]
struct BrokerInner {
    online: HashMap<ParticipantId, ConnectionHandle>,
    pending: HashMap<ChallengeId, Challenge>,
}

/// Registry of online challenge participants and pending invitations.
pub struct ChallengeBroker {
    store: Arc<dyn PlayerStore>,
    spawn_session: SessionSpawner,
    inner: Mutex<BrokerInner>,
}

impl ChallengeBroker {
    /// Build a broker around the injected store and session spawner.
    pub fn new(store: Arc<dyn PlayerStore>, spawn_session: SessionSpawner) -> Self {
        Self {
            store,
            spawn_session,
            inner: Mutex::new(BrokerInner::default()),
        }
    }

    fn locked(&self) -> MutexGuard<'_, BrokerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a participant's challenge connection.
    pub fn connect(&self, participant: ParticipantId, conn: ConnectionHandle) {
        let mut inner = self.locked();
        inner.online.insert(participant.clone(), conn);
        info!(participant = %participant, online = inner.online.len(), "challenge connection registered");
    }

    /// Number of participants currently reachable.
    pub fn online_count(&self) -> usize {
        self.locked().online.len()
    }

    /// Number of outstanding invitations.
    pub fn pending_count(&self) -> usize {
        self.locked().pending.len()
    }

    /// Issue a challenge from one participant to another.
    ///
    /// Requires the challenger to hold a non-empty active deck and the
    /// challenged participant to be online; notifies both sides on
    /// success, only the challenger on failure.
    pub fn challenge(&self, challenger_id: &ParticipantId, challenged_id: &ParticipantId) {
        let challenger = self.store.get(challenger_id);

        let mut inner = self.locked();
        let Some(challenger_conn) = inner.online.get(challenger_id).cloned() else {
            debug!(participant = %challenger_id, "challenge from unregistered connection");
            return;
        };

        let deck = challenger
            .active_deck()
            .filter(|d| !d.card_ids.is_empty())
            .cloned();
        let Some(deck) = deck else {
            challenger_conn.notify(ServerMessage::Error {
                message: "You have no active deck selected.".to_string(),
            });
            return;
        };

        let Some(challenged_conn) = inner
            .online
            .get(challenged_id)
            .filter(|c| c.is_open())
            .cloned()
        else {
            challenger_conn.notify(ServerMessage::Error {
                message: format!("{challenged_id} is not online or available."),
            });
            return;
        };

        let id = ChallengeId::fresh();
        inner.pending.insert(
            id,
            Challenge {
                id,
                challenger_id: challenger_id.clone(),
                challenged_id: challenged_id.clone(),
                challenger_conn: challenger_conn.clone(),
                challenger_deck: deck.card_ids,
                status: ChallengeStatus::Pending,
            },
        );
        drop(inner);

        challenged_conn.notify(ServerMessage::ChallengeIncoming {
            challenge_id: id,
            challenger_id: challenger_id.clone(),
            challenger_name: challenger.name.clone(),
            challenger_rating: challenger.rating,
        });
        challenger_conn.notify(ServerMessage::ChallengeSent {
            challenge_id: id,
            challenged_id: challenged_id.clone(),
        });
        info!(
            challenge = %id,
            challenger = %challenger_id,
            challenged = %challenged_id,
            "challenge issued"
        );
    }

    /// Resolve a pending challenge with an accept or a decline.
    pub fn respond(&self, responder_id: &ParticipantId, challenge_id: ChallengeId, accepted: bool) {
        let (challenge, responder_conn, challenger_live) = {
            let mut inner = self.locked();
            let responder_conn = inner.online.get(responder_id).cloned();
            let valid = matches!(
                inner.pending.get(&challenge_id),
                Some(c) if c.challenged_id == *responder_id && c.status == ChallengeStatus::Pending
            );
            if !valid {
                if let Some(conn) = responder_conn {
                    conn.notify(ServerMessage::Error {
                        message: "Invalid or expired challenge.".to_string(),
                    });
                }
                return;
            }
            let challenge = match inner.pending.remove(&challenge_id) {
                Some(c) => c,
                None => return,
            };
            let challenger_live = inner.online.get(&challenge.challenger_id).cloned();
            (challenge, responder_conn, challenger_live)
        };

        let responder = self.store.get(responder_id);

        if !accepted {
            info!(challenge = %challenge_id, responder = %responder_id, "challenge declined");
            if let Some(conn) = challenger_live.filter(|c| c.is_open()) {
                conn.notify(ServerMessage::ChallengeDeclined {
                    challenge_id,
                    responder_name: responder.name,
                });
            }
            return;
        }

        let Some(challenger_conn) = challenger_live.filter(|c| c.is_open()) else {
            warn!(challenge = %challenge_id, "challenger left before acceptance");
            if let Some(conn) = responder_conn {
                conn.notify(ServerMessage::Error {
                    message: "Challenger is no longer online.".to_string(),
                });
            }
            return;
        };
        let Some(responder_conn) = responder_conn.filter(|c| c.is_open()) else {
            challenger_conn.notify(ServerMessage::ChallengeCancelled {
                challenge_id,
                reason: "Responder connection was lost.".to_string(),
            });
            return;
        };

        let responder_deck = responder
            .active_deck()
            .filter(|d| !d.card_ids.is_empty())
            .cloned();
        let Some(responder_deck) = responder_deck else {
            responder_conn.notify(ServerMessage::Error {
                message: "You have no active deck.".to_string(),
            });
            challenger_conn.notify(ServerMessage::ChallengeCancelled {
                challenge_id,
                reason: "Opponent has no active deck.".to_string(),
            });
            return;
        };

        let challenger = self.store.get(&challenge.challenger_id);
        info!(
            challenge = %challenge_id,
            challenger = %challenge.challenger_id,
            responder = %responder_id,
            "challenge accepted, constructing match"
        );
        // Challenger plays the deck snapshotted at invitation time.
        let first = SeatInfo::human(
            challenger.id.clone(),
            challenger.name.clone(),
            challenger.avatar_url.clone(),
            challenge.challenger_deck.clone(),
            challenger.rating,
            challenger_conn,
        );
        let second = SeatInfo::human(
            responder.id.clone(),
            responder.name.clone(),
            responder.avatar_url.clone(),
            responder_deck.card_ids,
            responder.rating,
            responder_conn,
        );
        (self.spawn_session)(first, second);
    }

    /// Withdraw a participant: drop their connection and cancel every
    /// pending challenge naming them, notifying whichever party remains.
    pub fn disconnect(&self, participant: &ParticipantId) {
        let mut inner = self.locked();
        inner.online.remove(participant);

        let affected: Vec<ChallengeId> = inner
            .pending
            .values()
            .filter(|c| c.challenger_id == *participant || c.challenged_id == *participant)
            .map(|c| c.id)
            .collect();

        for id in affected {
            let Some(mut challenge) = inner.pending.remove(&id) else {
                continue;
            };
            challenge.status = ChallengeStatus::Cancelled;
            let other = if challenge.challenger_id == *participant {
                &challenge.challenged_id
            } else {
                &challenge.challenger_id
            };
            if let Some(conn) = inner.online.get(other) {
                conn.notify(ServerMessage::ChallengeCancelled {
                    challenge_id: id,
                    reason: format!("{participant} disconnected during the challenge."),
                });
            }
            info!(challenge = %id, participant = %participant, "pending challenge cancelled");
        }
    }
}
