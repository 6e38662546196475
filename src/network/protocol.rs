//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket. Every
//! message is a JSON envelope `{ "type": ..., "payload": ... }`; the
//! payload is absent for bare notifications.

use serde::{Deserialize, Serialize};

use crate::game::actions::Action;
use crate::game::state::{MatchId, MatchState, ParticipantId};
use crate::lobby::challenge::ChallengeId;
use crate::session::rewards::ProgressionUpdate;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Submit an action for the participant's running match.
    PlayerAction(Action),

    /// Leave the matchmaking queue.
    CancelFindMatch,

    /// Invite a friend to a direct match.
    ChallengeFriend {
        /// Participant id of the friend to challenge.
        friend_id: ParticipantId,
    },

    /// Accept or decline an incoming challenge.
    ChallengeResponse {
        /// The challenge being answered.
        challenge_id: ChallengeId,
        /// True to accept, false to decline.
        accepted: bool,
    },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// Acknowledgement that the participant entered the queue.
    MatchmakingQueued {
        /// Human-readable confirmation.
        message: String,
    },

    /// The participant left the queue, or a pairing was aborted.
    MatchmakingCancelled {
        /// Why the queue membership ended.
        reason: String,
    },

    /// Full authoritative snapshot, sent at match start and after every
    /// applied action.
    GameStateUpdate(Box<MatchState>),

    /// The match reached a terminal state.
    GameOver {
        /// Winning participant.
        winner_id: ParticipantId,
        /// The finished match.
        match_id: MatchId,
    },

    /// Rejection or failure notice; the connection stays open.
    Error {
        /// Human-readable message.
        message: String,
    },

    /// A challenge arrived for this participant.
    ChallengeIncoming {
        /// Challenge identifier to respond with.
        challenge_id: ChallengeId,
        /// Who is challenging.
        challenger_id: ParticipantId,
        /// Challenger display name.
        challenger_name: String,
        /// Challenger rating.
        challenger_rating: u32,
    },

    /// Confirmation to the challenger that the invitation went out.
    ChallengeSent {
        /// Challenge identifier.
        challenge_id: ChallengeId,
        /// Who was challenged.
        challenged_id: ParticipantId,
    },

    /// The challenged participant declined.
    ChallengeDeclined {
        /// Challenge identifier.
        challenge_id: ChallengeId,
        /// Display name of the decliner.
        responder_name: String,
    },

    /// A pending challenge became void.
    ChallengeCancelled {
        /// Challenge identifier.
        challenge_id: ChallengeId,
        /// Why it was cancelled.
        reason: String,
    },

    /// Post-match progression notice.
    XpUpdate(ProgressionUpdate),
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::actions::TargetRef;
    use crate::game::state::InstanceId;

    #[test]
    fn action_envelope_round_trips() {
        let msg = ClientMessage::PlayerAction(Action::Attack {
            attacker: InstanceId::fresh(),
            target: TargetRef::OpponentHero,
        });

        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"PLAYER_ACTION\""));
        assert!(json.contains("\"type\":\"ATTACK\""));
        assert!(json.contains("opponent_hero"));

        let parsed = ClientMessage::from_json(&json).unwrap();
        assert!(matches!(parsed, ClientMessage::PlayerAction(Action::Attack { .. })));
    }

    #[test]
    fn bare_envelope_needs_no_payload() {
        let parsed = ClientMessage::from_json("{\"type\":\"CANCEL_FIND_MATCH\"}").unwrap();
        assert!(matches!(parsed, ClientMessage::CancelFindMatch));
    }

    #[test]
    fn challenge_response_envelope_round_trips() {
        let msg = ClientMessage::ChallengeResponse {
            challenge_id: ChallengeId::fresh(),
            accepted: true,
        };
        let json = msg.to_json().unwrap();
        let parsed = ClientMessage::from_json(&json).unwrap();
        assert!(matches!(
            parsed,
            ClientMessage::ChallengeResponse { accepted: true, .. }
        ));
    }

    #[test]
    fn server_error_envelope() {
        let msg = ServerMessage::Error {
            message: "Not your turn.".to_string(),
        };
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"ERROR\""));
        assert!(json.contains("Not your turn."));
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        assert!(ClientMessage::from_json("{\"type\":\"HACK_THE_GIBSON\"}").is_err());
        assert!(ClientMessage::from_json("not even json").is_err());
    }
}
