use core::error::Error;

use log::{info, warn};
use serde_json::Value;
use shared::{
    MAX_ID_LENGTH, is_valid_id, signal_command::SignalCommand, signal_event_id::SignalEventId,
};

use crate::{
    peer_hub::{ConnectionId, PeerHub},
    relay::SignalRelay,
    room_registry::RoomRegistry,
    session::SessionBinding,
};

pub struct CommandHandler;

impl CommandHandler {
    pub async fn handle_command(
        incoming_command: &SignalCommand,
        conn_id: ConnectionId,
        current_binding: &mut Option<SessionBinding>,
        registry: &RoomRegistry,
        peer_hub: &PeerHub,
        relay: &SignalRelay,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        match incoming_command {
            SignalCommand::Json(SignalEventId::Join, payload) => {
                Self::handle_join(payload.clone(), conn_id, current_binding, registry, peer_hub)
                    .await;
            }

            SignalCommand::Json(SignalEventId::Leave, _) => match current_binding.take() {
                Some(binding) => {
                    Self::handle_user_leave(&binding, conn_id, registry, peer_hub).await;
                }
                None => {
                    Self::send_error(conn_id, "leave received without an active room", peer_hub)
                        .await;
                }
            },

            SignalCommand::Json(
                event_id @ (SignalEventId::Offer
                | SignalEventId::Answer
                | SignalEventId::Candidate
                | SignalEventId::Message),
                payload,
            ) => {
                if let Err(message) = relay.relay(*event_id, payload.clone(), conn_id, peer_hub).await
                {
                    Self::send_error(conn_id, &message, peer_hub).await;
                }
            }

            SignalCommand::Simple(SignalEventId::Ping) => {
                peer_hub
                    .send_to(conn_id, SignalCommand::Simple(SignalEventId::Pong))
                    .await;
            }

            other => {
                warn!(
                    "Ignoring unexpected {} from connection {}",
                    other.event_id(),
                    conn_id
                );
            }
        }

        Ok(())
    }

    async fn handle_join(
        payload: Value,
        conn_id: ConnectionId,
        current_binding: &mut Option<SessionBinding>,
        registry: &RoomRegistry,
        peer_hub: &PeerHub,
    ) {
        if current_binding.is_some() {
            Self::send_error(conn_id, "already in a room, leave it first", peer_hub).await;
            return;
        }

        let (room_id, user_id) = match Self::join_identifiers(&payload) {
            Ok(ids) => ids,
            Err(message) => {
                Self::send_error(conn_id, &message, peer_hub).await;
                return;
            }
        };

        let member = match registry.join_room(&room_id, &user_id, payload).await {
            Ok(member) => member,
            Err(e) => {
                Self::send_error(conn_id, &e.to_string(), peer_hub).await;
                return;
            }
        };

        *current_binding = Some(SessionBinding {
            user_id: member.user_id.clone(),
            room_id: member.room_id.clone(),
        });

        peer_hub.join_group(&room_id, conn_id).await;

        info!("{} joined room {}", user_id, room_id);

        // the whole room, joiner included
        peer_hub
            .broadcast_to_room(
                &room_id,
                SignalCommand::Json(SignalEventId::Welcome, member.payload.clone()),
                None,
            )
            .await;

        // existing peers initiate the offer
        peer_hub
            .broadcast_to_room(
                &room_id,
                SignalCommand::Json(SignalEventId::CreateOffer, member.payload),
                Some(conn_id),
            )
            .await;
    }

    fn join_identifiers(payload: &Value) -> Result<(String, String), String> {
        let room_id = payload
            .get("roomId")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let user_id = payload
            .get("userId")
            .and_then(Value::as_str)
            .unwrap_or_default();

        if room_id.is_empty() || user_id.is_empty() {
            return Err("join requires a roomId and a userId".to_string());
        }

        for (label, id) in [("roomId", room_id), ("userId", user_id)] {
            if id.len() > MAX_ID_LENGTH {
                return Err(format!(
                    "{} must be at most {} characters",
                    label, MAX_ID_LENGTH
                ));
            }

            if !is_valid_id(id) {
                return Err(format!(
                    "{} must contain only letters, numbers, underscores (_), or hyphens (-)",
                    label
                ));
            }
        }

        Ok((room_id.to_string(), user_id.to_string()))
    }

    // Explicit leave and disconnect both end up here, so the two paths
    // cannot drift apart.
    pub async fn handle_user_leave(
        binding: &SessionBinding,
        conn_id: ConnectionId,
        registry: &RoomRegistry,
        peer_hub: &PeerHub,
    ) {
        peer_hub.leave_group(&binding.room_id, conn_id).await;

        let Some(outcome) = registry.leave_room(&binding.room_id, &binding.user_id).await else {
            return;
        };

        info!("{} left room {}", binding.user_id, binding.room_id);

        peer_hub
            .broadcast_to_room(
                &binding.room_id,
                SignalCommand::Json(SignalEventId::Leave, outcome.member.payload),
                Some(conn_id),
            )
            .await;

        if outcome.room_closed {
            info!("room {} closed", binding.room_id);
        }
    }

    async fn send_error(conn_id: ConnectionId, message: &str, peer_hub: &PeerHub) {
        peer_hub
            .send_to(
                conn_id,
                SignalCommand::String(SignalEventId::ErrorResponse, message.to_string()),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

    use crate::relay::RelayPolicy;

    use super::*;

    struct Fixture {
        registry: RoomRegistry,
        peer_hub: PeerHub,
        relay: SignalRelay,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: RoomRegistry::new(),
                peer_hub: PeerHub::new(),
                relay: SignalRelay::new(RelayPolicy::default()),
            }
        }

        async fn connect(&self, conn_id: ConnectionId) -> UnboundedReceiver<SignalCommand> {
            let (tx, rx) = unbounded_channel();
            self.peer_hub.register(conn_id, tx).await;
            rx
        }

        async fn dispatch(
            &self,
            command: SignalCommand,
            conn_id: ConnectionId,
            binding: &mut Option<SessionBinding>,
        ) {
            CommandHandler::handle_command(
                &command,
                conn_id,
                binding,
                &self.registry,
                &self.peer_hub,
                &self.relay,
            )
            .await
            .unwrap();
        }

        async fn join(
            &self,
            room_id: &str,
            user_id: &str,
            conn_id: ConnectionId,
            binding: &mut Option<SessionBinding>,
        ) {
            self.dispatch(
                SignalCommand::Json(
                    SignalEventId::Join,
                    json!({ "roomId": room_id, "userId": user_id }),
                ),
                conn_id,
                binding,
            )
            .await;
        }
    }

    fn drain(rx: &mut UnboundedReceiver<SignalCommand>) -> Vec<SignalCommand> {
        let mut commands = Vec::new();
        while let Ok(command) = rx.try_recv() {
            commands.push(command);
        }
        commands
    }

    #[tokio::test]
    async fn join_fans_out_welcome_to_room_and_create_offer_to_others() {
        let fx = Fixture::new();
        let mut alice_rx = fx.connect(1).await;
        let mut bob_rx = fx.connect(2).await;

        let mut alice_binding = None;
        fx.join("r1", "alice", 1, &mut alice_binding).await;
        drain(&mut alice_rx);

        let mut bob_binding = None;
        fx.join("r1", "bob", 2, &mut bob_binding).await;

        let to_alice = drain(&mut alice_rx);
        assert_eq!(to_alice.len(), 2);
        match &to_alice[0] {
            SignalCommand::Json(SignalEventId::Welcome, payload) => {
                assert_eq!(payload["userId"], "bob");
            }
            other => panic!("unexpected command: {:?}", other),
        }
        match &to_alice[1] {
            SignalCommand::Json(SignalEventId::CreateOffer, payload) => {
                assert_eq!(payload["userId"], "bob");
            }
            other => panic!("unexpected command: {:?}", other),
        }

        // the joiner sees its own welcome, never its own createOffer
        let to_bob = drain(&mut bob_rx);
        assert_eq!(to_bob.len(), 1);
        match &to_bob[0] {
            SignalCommand::Json(SignalEventId::Welcome, payload) => {
                assert_eq!(payload["userId"], "bob");
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert_eq!(bob_binding.unwrap().room_id, "r1");
    }

    #[tokio::test]
    async fn join_failure_reaches_only_the_joiner() {
        let fx = Fixture::new();
        let mut alice_rx = fx.connect(1).await;
        let mut bob_rx = fx.connect(2).await;
        let mut carol_rx = fx.connect(3).await;

        let mut alice_binding = None;
        let mut bob_binding = None;
        let mut carol_binding = None;
        fx.join("r1", "alice", 1, &mut alice_binding).await;
        fx.join("r1", "bob", 2, &mut bob_binding).await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        fx.join("r1", "carol", 3, &mut carol_binding).await;

        let to_carol = drain(&mut carol_rx);
        assert_eq!(
            to_carol,
            [SignalCommand::String(
                SignalEventId::ErrorResponse,
                "room is full, please try again later".to_string()
            )]
        );
        assert!(carol_binding.is_none());
        assert!(drain(&mut alice_rx).is_empty());
        assert!(drain(&mut bob_rx).is_empty());
    }

    #[tokio::test]
    async fn duplicate_join_is_reported_to_the_joiner() {
        let fx = Fixture::new();
        let mut alice_rx = fx.connect(1).await;
        let mut imposter_rx = fx.connect(2).await;

        let mut alice_binding = None;
        fx.join("r1", "alice", 1, &mut alice_binding).await;
        drain(&mut alice_rx);

        let mut imposter_binding = None;
        fx.join("r1", "alice", 2, &mut imposter_binding).await;

        let to_imposter = drain(&mut imposter_rx);
        assert_eq!(
            to_imposter,
            [SignalCommand::String(
                SignalEventId::ErrorResponse,
                "user is already in the room".to_string()
            )]
        );
        assert!(imposter_binding.is_none());
    }

    #[tokio::test]
    async fn join_with_missing_or_invalid_identifiers_is_rejected() {
        let fx = Fixture::new();
        let mut rx = fx.connect(1).await;
        let mut binding = None;

        fx.dispatch(
            SignalCommand::Json(SignalEventId::Join, json!({ "roomId": "r1" })),
            1,
            &mut binding,
        )
        .await;
        fx.dispatch(
            SignalCommand::Json(
                SignalEventId::Join,
                json!({ "roomId": "r 1", "userId": "alice" }),
            ),
            1,
            &mut binding,
        )
        .await;

        let replies = drain(&mut rx);
        assert_eq!(replies.len(), 2);
        assert!(
            replies
                .iter()
                .all(|c| c.event_id() == SignalEventId::ErrorResponse)
        );
        assert!(binding.is_none());
        assert!(fx.registry.find_room("r1").await.is_none());
    }

    #[tokio::test]
    async fn second_join_on_a_bound_connection_is_rejected() {
        let fx = Fixture::new();
        let mut rx = fx.connect(1).await;
        let mut binding = None;

        fx.join("r1", "alice", 1, &mut binding).await;
        drain(&mut rx);

        fx.join("r2", "alice", 1, &mut binding).await;

        let replies = drain(&mut rx);
        assert_eq!(
            replies,
            [SignalCommand::String(
                SignalEventId::ErrorResponse,
                "already in a room, leave it first".to_string()
            )]
        );
        assert_eq!(binding.unwrap().room_id, "r1");
        assert!(fx.registry.find_room("r2").await.is_none());
    }

    #[tokio::test]
    async fn leave_broadcast_reaches_remaining_members_only() {
        let fx = Fixture::new();
        let mut alice_rx = fx.connect(1).await;
        let mut bob_rx = fx.connect(2).await;

        let mut alice_binding = None;
        let mut bob_binding = None;
        fx.join("r1", "alice", 1, &mut alice_binding).await;
        fx.join("r1", "bob", 2, &mut bob_binding).await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        fx.dispatch(
            SignalCommand::Json(SignalEventId::Leave, json!({})),
            1,
            &mut alice_binding,
        )
        .await;

        let to_bob = drain(&mut bob_rx);
        assert_eq!(to_bob.len(), 1);
        match &to_bob[0] {
            SignalCommand::Json(SignalEventId::Leave, payload) => {
                assert_eq!(payload["userId"], "alice");
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(drain(&mut alice_rx).is_empty());
        assert!(alice_binding.is_none());

        let room = fx.registry.find_room("r1").await.unwrap();
        assert_eq!(room.members.len(), 1);
        assert_eq!(room.members[0].user_id, "bob");
    }

    #[tokio::test]
    async fn leave_without_a_binding_is_an_error() {
        let fx = Fixture::new();
        let mut rx = fx.connect(1).await;
        let mut binding = None;

        fx.dispatch(
            SignalCommand::Json(SignalEventId::Leave, json!({})),
            1,
            &mut binding,
        )
        .await;

        let replies = drain(&mut rx);
        assert_eq!(
            replies,
            [SignalCommand::String(
                SignalEventId::ErrorResponse,
                "leave received without an active room".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn disconnect_cleanup_matches_explicit_leave() {
        let fx = Fixture::new();

        // explicit leave
        let mut alice_binding = None;
        let mut bob_binding = None;
        let mut alice_rx = fx.connect(1).await;
        let mut bob_rx = fx.connect(2).await;
        fx.join("r1", "alice", 1, &mut alice_binding).await;
        fx.join("r1", "bob", 2, &mut bob_binding).await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        fx.dispatch(
            SignalCommand::Json(SignalEventId::Leave, json!({})),
            2,
            &mut bob_binding,
        )
        .await;
        let after_leave = fx.registry.find_room("r1").await.unwrap();
        let leave_events = drain(&mut alice_rx);

        // abrupt disconnect, as the accept loop runs it
        let mut carol_binding = None;
        let mut dave_rx = fx.connect(3).await;
        let mut carol_rx = fx.connect(4).await;
        let mut dave_binding = None;
        fx.join("r2", "dave", 3, &mut dave_binding).await;
        fx.join("r2", "carol", 4, &mut carol_binding).await;
        drain(&mut dave_rx);
        drain(&mut carol_rx);

        let binding = carol_binding.take().unwrap();
        CommandHandler::handle_user_leave(&binding, 4, &fx.registry, &fx.peer_hub).await;
        fx.peer_hub.unregister(4).await;

        let after_disconnect = fx.registry.find_room("r2").await.unwrap();
        let disconnect_events = drain(&mut dave_rx);

        assert_eq!(after_leave.members.len(), after_disconnect.members.len());
        assert_eq!(leave_events.len(), disconnect_events.len());
        assert_eq!(leave_events[0].event_id(), SignalEventId::Leave);
        assert_eq!(disconnect_events[0].event_id(), SignalEventId::Leave);
    }

    #[tokio::test]
    async fn last_leave_prunes_the_room() {
        let fx = Fixture::new();
        let mut rx = fx.connect(1).await;
        let mut binding = None;

        fx.join("r1", "alice", 1, &mut binding).await;
        drain(&mut rx);

        fx.dispatch(
            SignalCommand::Json(SignalEventId::Leave, json!({})),
            1,
            &mut binding,
        )
        .await;

        assert!(fx.registry.find_room("r1").await.is_none());
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let fx = Fixture::new();
        let mut rx = fx.connect(1).await;
        let mut binding = None;

        fx.dispatch(SignalCommand::Simple(SignalEventId::Ping), 1, &mut binding)
            .await;

        assert_eq!(
            drain(&mut rx),
            [SignalCommand::Simple(SignalEventId::Pong)]
        );
    }

    #[tokio::test]
    async fn server_side_events_from_clients_are_ignored() {
        let fx = Fixture::new();
        let mut rx = fx.connect(1).await;
        let mut binding = None;

        fx.dispatch(
            SignalCommand::Json(SignalEventId::Welcome, json!({ "roomId": "r1" })),
            1,
            &mut binding,
        )
        .await;

        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn relay_from_an_unbound_connection_is_permitted() {
        let fx = Fixture::new();
        let mut alice_rx = fx.connect(1).await;
        let mut alice_binding = None;
        fx.join("r1", "alice", 1, &mut alice_binding).await;
        drain(&mut alice_rx);

        // connection 2 never joined anything
        let mut outsider_binding = None;
        let _outsider_rx = fx.connect(2).await;
        fx.dispatch(
            SignalCommand::Json(
                SignalEventId::Offer,
                json!({ "roomId": "r1", "sdp": "X" }),
            ),
            2,
            &mut outsider_binding,
        )
        .await;

        let to_alice = drain(&mut alice_rx);
        assert_eq!(to_alice.len(), 1);
        assert_eq!(to_alice[0].event_id(), SignalEventId::Offer);
    }
}
