use log::info;
use serde_json::Value;
use shared::{signal_command::SignalCommand, signal_event_id::SignalEventId};

use crate::peer_hub::{ConnectionId, PeerHub};

#[derive(Debug, Clone, Copy)]
pub struct RelayPolicy {
    pub relay_candidates: bool,
    pub relay_messages: bool,
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self {
            relay_candidates: true,
            relay_messages: false,
        }
    }
}

// Stateless pass-through. Payloads are forwarded unchanged to the rest of
// the room; the sender's membership is not checked.
pub struct SignalRelay {
    policy: RelayPolicy,
}

impl SignalRelay {
    pub fn new(policy: RelayPolicy) -> Self {
        Self { policy }
    }

    fn should_relay(&self, event_id: SignalEventId) -> bool {
        match event_id {
            SignalEventId::Offer | SignalEventId::Answer => true,
            SignalEventId::Candidate => self.policy.relay_candidates,
            SignalEventId::Message => self.policy.relay_messages,
            _ => false,
        }
    }

    // Err carries the message for the error event back to the sender.
    pub async fn relay(
        &self,
        event_id: SignalEventId,
        payload: Value,
        sender: ConnectionId,
        peer_hub: &PeerHub,
    ) -> Result<(), String> {
        let room_id = match payload.get("roomId").and_then(Value::as_str) {
            Some(room_id) => room_id.to_string(),
            None => return Err(format!("{} requires a roomId", event_id)),
        };

        if !self.should_relay(event_id) {
            info!(
                "{} from connection {} in room {} (not relayed)",
                event_id, sender, room_id
            );
            return Ok(());
        }

        peer_hub
            .broadcast_to_room(&room_id, SignalCommand::Json(event_id, payload), Some(sender))
            .await;

        Ok(())
    }
}
