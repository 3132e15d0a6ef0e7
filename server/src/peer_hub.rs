use std::collections::HashMap;

use log::debug;
use shared::signal_command::SignalCommand;
use tokio::sync::{Mutex, mpsc::UnboundedSender};

pub type ConnectionId = u64;

// Outbound half of every connection plus the room groups. Delivery is
// fire-and-forget: a send to a connection that is already gone is dropped.
#[derive(Default)]
pub struct PeerHub {
    senders: Mutex<HashMap<ConnectionId, UnboundedSender<SignalCommand>>>,
    groups: Mutex<HashMap<String, Vec<ConnectionId>>>,
}

impl PeerHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, conn_id: ConnectionId, sender: UnboundedSender<SignalCommand>) {
        self.senders.lock().await.insert(conn_id, sender);
    }

    pub async fn unregister(&self, conn_id: ConnectionId) {
        self.senders.lock().await.remove(&conn_id);

        let mut groups = self.groups.lock().await;
        for conns in groups.values_mut() {
            conns.retain(|id| *id != conn_id);
        }
        groups.retain(|_, conns| !conns.is_empty());
    }

    pub async fn join_group(&self, room_id: &str, conn_id: ConnectionId) {
        let mut groups = self.groups.lock().await;
        let conns = groups.entry(room_id.to_string()).or_default();

        if !conns.contains(&conn_id) {
            conns.push(conn_id);
        }
    }

    pub async fn leave_group(&self, room_id: &str, conn_id: ConnectionId) {
        let mut groups = self.groups.lock().await;

        if let Some(conns) = groups.get_mut(room_id) {
            conns.retain(|id| *id != conn_id);

            if conns.is_empty() {
                groups.remove(room_id);
            }
        }
    }

    pub async fn send_to(&self, conn_id: ConnectionId, command: SignalCommand) {
        if let Some(sender) = self.senders.lock().await.get(&conn_id) {
            if sender.send(command).is_err() {
                debug!("Dropping command for closed connection {}", conn_id);
            }
        }
    }

    pub async fn broadcast_to_room(
        &self,
        room_id: &str,
        command: SignalCommand,
        exclude: Option<ConnectionId>,
    ) {
        let targets: Vec<ConnectionId> = match self.groups.lock().await.get(room_id) {
            Some(conns) => conns
                .iter()
                .copied()
                .filter(|id| Some(*id) != exclude)
                .collect(),
            None => return,
        };

        let senders = self.senders.lock().await;

        for conn_id in targets {
            if let Some(sender) = senders.get(&conn_id) {
                if sender.send(command.clone()).is_err() {
                    debug!("Dropping command for closed connection {}", conn_id);
                }
            }
        }
    }
}
