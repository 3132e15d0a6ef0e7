use core::error::Error;
use std::sync::Arc;

use shared::{received_signal_command::ReceivedSignalCommand, signal_command::SignalCommand};
use tokio::{net::TcpStream, sync::mpsc};

use crate::{
    command_handler::CommandHandler,
    peer_hub::{ConnectionId, PeerHub},
    relay::SignalRelay,
    room_registry::RoomRegistry,
    session::SessionBinding,
};

pub struct TcpHandler;

impl TcpHandler {
    pub async fn handle_stream(
        mut stream: TcpStream,
        conn_id: ConnectionId,
        current_binding: &mut Option<SessionBinding>,
        registry: Arc<RoomRegistry>,
        peer_hub: Arc<PeerHub>,
        relay: Arc<SignalRelay>,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel();

        peer_hub.register(conn_id, outgoing_tx).await;

        loop {
            tokio::select! {

                result = SignalCommand::read_from_stream(&mut stream) => {

                    let incoming_command = match result? {
                        ReceivedSignalCommand::EOF => return Ok(()),
                        ReceivedSignalCommand::Command(command) => command,
                    };

                    CommandHandler::handle_command(
                        &incoming_command,
                        conn_id,
                        current_binding,
                        &registry,
                        &peer_hub,
                        &relay,
                    )
                    .await?;
                }

                result = outgoing_rx.recv() => {

                    let outgoing_command = match result {
                        Some(command) => command,
                        None => return Ok(()),
                    };

                    outgoing_command.write_to_stream(&mut stream).await?;
                }
            }
        }
    }
}
