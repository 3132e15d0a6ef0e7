use core::error::Error;
use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use log::{error, info};
use tokio::net::TcpListener;

use crate::{
    command_handler::CommandHandler,
    peer_hub::PeerHub,
    relay::{RelayPolicy, SignalRelay},
    room_registry::RoomRegistry,
    tcp_handler::TcpHandler,
};

pub struct SignalServer {
    tcp_listener: TcpListener,
}

impl SignalServer {
    pub async fn bind(addr: String) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            tcp_listener: TcpListener::bind(addr).await?,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.tcp_listener.local_addr()
    }

    pub async fn listen(self, policy: RelayPolicy) -> Result<(), Box<dyn Error + Send + Sync>> {
        let registry = Arc::new(RoomRegistry::new());
        let peer_hub = Arc::new(PeerHub::new());
        let relay = Arc::new(SignalRelay::new(policy));
        let next_conn_id = AtomicU64::new(0);

        loop {
            let (tcp_socket, peer_addr) = self.tcp_listener.accept().await?;
            let conn_id = next_conn_id.fetch_add(1, Ordering::Relaxed);

            let registry = registry.clone();
            let peer_hub = peer_hub.clone();
            let relay = relay.clone();

            tokio::spawn(async move {
                info!("Connection {} opened from {}", conn_id, peer_addr);

                let mut current_binding = None;

                if let Err(e) = TcpHandler::handle_stream(
                    tcp_socket,
                    conn_id,
                    &mut current_binding,
                    registry.clone(),
                    peer_hub.clone(),
                    relay,
                )
                .await
                {
                    error!("Error handling connection {}: {}", conn_id, e);
                }

                // an abrupt disconnect cleans up exactly like an explicit leave
                if let Some(binding) = current_binding.take() {
                    CommandHandler::handle_user_leave(&binding, conn_id, &registry, &peer_hub)
                        .await;
                }

                peer_hub.unregister(conn_id).await;

                info!("Connection {} closed", conn_id);
            });
        }
    }
}
