mod command_handler;
mod peer_hub;
mod relay;
mod room;
mod room_registry;
mod session;
mod signal_server;
mod tcp_handler;

use log::{error, info};
use shared::SIGNAL_PORT;

use clap::Parser;

use crate::{relay::RelayPolicy, signal_server::SignalServer};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    addr: String,

    /// Keep ICE candidates server-side instead of forwarding them to the room
    #[arg(long)]
    disable_candidate_relay: bool,

    /// Forward application messages to the rest of the room
    #[arg(long)]
    relay_messages: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let addr = format!("{}:{}", args.addr, SIGNAL_PORT);

    let policy = RelayPolicy {
        relay_candidates: !args.disable_candidate_relay,
        relay_messages: args.relay_messages,
    };

    let server = match SignalServer::bind(addr.clone()).await {
        Ok(signal_server) => signal_server,
        Err(e) => {
            error!("Error binding: {}", e);
            return;
        }
    };

    info!("Signaling relay listening on {}", addr);

    match server.listen(policy).await {
        Ok(_) => (),
        Err(e) => {
            error!("{}", e);
        }
    };
}
