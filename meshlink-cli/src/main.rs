use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use meshlink::model::IceServerConfig;
use meshlink::peer::{
    ConnectionState, Mesh, MeshConfig, MeshEvent, NegotiationState, SignalingClient,
    TransportConfig, WebRtcMediaFactory,
};
use meshlink::server::{RelayConfig, RelayState, serve};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meshlink")]
#[command(bin_name = "meshlink")]
#[command(about = "WebRTC mesh signaling relay and headless participant")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay.
    Serve {
        #[arg(long, env = "MESHLINK_HOST", default_value = "0.0.0.0")]
        host: String,

        #[arg(short, long, env = "MESHLINK_PORT", default_value_t = 3000)]
        port: u16,

        /// STUN/TURN urls announced to participants. Repeatable.
        #[arg(long = "ice-server", env = "MESHLINK_ICE_SERVERS", value_delimiter = ',')]
        ice_servers: Vec<String>,

        /// Let one connection be in several rooms at once.
        #[arg(long, env = "MESHLINK_MULTI_ROOM")]
        multi_room: bool,
    },

    /// Join a room as a headless participant and print what happens.
    Join {
        #[arg(long, env = "MESHLINK_URL", default_value = "ws://127.0.0.1:3000/ws")]
        url: String,

        #[arg(short, long)]
        room: String,

        #[arg(short, long, env = "MESHLINK_USER")]
        user: Option<String>,

        #[arg(long)]
        video: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("meshlink=info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Serve {
            host,
            port,
            ice_servers,
            multi_room,
        } => {
            let mut config = RelayConfig {
                host,
                port,
                single_room_per_session: !multi_room,
                ..Default::default()
            };
            if !ice_servers.is_empty() {
                config.ice_servers = ice_servers.into_iter().map(IceServerConfig::stun).collect();
            }
            run_relay(config).await
        }
        Commands::Join {
            url,
            room,
            user,
            video,
        } => run_participant(&url, room, user, video).await,
    }
}

async fn run_relay(config: RelayConfig) -> Result<()> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    println!("{} {}", "📡 Relay listening on".green().bold(), addr);

    serve(listener, RelayState::new(config), async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    println!("{}", "Relay stopped".yellow());
    Ok(())
}

enum Exit {
    Interrupted,
    TransportLost,
}

async fn run_participant(url: &str, room: String, user: Option<String>, video: bool) -> Result<()> {
    let (client, mut inbound) = SignalingClient::connect(url, user.clone())
        .await
        .with_context(|| format!("Failed to connect to {}", url))?;
    let client = Arc::new(client);

    println!(
        "{} {} {}",
        "🔗 Connected as".green().bold(),
        client.session_id(),
        format!("({} ICE servers)", client.ice_servers().len()).dimmed()
    );

    let transport = TransportConfig {
        video,
        ..Default::default()
    }
    .with_ice_servers(client.ice_servers().to_vec());

    let mut config = MeshConfig::new(room.clone());
    config.user_id = user;

    let (mesh, mut events) = Mesh::spawn(
        client.session_id(),
        config,
        Arc::new(WebRtcMediaFactory::new(transport)),
        client.clone(),
    );
    println!("{} '{}'", "🚪 Joining room".cyan(), room);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let exit = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Exit::Interrupted,
            msg = inbound.recv() => match msg {
                Some(msg) => {
                    mesh.deliver(msg);
                }
                None => break Exit::TransportLost,
            },
            Some(event) = events.recv() => print_event(&event),
        }
    };

    match exit {
        Exit::Interrupted => {
            println!("{}", "Leaving room...".yellow());
            mesh.shutdown().await;
        }
        Exit::TransportLost => {
            println!("{}", "⚠️  Relay connection lost".red().bold());
            mesh.transport_lost().await;
        }
    }

    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }
    client.close();
    Ok(())
}

fn print_event(event: &MeshEvent) {
    match event {
        MeshEvent::MemberJoined(p) => {
            let user = p.user_id.as_deref().unwrap_or("anonymous");
            println!("{} {} ({})", "+".green().bold(), p.session_id, user);
        }
        MeshEvent::MemberLeft(p) => {
            println!("{} {}", "-".red().bold(), p.session_id);
        }
        MeshEvent::Negotiation { peer, state } => {
            let label = format!("{:?}", state);
            let label = match state {
                NegotiationState::Stable => label.green(),
                NegotiationState::Closed => label.dimmed(),
                _ => label.yellow(),
            };
            println!("  {} negotiation {}", peer, label);
        }
        MeshEvent::Connection { peer, state } => {
            let label = format!("{:?}", state);
            let label = match state {
                ConnectionState::Connected => label.green().bold(),
                ConnectionState::Failed | ConnectionState::Disconnected => label.red(),
                _ => label.normal(),
            };
            println!("  {} connection {}", peer, label);
        }
        MeshEvent::LinkFailed {
            peer,
            attempt,
            reason,
        } => {
            println!(
                "{} link to {} failed (attempt {}): {}",
                "!".red().bold(),
                peer,
                attempt,
                reason
            );
        }
        MeshEvent::PeerUnreachable { peer, attempts } => {
            println!(
                "{} {} unreachable after {} attempts",
                "✗".red().bold(),
                peer,
                attempts
            );
        }
    }
}
