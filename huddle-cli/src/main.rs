use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use huddle_client::{Client, ClientConfig, ClientEvent, ClientHandle, MediaConstraints};
use huddle_core::{IceServerConfig, PeerId};
use huddle_server::RelayConfig;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "huddle")]
#[command(about = "Peer-to-peer calls over a tiny signaling relay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay.
    Relay {
        #[arg(long, env = "HUDDLE_RELAY_BIND")]
        bind: Option<SocketAddr>,

        #[arg(long, env = "HUDDLE_RELAY_MAX_MESSAGE_SIZE")]
        max_message_size: Option<usize>,
    },

    /// Join a relay room as a peer and chat from stdin.
    ///
    /// HUDDLE_SIGNALING_URL, HUDDLE_PEER_ID, HUDDLE_ICE_SERVERS, HUDDLE_AUDIO
    /// and HUDDLE_VIDEO are read first; flags override them.
    Peer {
        /// Relay room URL, e.g. ws://localhost:8080/ws/lobby
        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        peer_id: Option<String>,

        /// Start a call right away.
        #[arg(long)]
        call: bool,

        /// Peer to call; without it the call goes to the whole room.
        #[arg(long, requires = "call")]
        to: Option<String>,

        #[arg(long)]
        no_audio: bool,

        #[arg(long)]
        no_video: bool,

        /// STUN server URL; repeat for more. Defaults to a public STUN server.
        #[arg(long = "ice-server")]
        ice_servers: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Commands::Relay {
            bind,
            max_message_size,
        } => {
            let mut config = RelayConfig::from_env();
            if let Some(bind) = bind {
                config.bind = bind;
            }
            if let Some(size) = max_message_size {
                config.max_message_size = size;
            }
            println!("{} {}", "Relay listening on".green().bold(), config.bind);
            huddle_server::serve(config).await
        }

        Commands::Peer {
            url,
            peer_id,
            call,
            to,
            no_audio,
            no_video,
            ice_servers,
        } => {
            let mut config = match url {
                Some(url) => ClientConfig::new(url).apply_env()?,
                None => ClientConfig::from_env()?,
            };
            let media = MediaConstraints {
                audio: config.media.audio && !no_audio,
                video: config.media.video && !no_video,
            };
            config = config.with_media(media);
            if let Some(id) = peer_id {
                config = config.with_peer_id(PeerId::from(id));
            }
            if !ice_servers.is_empty() {
                config.transport.ice_servers =
                    ice_servers.into_iter().map(IceServerConfig::stun).collect();
            }
            config.validate()?;

            run_peer(config, call.then(|| to.map(PeerId::from))).await
        }
    }
}

async fn run_peer(config: ClientConfig, call: Option<Option<PeerId>>) -> Result<()> {
    let (client, handle, mut events) = Client::connect(&config)
        .await
        .context("Failed to connect to the signaling relay")?;
    let client_task = tokio::spawn(client.run());

    println!(
        "{} {} {}",
        "Joined".green().bold(),
        config.signaling_url,
        format!("as {}", config.peer_id).dimmed()
    );
    println!(
        "{}",
        "Commands: /call [peer], /hangup [peer], /who, /quit. Anything else is chat.".dimmed()
    );

    if let Some(to) = call {
        if let Err(e) = handle.call(to).await {
            println!("{} {}", "Call failed:".red(), e);
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if !run_command(&handle, line.trim()).await {
                            break;
                        }
                    }
                    None => break,
                }
            }

            event = events.recv() => {
                match event {
                    Some(event) => print_event(event),
                    None => break,
                }
            }
        }
    }

    handle.shutdown().await;
    drain(&mut events).await;
    client_task.await?;
    Ok(())
}

/// Returns `false` when the user asked to quit.
async fn run_command(handle: &ClientHandle, line: &str) -> bool {
    let (command, arg) = match line.split_once(' ') {
        Some((command, arg)) => (command, Some(PeerId::from(arg.trim()))),
        None => (line, None),
    };

    match command {
        "" => {}
        "/quit" => return false,
        "/call" => {
            if let Err(e) = handle.call(arg).await {
                println!("{} {}", "Call failed:".red(), e);
            }
        }
        "/hangup" => match handle.hangup(arg).await {
            Ok(closed) => println!("{}", format!("{closed} session(s) closed").dimmed()),
            Err(e) => println!("{} {}", "Hangup failed:".red(), e),
        },
        "/who" => match handle.sessions().await {
            Ok(sessions) if sessions.is_empty() => println!("{}", "No sessions".dimmed()),
            Ok(sessions) => {
                for s in sessions {
                    let who = s.remote.map_or("(open call)".to_owned(), |p| p.to_string());
                    println!("  {} {} / {}", who.bold(), s.state, s.connection);
                }
            }
            Err(e) => println!("{} {}", "Error:".red(), e),
        },
        _ => match handle.send_chat(None, line).await {
            Ok(0) => println!("{}", "Nobody is connected yet".yellow()),
            Ok(_) => {}
            Err(e) => println!("{} {}", "Chat failed:".red(), e),
        },
    }
    true
}

fn print_event(event: ClientEvent) {
    match event {
        ClientEvent::StateChanged {
            peer,
            state,
            connection,
        } => println!(
            "{} {} is {} ({})",
            "*".cyan(),
            label(peer.as_ref()),
            state,
            connection
        ),
        ClientEvent::ChatOpen { peer } => {
            println!("{} chat with {} is open", "*".cyan(), label(peer.as_ref()))
        }
        ClientEvent::Chat { from, text } => {
            println!("{}: {}", label(from.as_ref()).bold(), text)
        }
        ClientEvent::RemoteTrack { from, kind, id } => println!(
            "{} receiving {:?} track '{}' from {}",
            "*".cyan(),
            kind,
            id,
            label(from.as_ref())
        ),
        ClientEvent::Error(e) => println!("{} {}", "!".yellow(), e),
        ClientEvent::SignalingLost { reason } => {
            println!("{} {}", "Relay connection lost:".red().bold(), reason)
        }
    }
}

async fn drain(events: &mut mpsc::UnboundedReceiver<ClientEvent>) {
    while let Some(event) = events.recv().await {
        print_event(event);
    }
}

fn label(peer: Option<&PeerId>) -> String {
    peer.map_or_else(|| "(open call)".to_owned(), PeerId::to_string)
}
