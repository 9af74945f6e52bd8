use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use bytes::Bytes;
use lookout_client::{
    ClientConfig, ClientError, ConnectionState, LocalStreamHandle, PeerClient, PeerId, RemoteStream,
    SessionObserver, TrackKind,
};
use lookout_relay::{RelayConfig, RelayService};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lookout")]
#[command(about = "Peer-to-peer live streaming over a signaling relay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay.
    Relay {
        #[arg(long)]
        addr: Option<SocketAddr>,
    },
    /// Stream to every viewer in the room. The audio track carries Opus
    /// silence as a test signal; the video track is advertised but idle.
    Stream {
        #[arg(long, default_value = "ws://127.0.0.1:8080/ws")]
        url: String,

        #[arg(long)]
        room: String,
    },
    /// Join a room and receive the streamer's media.
    View {
        #[arg(long, default_value = "ws://127.0.0.1:8080/ws")]
        url: String,

        #[arg(long)]
        room: String,
    },
}

struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn on_local_stream(&self, stream: &LocalStreamHandle) {
        println!(
            "{} {} local track(s)",
            "● live".green().bold(),
            stream.tracks().len()
        );
    }

    fn on_remote_stream(&self, stream: &RemoteStream, peer_id: &PeerId) {
        println!(
            "{} from {} ({} track(s))",
            "▶ stream".cyan().bold(),
            peer_id,
            stream.tracks().len()
        );
    }

    fn on_state_change(&self, state: ConnectionState) {
        println!("{} {:?}", "state".cyan(), state);
    }

    fn on_error(&self, error: &ClientError) {
        eprintln!("{} {}", "error".red().bold(), error);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match Cli::parse().command {
        Commands::Relay { addr } => {
            let addr = addr.unwrap_or(RelayConfig::default().addr);
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            println!("{} ws://{}/ws", "Relay listening on".green().bold(), addr);
            lookout_relay::serve(listener, RelayService::new()).await?;
        }
        Commands::Stream { url, room } => {
            let client = open_client(&url).await?;
            let handle = client.start_streaming(&room).await?;
            println!(
                "{} {} ({} track(s))",
                "Streaming to room".green().bold(),
                room,
                handle.tracks().len()
            );
            let feeder = feed_silence(&handle);
            wait_and_disconnect(&client).await?;
            if let Some(feeder) = feeder {
                feeder.abort();
            }
        }
        Commands::View { url, room } => {
            let client = open_client(&url).await?;
            client.join_as_viewer(&room).await?;
            println!("{} {}", "Watching room".green().bold(), room);
            wait_and_disconnect(&client).await?;
        }
    }

    Ok(())
}

async fn open_client(url: &str) -> Result<PeerClient> {
    let client = PeerClient::new(ClientConfig::new(url), Arc::new(ConsoleObserver))?;
    client
        .connect()
        .await
        .with_context(|| format!("Failed to reach relay at {}", url))?;
    Ok(client)
}

async fn wait_and_disconnect(client: &PeerClient) -> Result<()> {
    tokio::signal::ctrl_c().await?;
    println!("{}", "Leaving...".cyan());
    client.disconnect().await;
    Ok(())
}

/// One 20ms Opus frame of silence.
const OPUS_SILENCE: [u8; 3] = [0xf8, 0xff, 0xfe];
const FRAME: Duration = Duration::from_millis(20);

fn feed_silence(handle: &LocalStreamHandle) -> Option<JoinHandle<()>> {
    let audio = handle.track(TrackKind::Audio)?.clone();
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(FRAME);
        loop {
            ticker.tick().await;
            if let Err(e) = audio
                .write_sample(Bytes::from_static(&OPUS_SILENCE), FRAME)
                .await
            {
                tracing::debug!("Audio feed stopped: {}", e);
                break;
            }
        }
    }))
}
