//! jamlink command-line endpoint
//!
//! Runs one streaming session against the default audio devices, as either
//! a listening master or a connecting member. Stateless across runs.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jamlink::audio::CpalBridge;
use jamlink::constants::{DEFAULT_CHANNELS, DEFAULT_PORT, DEFAULT_SAMPLE_RATE};
use jamlink::session::Session;

#[derive(Parser, Debug)]
#[command(name = "jamlink")]
#[command(about = "Point-to-point multi-channel audio streaming over UDP", long_about = None)]
struct Args {
    /// Client name announced to the audio system
    #[arg(short, long, default_value = "jamlink")]
    name: String,

    #[command(subcommand)]
    role: RoleArgs,
}

#[derive(Subcommand, Debug)]
enum RoleArgs {
    /// Listen for a member and dictate the stream parameters
    Master {
        /// Address to bind
        #[arg(short, long, default_value_t = format!("0.0.0.0:{DEFAULT_PORT}"))]
        bind: String,

        /// Channel count to advertise
        #[arg(short, long, default_value_t = DEFAULT_CHANNELS)]
        channels: u16,

        /// Sample rate to advertise
        #[arg(short, long, default_value_t = DEFAULT_SAMPLE_RATE)]
        sample_rate: u32,
    },
    /// Connect to a master and adopt its stream parameters
    Member {
        /// Master address to connect to
        #[arg(short, long)]
        connect: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut session = match &args.role {
        RoleArgs::Master {
            bind,
            channels,
            sample_rate,
        } => Session::master(&args.name, bind, *channels, *sample_rate)?,
        RoleArgs::Member { connect } => Session::member(&args.name, connect)?,
    };

    let shutdown = session.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, shutting down");
            shutdown.signal();
        }
    });

    let bridge = CpalBridge::default();
    session.run(&bridge).await?;

    let stats = session.stats();
    tracing::info!(
        "Done: {} frames sent, {} received, {} dropped, {} rejected",
        stats.frames_sent,
        stats.frames_received,
        stats.frames_dropped,
        stats.frames_rejected
    );
    Ok(())
}
