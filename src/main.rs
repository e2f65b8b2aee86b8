use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use leo_sync::config::Settings;
use leo_sync::manual::ManualQueueManager;
use leo_sync::orchestrator::{UploadOrchestrator, UploadOutcome};
use leo_sync::state::{Credentials, StateStore, SyncState};
use leo_sync::{HttpFormSession, TimedTextClient, YouTubeClient};

#[derive(Parser)]
#[command(name = "leo-sync")]
#[command(about = "Upload new YouTube videos with English captions to LinguaLeo")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// State file holding credentials, channels and the queue
    #[arg(long, default_value = "data.json")]
    state: PathBuf,

    /// Settings file (TOML)
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload new videos from all channels, then retry queued videos
    Sync,
    /// Queue videos by URL for the next sync
    AddVideos {
        /// Video URLs (youtube.com/watch?v=... or youtu.be/...)
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Start monitoring channels from now on
    AddChannels {
        /// Channel URLs (youtube.com/channel/... or youtube.com/user/...)
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Drop every queued video
    ClearQueue,
    /// Create a new state file
    Init {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// YouTube Data API key
        #[arg(long)]
        api_key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.settings.as_deref())?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    settings.validate()?;

    let store = StateStore::new(&cli.state);

    match cli.command {
        Commands::Sync => run_sync(&store, settings).await?,
        Commands::AddVideos { urls } => {
            let mut state = store.load()?;
            let youtube = YouTubeClient::new(&settings, state.credentials.require("api_key")?)?;
            let added = ManualQueueManager::new(&youtube)
                .enqueue_videos(&urls, &mut state)
                .await?;
            store.save(&state)?;
            info!("➕ Added {} video(s) to the queue", added);
        }
        Commands::AddChannels { urls } => {
            let mut state = store.load()?;
            let youtube = YouTubeClient::new(&settings, state.credentials.require("api_key")?)?;
            let result = ManualQueueManager::new(&youtube)
                .register_channels(&urls, &mut state, Utc::now())
                .await;
            // channels registered before a network failure are kept
            store.save(&state)?;
            let added = result?;
            info!("📺 Added {} channel(s)", added);
        }
        Commands::ClearQueue => {
            store.clear_queue()?;
        }
        Commands::Init {
            email,
            password,
            api_key,
        } => {
            let mut credentials = Credentials::new();
            credentials.insert("email", email);
            credentials.insert("password", password);
            credentials.insert("api_key", api_key);
            store.init(credentials)?;
        }
    }

    Ok(())
}

async fn run_sync(store: &StateStore, settings: Settings) -> Result<()> {
    let mut state = store.load()?;
    info!("🚀 leo-sync starting...");
    info!("{}", settings.summary());

    let youtube = YouTubeClient::new(&settings, state.credentials.require("api_key")?)?;
    let captions = TimedTextClient::new(&settings)?;
    let session = HttpFormSession::new(&settings)?;

    let mut orchestrator = UploadOrchestrator::new(
        Box::new(youtube),
        Box::new(captions),
        Box::new(session),
        settings,
    );

    let start_time = std::time::Instant::now();
    let result = match orchestrator.run_and_persist(store, &mut state).await {
        Err(e) if !e.needs_flush() => {
            error!("❌ {}", e);
            return Err(e.into());
        }
        other => other,
    };

    let report = orchestrator.report();
    info!("🎉 Run completed in {:.2}s", start_time.elapsed().as_secs_f64());
    info!("✅ Published: {}", report.published);
    info!("⚠️ Needs publish: {}", report.needs_publish);
    info!("❌ Failed: {}", report.failed);
    for result in &report.results {
        if let UploadOutcome::NeedsPublish { url } = &result.outcome {
            warn!("Publish manually: {} ({})", url, result.title);
        }
    }
    print_queue(&state);

    Ok(result?)
}

fn print_queue(state: &SyncState) {
    if state.queue.is_empty() {
        return;
    }
    info!("📋 Videos left in the queue:");
    for video in &state.queue {
        info!("  {} - {} ({})", video.channel_name, video.title, video.id);
    }
}
