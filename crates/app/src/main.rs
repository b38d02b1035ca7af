use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use tunebridge_core::{
    playable_url, AppConfig, CatalogEntry, HttpResolver, MediaAdapter, MemoryStore, PlayMode,
    PlayerStore, SimulatedMedia, Song, SongResolver, SpectrumGraphFactory, StaticResolver,
};

/// Playhead step used by the simulation, in seconds.
const TICK_SECONDS: f64 = 0.25;

#[tokio::main(flavor = "current_thread")]
async fn main() -> tunebridge_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Simulate {
            catalog,
            mode,
            steps,
            track_seconds,
        } => run_simulate(&config, &catalog, mode.into(), steps, track_seconds).await,
        Commands::Resolve { song_id, endpoint } => {
            let mut resolver_config = config.resolver.clone();
            if let Some(endpoint) = endpoint {
                resolver_config.endpoint = endpoint;
            }
            let resolver = HttpResolver::new(&resolver_config)?;
            run_resolve(&resolver, &song_id).await
        }
    }
}

async fn run_simulate(
    config: &AppConfig,
    catalog: &Path,
    mode: PlayMode,
    steps: usize,
    track_seconds: f64,
) -> tunebridge_core::Result<()> {
    let raw = std::fs::read_to_string(catalog)?;
    let entries: Vec<CatalogEntry> = serde_json::from_str(&raw)?;
    tracing::info!(?catalog, tracks = entries.len(), ?mode, "starting simulated session");

    let mut store = MemoryStore::new();
    store.set_playlist(entries.iter().map(Song::from).collect());
    store.set_play_mode(mode);

    let mut adapter = MediaAdapter::mount(
        SimulatedMedia::new(config.analysis.sample_rate),
        store,
        StaticResolver::from_entries(&entries),
        SpectrumGraphFactory,
        config,
    )?;

    let Some(first) = entries.first() else {
        tracing::warn!("catalogue is empty, nothing to play");
        return Ok(());
    };
    adapter.store_mut().play_song(&first.id);
    adapter.pump()?;

    for step in 0..steps {
        adapter.resolve_pending().await?;

        if adapter.media().is_loading() {
            adapter.media_mut().finish_loading(track_seconds);
        }
        adapter.media_mut().advance(TICK_SECONDS);
        adapter.pump()?;

        if !adapter.store().is_playing() && adapter.pending_resolutions().next().is_none() {
            tracing::info!(step, "playback stopped");
            break;
        }

        let peak = if adapter.refresh_spectrum() {
            adapter.frequency_buffer().and_then(|buffer| buffer.peak())
        } else {
            None
        };
        let store = adapter.store();
        tracing::info!(
            step,
            song_id = store.current_song_id(),
            current_time = store.current_time(),
            total_time = store.total_time(),
            peak_bin = peak.map(|(bin, _)| bin),
            peak_value = peak.map(|(_, value)| value),
            "tick"
        );
    }

    let (_media, store, _resolver) = adapter.unmount();
    tracing::info!(
        lyrics_requests = store.lyrics_requests().len(),
        skips = store.navigations().len(),
        "session finished"
    );
    Ok(())
}

async fn run_resolve(resolver: &HttpResolver, song_id: &str) -> tunebridge_core::Result<()> {
    tracing::info!(song_id, endpoint = resolver.endpoint(), "resolving song url");
    let entries = resolver.resolve(song_id).await?;
    match playable_url(&entries) {
        Some(url) => println!("{url}"),
        None => tracing::warn!(song_id, "song has no playable url"),
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless driver for the TuneBridge playback controller", long_about = None)]
struct Cli {
    /// Optional JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a catalogue through the simulated media element.
    Simulate {
        /// JSON array of `{"id", "name", "artist", "url"}` entries.
        catalog: PathBuf,
        #[arg(short, long, value_enum, default_value_t = Mode::Order)]
        mode: Mode,
        /// Number of playhead ticks to run.
        #[arg(short, long, default_value_t = 40)]
        steps: usize,
        /// Length reported for every simulated track.
        #[arg(long, default_value_t = 3.0)]
        track_seconds: f64,
    },
    /// Resolve one song id to a playable URL over HTTP.
    Resolve {
        song_id: String,
        /// Overrides the endpoint from the configuration file.
        #[arg(short, long)]
        endpoint: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    Order,
    Loop,
    Single,
    Shuffle,
}

impl From<Mode> for PlayMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Order => PlayMode::Order,
            Mode::Loop => PlayMode::ListLoop,
            Mode::Single => PlayMode::Single,
            Mode::Shuffle => PlayMode::Shuffle,
        }
    }
}
