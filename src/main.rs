//! Binary entrypoint for the Lifesim CLI.
//!
//! Commands:
//! - `init` - write a starter `lifesim.toml`
//! - `status` - print record counts and the current story time
//! - `seed <file>` - create players, NPCs and inventories from a JSON seed
//! - `ingest <file>` - ingest a JSON array of event descriptors
//! - `history <playerId>` - print the player's most recent log entries
//! - `sync-npc <npcId>` / `sync-player <playerId>` - re-derive mood / money from the logs
//! - `precheck --player <id> --context <text> [--entry <file>]` - judge a proposed turn
//!
//! See the library crate docs for module‑level details: `lifesim::`.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use lifesim::config::Config;
use lifesim::story::{
    apply_seed, format_story_time, ingest_batch, load_seed_from_json, player_history, precheck,
    sync_npc_mood, sync_player_money, EventDescriptor, LatestEntry, PrecheckRequest, StoryStore,
    StoryStoreBuilder,
};

#[derive(Parser)]
#[command(name = "lifesim")]
#[command(about = "State store and narrative consistency engine for a text-driven life simulation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "lifesim.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Show record counts and the current story time
    Status,
    /// Load players, NPCs and inventories from a JSON seed file
    Seed {
        /// Path to the seed document
        file: String,
    },
    /// Ingest a JSON array of event descriptors
    Ingest {
        /// Path to the events file
        file: String,
    },
    /// Print a player's most recent event log entries
    History {
        player_id: String,
    },
    /// Set an NPC's mood from its latest event log entry
    SyncNpc {
        npc_id: String,
    },
    /// Apply the latest money change from a player's event log
    SyncPlayer {
        player_id: String,
    },
    /// Judge whether a proposed turn is consistent with the story so far
    Precheck {
        /// Player the turn belongs to
        #[arg(short, long)]
        player: String,
        /// Narrative context supplied with the turn
        #[arg(long)]
        context: Option<String>,
        /// JSON file holding the latest entry (`summary`, `feeling`, `data`)
        #[arg(short, long)]
        entry: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        init_logging(None, cli.verbose);
        Config::create_default(&cli.config).await?;
        info!("Configuration file created at {}", cli.config);
        return Ok(());
    }

    let config = Config::load(&cli.config).await?;
    init_logging(Some(&config), cli.verbose);
    let store = StoryStoreBuilder::new(&config.storage.data_dir)
        .open()
        .with_context(|| format!("opening store at {}", config.storage.data_dir))?;

    match cli.command {
        Commands::Init => {}
        Commands::Status => show_status(&store)?,
        Commands::Seed { file } => {
            let seed = load_seed_from_json(&file)?;
            let report = apply_seed(&store, seed)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Ingest { file } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file))?;
            let events: Vec<EventDescriptor> =
                serde_json::from_str(&raw).with_context(|| format!("parsing {}", file))?;
            let logs = ingest_batch(&store, &events)?;
            info!("Ingested {} of {} event(s)", logs.len(), events.len());
            println!("{}", serde_json::to_string_pretty(&logs)?);
        }
        Commands::History { player_id } => {
            let logs = player_history(&store, &player_id)?;
            println!("{}", serde_json::to_string_pretty(&logs)?);
        }
        Commands::SyncNpc { npc_id } => {
            let npc = sync_npc_mood(&store, &npc_id)?;
            println!("{}", serde_json::to_string_pretty(&npc)?);
        }
        Commands::SyncPlayer { player_id } => {
            let player = sync_player_money(&store, &player_id)?;
            println!("{}", serde_json::to_string_pretty(&player)?);
        }
        Commands::Precheck {
            player,
            context,
            entry,
        } => {
            let latest_entry = match entry {
                Some(path) => {
                    let raw = tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("reading {}", path))?;
                    Some(
                        serde_json::from_str::<LatestEntry>(&raw)
                            .with_context(|| format!("parsing {}", path))?,
                    )
                }
                None => None,
            };
            let request = PrecheckRequest {
                player_id: player,
                context,
                latest_entry,
            };
            let verdict = precheck(&store, &request, &config.precheck.policy());
            println!("{}", serde_json::to_string_pretty(&verdict)?);
        }
    }

    Ok(())
}

fn show_status(store: &StoryStore) -> Result<()> {
    let players = store.list_player_ids()?.len();
    let npcs = store.list_npc_ids()?.len();
    println!("Lifesim v{}", env!("CARGO_PKG_VERSION"));
    println!("Story time: {}", format_story_time(&chrono::Local::now()));
    println!("Players: {}", players);
    println!("NPCs: {}", npcs);
    println!("Player log entries: {}", store.count_player_logs());
    println!("NPC log entries: {}", store.count_npc_logs());
    Ok(())
}

fn init_logging(config: Option<&Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let level = match verbosity {
        0 => config
            .map(|c| c.logging.level_filter())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(level);

    let log_file = config
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });

    match log_file {
        Some(f) => {
            let file = std::sync::Arc::new(std::sync::Mutex::new(f));
            // Mirror to the console only when someone is watching
            let is_tty = atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = file.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
            });
        }
    }
    let _ = builder.try_init();
}
