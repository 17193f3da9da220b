use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use orgmap_engine::{
    ai::OpenAiClient,
    config::Settings,
    enrich::Enricher,
    search::{debounce::Debouncer, SearchStrategy},
    store::load_dataset,
    OrgMapEngine,
};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const ENHANCED_DATA: &str = "map-enhanced.json";
const CLEAN_DATA: &str = "map-clean.json";

#[derive(Parser)]
#[command(name = "orgmap", about = "Search the Israeli organizations directory")]
struct Cli {
    /// Data file (default: map-enhanced.json, else map-clean.json)
    #[arg(long, global = true, env = "ORGMAP_DATA_PATH")]
    data: Option<PathBuf>,

    /// JSON settings object (API_KEY, DEFAULT_SEARCH_LIMIT, DEBOUNCE_DELAY, ...)
    #[arg(long, global = true, env = "ORGMAP_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rank records for a free-text query
    Search {
        query: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value = "keyword")]
        strategy: SearchStrategy,
        /// Ask the AI backend to interpret the query first
        #[arg(long)]
        smart: bool,
    },
    /// Read queries from stdin, one per line, and search the last of each burst
    Interactive {
        #[arg(long, default_value = "keyword")]
        strategy: SearchStrategy,
        #[arg(long)]
        smart: bool,
    },
    /// Add AI descriptions, tags and embeddings to a data file
    Enrich {
        #[arg(long, default_value = CLEAN_DATA)]
        input: PathBuf,
        #[arg(long, default_value = ENHANCED_DATA)]
        output: PathBuf,
        /// Only process the first N records
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the effective settings
    Settings,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.settings.as_deref())?;

    match cli.command {
        Command::Search {
            query,
            limit,
            strategy,
            smart,
        } => {
            let query = query.join(" ");
            if query.trim().is_empty() {
                bail!("usage: orgmap search <query>");
            }
            let engine = open_engine(cli.data.as_deref(), settings)?;
            cmd_search(&engine, &query, limit, strategy, smart).await
        }
        Command::Interactive { strategy, smart } => {
            let engine = open_engine(cli.data.as_deref(), settings)?;
            cmd_interactive(&engine, strategy, smart).await
        }
        Command::Enrich {
            input,
            output,
            limit,
        } => cmd_enrich(&settings, &input, &output, limit).await,
        Command::Settings => {
            println!("{}", serde_json::to_string_pretty(&settings.redacted())?);
            Ok(())
        }
    }
}

fn resolve_data_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let enhanced = PathBuf::from(ENHANCED_DATA);
    if enhanced.exists() {
        enhanced
    } else {
        PathBuf::from(CLEAN_DATA)
    }
}

fn open_engine(data: Option<&Path>, settings: Settings) -> Result<OrgMapEngine> {
    OrgMapEngine::open(&resolve_data_path(data), settings)
}

async fn cmd_search(
    engine: &OrgMapEngine,
    query: &str,
    limit: Option<usize>,
    strategy: SearchStrategy,
    smart: bool,
) -> Result<()> {
    let response = if smart || strategy != SearchStrategy::Keyword {
        engine.smart_search(query, strategy, limit).await
    } else {
        engine.search(query, limit)
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn cmd_interactive(engine: &OrgMapEngine, strategy: SearchStrategy, smart: bool) -> Result<()> {
    let (mut debouncer, mut settled) = Debouncer::new(engine.settings().debounce_delay);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if input_open => {
                match line? {
                    Some(line) => debouncer.submit(line),
                    None => {
                        input_open = false;
                        debouncer.flush().await;
                    }
                }
            }
            Some(query) = settled.recv() => {
                cmd_search(engine, &query, None, strategy, smart).await?;
            }
            else => break,
        }
        if !input_open && settled.is_empty() {
            break;
        }
    }
    Ok(())
}

async fn cmd_enrich(settings: &Settings, input: &Path, output: &Path, limit: Option<usize>) -> Result<()> {
    let client = OpenAiClient::from_settings(settings)
        .context("enrichment needs OPENAI_API_KEY (or API_KEY in the settings file)")?;

    let dataset = load_dataset(input)?;

    let report = Enricher::new(&client, settings)
        .run(dataset, output, limit)
        .await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
