use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use server::config::ServerConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG_FILE: &str = "storyloom.toml";

#[derive(Parser)]
#[command(name = "storyloom")]
#[command(about = "Local multi-model story generation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the config file.
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and create the data directories.
    Init,
    /// Start the host server and its workers.
    Serve {
        #[arg(short, long, default_value = CONFIG_FILE)]
        config: PathBuf,

        /// Override the configured listen port.
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Query a running host for its worker states.
    Status {
        #[arg(long)]
        url: Option<String>,
    },
    /// Submit a story run to a running host and print the result.
    Story {
        /// Authoring guidance for the story.
        #[arg(short, long)]
        narrative: Option<String>,
        /// Seed image as a URL or data-URL.
        #[arg(short, long)]
        image: Option<String>,
        /// Number of illustrations to generate.
        #[arg(long)]
        illustrations: Option<u32>,
        /// Style hint appended to every image prompt.
        #[arg(long)]
        hint: Option<String>,
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init) => init(&cli.config).await,
        Some(Commands::Serve { config, port }) => serve(&config, port).await,
        Some(Commands::Status { url }) => status(&cli.config, url).await,
        Some(Commands::Story {
            narrative,
            image,
            illustrations,
            hint,
            url,
        }) => story(&cli.config, narrative, image, illustrations, hint, url).await,
        None => serve(&cli.config, None).await,
    }
}

async fn init(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        return Ok(());
    }

    let config = ServerConfig::default();
    let content = toml::to_string_pretty(&config)?;
    tokio::fs::write(config_path, content).await?;

    tokio::fs::create_dir_all(&config.paths.datasets_dir).await?;
    tokio::fs::create_dir_all(&config.paths.adapters_dir).await?;
    tokio::fs::create_dir_all(&config.paths.index_root).await?;

    println!("Initialized Storyloom");
    println!();
    println!("Created:");
    println!("  {}", config_path.display());
    println!("  {}/", config.paths.datasets_dir.display());
    println!("  {}/", config.paths.adapters_dir.display());
    println!("  {}/", config.paths.index_root.display());
    println!();
    println!("Next steps:");
    println!("  1. Drop training data into {}/", config.paths.datasets_dir.display());
    println!("  2. Run 'storyloom serve' to start the host and workers");

    Ok(())
}

async fn serve(config_path: &Path, port: Option<u16>) -> Result<()> {
    init_tracing();

    let mut config = ServerConfig::read(config_path);
    if let Some(port) = port {
        config.server.port = port;
    }

    println!();
    println!("Storyloom");
    println!(
        "  API:  http://{}:{}",
        config.server.host, config.server.port
    );
    println!();
    println!("Press Ctrl+C to stop");

    server::run(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
    .context("Server exited with an error")
}

fn resolve_base_url(config_path: &Path, url: Option<String>) -> String {
    url.unwrap_or_else(|| {
        let config = ServerConfig::read(config_path);
        format!("http://{}:{}", config.server.host, config.server.port)
    })
}

async fn status(config_path: &Path, url: Option<String>) -> Result<()> {
    let base_url = resolve_base_url(config_path, url);

    let client = reqwest::Client::new();
    let health = client.get(format!("{base_url}/health")).send().await;
    match health {
        Ok(response) if response.status().is_success() => {
            println!("Host at {} is up", base_url);
        }
        _ => {
            println!("No host reachable at {}", base_url);
            println!("Run 'storyloom serve' to start one.");
            return Ok(());
        }
    }

    let body: serde_json::Value = client
        .get(format!("{base_url}/workers"))
        .send()
        .await?
        .json()
        .await?;

    let workers = body["workers"].as_array().cloned().unwrap_or_default();
    if workers.is_empty() {
        println!("No workers registered.");
        return Ok(());
    }

    println!();
    println!("Workers ({}):", workers.len());
    for worker in &workers {
        let id = worker["id"].as_str().unwrap_or("?");
        let port = worker["port"].as_u64().unwrap_or(0);
        let state = worker["state"].as_str().unwrap_or("?");
        println!("  {:12} :{:<5}  {}", state, port, id);
    }

    Ok(())
}

async fn story(
    config_path: &Path,
    narrative: Option<String>,
    image: Option<String>,
    illustrations: Option<u32>,
    hint: Option<String>,
    url: Option<String>,
) -> Result<()> {
    let base_url = resolve_base_url(config_path, url);

    let mut payload = serde_json::Map::new();
    if let Some(narrative) = narrative {
        payload.insert("narrative".into(), narrative.into());
    }
    if let Some(image) = image {
        payload.insert("image".into(), image.into());
    }
    if let Some(n) = illustrations {
        payload.insert("num_illustrations".into(), n.into());
    }
    if let Some(hint) = hint {
        payload.insert("illustration_hint".into(), hint.into());
    }

    println!("Submitting run to {} ...", base_url);
    let result = submit_story(&base_url, serde_json::Value::Object(payload)).await?;

    if let Some(summary) = result["scene_summary"].as_str().filter(|s| !s.is_empty()) {
        println!();
        println!("Scene: {}", summary);
    }
    println!();
    println!(
        "{}",
        result["story_text"].as_str().unwrap_or("(no story text)")
    );
    let illustrations = result["illustrations"].as_array().cloned().unwrap_or_default();
    if !illustrations.is_empty() {
        println!();
        println!("Illustrations: {}", illustrations.len());
    }
    if result["audio"].as_str().is_some_and(|a| !a.is_empty()) {
        println!("Narration: attached (data-URL)");
    }

    Ok(())
}

async fn submit_story(base_url: &str, payload: serde_json::Value) -> Result<serde_json::Value> {
    let response = reqwest::Client::new()
        .post(format!("{base_url}/story"))
        .json(&payload)
        .send()
        .await
        .with_context(|| format!("Could not reach the host at {base_url}"))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Host rejected the run ({status}): {body}");
    }

    response.json().await.context("Malformed host response")
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storyloom=info,server=info,tower_http=info".into()),
        )
        .init();
}
