pub mod config;

pub use config::PromptMetaConfig;

use std::io::Read as _;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::host::types::HostPaths;
use crate::metadata::{self, ExtractionOutput};
use crate::nodes::NodeRegistry;
use crate::storage::{ConfigStore, JsonConfigStore, ValueType, value_to_string};

#[derive(Parser)]
#[command(
    name = "promptmeta",
    version,
    about = "Extract prompts and generation parameters from generated images"
)]
pub struct Cli {
    /// Path to a .env file to load (default: auto-detect .env in cwd)
    #[arg(long, global = true)]
    dotenv: Option<PathBuf>,

    /// Path to a promptmeta.yaml (default: auto-detect in cwd)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base directory holding env_config.json and prompts/
    #[arg(long, global = true, env = "PROMPTMETA_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Directory relative image names are resolved against
    #[arg(long, global = true, env = "PROMPTMETA_INPUT_DIR")]
    input_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract prompts and parameters from an image file
    Extract {
        /// Path to the image
        image: PathBuf,

        /// Print all seven output slots as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse WebUI parameter text from a file ("-" for stdin)
    Parse {
        input: String,
    },

    /// Summarize parsed_params JSON or parameter text from a file ("-" for stdin)
    Summary {
        input: String,
    },

    /// List available nodes
    Nodes,

    /// Manage the configuration store
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// List every value with its declared type
    List,

    /// Print one value
    Get { key: String },

    /// Store a value
    Set {
        key: String,
        value: String,

        /// Value type (string, token, 3KeyGroup, integer, float, boolean)
        #[arg(long = "type", default_value = "string")]
        value_type: String,
    },

    /// Remove a value
    Delete { key: String },
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Load .env file
    load_dotenv(cli.dotenv.as_deref());

    let settings = PromptMetaConfig::load(cli.config.as_deref())?;
    let paths = settings.host_paths(cli.base_dir, cli.input_dir);

    match cli.command {
        Commands::Extract { image, json } => cmd_extract(&paths, image, json).await,
        Commands::Parse { input } => cmd_parse(&input),
        Commands::Summary { input } => cmd_summary(&input),
        Commands::Nodes => cmd_nodes(&paths),
        Commands::Config { action } => cmd_config(&paths, action).await,
    }
}

/// Load environment variables from a .env file.
/// If an explicit path is given, load from that path (warn if missing).
/// Otherwise, auto-detect .env in the current working directory (silently skip if absent).
fn load_dotenv(explicit_path: Option<&std::path::Path>) {
    match explicit_path {
        Some(path) => match dotenvy::from_path(path) {
            Ok(()) => info!("Loaded env from {}", path.display()),
            Err(e) => {
                eprintln!(
                    "Warning: Failed to load dotenv file '{}': {}",
                    path.display(),
                    e
                );
            }
        },
        None => match dotenvy::dotenv() {
            Ok(path) => info!("Loaded env from {}", path.display()),
            Err(dotenvy::Error::Io(_)) => {}
            Err(e) => {
                eprintln!("Warning: Failed to parse .env file: {}", e);
            }
        },
    }
}

/// Read a whole file, or stdin for `-`.
fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(input).with_context(|| format!("Failed to read input: {}", input))
}

async fn cmd_extract(paths: &HostPaths, image: PathBuf, json: bool) -> Result<()> {
    let path = if image.exists() || image.is_absolute() {
        image
    } else {
        paths.input_dir.join(image)
    };

    let task_path = path.clone();
    let output = tokio::task::spawn_blocking(move || metadata::extract_file(&task_path))
        .await?
        .with_context(|| format!("Failed to extract metadata: {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_extraction(&output);
    }
    Ok(())
}

fn print_extraction(output: &ExtractionOutput) {
    if let Some(image) = &output.image {
        println!(
            "Image: {} ({}, {}x{})",
            image.path, image.format, image.width, image.height
        );
    }
    println!("\nPositive prompt:\n{}", output.positive_prompt);
    println!("\nNegative prompt:\n{}", output.negative_prompt);
    if !output.parsed_params.is_empty() {
        println!("\nParameters:\n{}", output.parsed_params);
    }
    if !output.workflow.is_empty() {
        println!("\nWorkflow: {} bytes", output.workflow.len());
    }
}

fn cmd_parse(input: &str) -> Result<()> {
    let text = read_input(input)?;
    let output = metadata::assemble_text(&text);
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn cmd_summary(input: &str) -> Result<()> {
    let text = read_input(input)?;
    let summary = metadata::parse_summary(&text);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_nodes(paths: &HostPaths) -> Result<()> {
    let registry = NodeRegistry::with_builtins(paths);
    let nodes = registry.list();

    println!("{:<22} DESCRIPTION", "NODE TYPE");
    println!("{}", "-".repeat(60));

    for (name, desc) in &nodes {
        println!("{:<22} {}", name, desc);
    }

    println!("\nTotal: {} node(s)", nodes.len());
    Ok(())
}

async fn cmd_config(paths: &HostPaths, action: ConfigAction) -> Result<()> {
    let store = JsonConfigStore::new(&paths.base_dir);

    match action {
        ConfigAction::List => {
            let values = store.load().await?;
            let types = store.load_types().await?;
            if values.is_empty() {
                println!("No config values in {}", store.config_path().display());
                return Ok(());
            }

            println!("{:<24} {:<10} VALUE", "KEY", "TYPE");
            println!("{}", "-".repeat(60));
            for (key, value) in &values {
                let ty = types.get(key).copied().unwrap_or_default();
                println!("{:<24} {:<10} {}", key, ty, value_to_string(value));
            }
            println!("\nTotal: {} value(s)", values.len());
        }
        ConfigAction::Get { key } => {
            let values = store.load().await?;
            let value = values
                .get(&key)
                .ok_or_else(|| anyhow::anyhow!("Config key '{}' does not exist", key))?;
            println!("{}", value_to_string(value));
        }
        ConfigAction::Set {
            key,
            value,
            value_type,
        } => {
            let ty: ValueType = value_type.parse()?;
            let stored = store.set_value(&key, &value, ty).await?;
            println!("Set {} = {} ({})", key, value_to_string(&stored), ty);
        }
        ConfigAction::Delete { key } => {
            if !store.delete_value(&key).await? {
                anyhow::bail!("Config key '{}' does not exist", key);
            }
            println!("Deleted {}", key);
        }
    }
    Ok(())
}
