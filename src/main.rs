//! HumeGPT CLI - start a streaming chat session in the terminal

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use humegpt::{
    annotations::AnnotationTable,
    api::{ChatClient, StreamOutcome},
    config::Config,
    session::Session,
    tui::SessionView,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "humegpt")]
#[command(about = "An emotionally intelligent AI, streamed to your terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Config file (default: ~/.config/humegpt/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a session: stream the response and show the annotation table
    Session {
        /// User message to send instead of the configured prompt
        #[arg(short, long)]
        prompt: Option<String>,

        /// System prompt to send instead of the configured one
        #[arg(short, long)]
        system: Option<String>,

        /// Model to use
        #[arg(short, long)]
        model: Option<String>,

        /// Annotation map (JSON, optionally in <result> tags) to show instead of the placeholder
        #[arg(long)]
        annotations: Option<PathBuf>,

        /// Do not show the annotation table
        #[arg(long)]
        no_annotations: bool,
    },

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Initialize configuration file with defaults
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., openai.model, session.prompt)
        key: String,

        /// Value to set
        value: String,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // A missing .env file is fine
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) => debug!("No .env loaded: {}", e),
    }

    let config_path = cli.config.unwrap_or_else(Config::default_path);

    match cli.command {
        Commands::Session {
            prompt,
            system,
            model,
            annotations,
            no_annotations,
        } => {
            let mut config = Config::load_from(&config_path)?;
            if let Some(prompt) = prompt {
                config.session.prompt = prompt;
            }
            if let Some(system) = system {
                config.session.system_prompt = system;
            }
            if let Some(model) = model {
                config.openai.model = model;
            }
            if no_annotations {
                config.session.show_annotations = false;
            }

            let table = if !config.session.show_annotations {
                None
            } else if let Some(path) = annotations {
                Some(load_annotations(&path)?)
            } else {
                Some(AnnotationTable::placeholder())
            };

            return run_session(&config, table).await;
        }
        Commands::Config(cmd) => {
            run_config_command(cmd, &config_path)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_session(config: &Config, annotations: Option<AnnotationTable>) -> Result<ExitCode> {
    let view = SessionView::new().with_annotations(annotations);
    view.renderer().render_banner(env!("CARGO_PKG_VERSION"), &config.openai.model);

    let client = ChatClient::new(config.api_config());
    let mut session = Session::new(client);

    info!("Starting session with model {}", config.openai.model);
    let outcome = view.run(&mut session, config.session_request()).await;

    Ok(match outcome {
        StreamOutcome::Completed | StreamOutcome::Cancelled => ExitCode::SUCCESS,
        StreamOutcome::Failed(_) => ExitCode::FAILURE,
    })
}

fn load_annotations(path: &Path) -> Result<AnnotationTable> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read annotations from {}", path.display()))?;
    let table = AnnotationTable::from_json(&content)
        .with_context(|| format!("Failed to parse annotations in {}", path.display()))?;
    Ok(table)
}

fn run_config_command(cmd: ConfigCommands, path: &Path) -> Result<()> {
    match cmd {
        ConfigCommands::Init { force } => {
            config_init(path, force)?;
        }
        ConfigCommands::Show => {
            config_show(path)?;
        }
        ConfigCommands::Set { key, value } => {
            config_set(path, &key, &value)?;
        }
        ConfigCommands::Path => {
            println!("{}", path.display());
        }
        ConfigCommands::Validate => {
            config_validate(path)?;
        }
    }
    Ok(())
}

fn config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("Configuration file already exists at: {}", path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    let config = Config::default();
    config.save_to(path)?;

    println!("Configuration file created at: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file to add your API key, or");
    println!("  2. Set an environment variable (or put it in .env):");
    println!("     export OPENAI_API_KEY=your_openai_key");

    Ok(())
}

fn config_show(path: &Path) -> Result<()> {
    let config = Config::load_from(path)?;

    // Mask API keys in display
    println!("{}", toml::to_string_pretty(&config.masked())?);

    // Show environment variable status
    println!("--- Environment Variables ---");
    for var in ["OPENAI_API_KEY", "OPENAI_BASE_URL", "OPENAI_MODEL"] {
        let status = if std::env::var(var).is_ok() { "set" } else { "not set" };
        println!("{}: {}", var, status);
    }

    Ok(())
}

fn config_set(path: &Path, key: &str, value: &str) -> Result<()> {
    // Read the file itself so env overrides are not written back
    let mut config: Config = if path.exists() {
        toml::from_str(&std::fs::read_to_string(path)?)?
    } else {
        Config::default()
    };

    config.set_value(key, value)?;
    config.save_to(path)?;

    let shown = if key.ends_with("api_key") { "***" } else { value };
    println!("Set {} = {}", key, shown);
    Ok(())
}

fn config_validate(path: &Path) -> Result<()> {
    let config = Config::load_from(path)?;

    match config.validate() {
        Ok(()) => {
            println!("Configuration is valid");
            println!("  endpoint: {}", config.api_config().endpoint());
            println!("  model: {}", config.openai.model);
        }
        Err(e) => {
            println!("Configuration is invalid: {}", e);
            println!("Config file: {}", path.display());
        }
    }

    Ok(())
}
