// MindCare - Student wellbeing risk screening and crisis escalation
// Main entry point

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use mindcare::config::{default_config_path, load_config, write_default_config, Config};
use mindcare::crisis::RiskClassifier;
use mindcare::errors;
use mindcare::identity::StudentIdentity;
use mindcare::metrics::Telemetry;
use mindcare::notify::{AlertBroadcaster, HttpMailRelay, MailTransport};
use mindcare::pipeline::{Escalation, MessagePipeline, PipelineDeps};
use mindcare::providers::create_generator;
use mindcare::recommendations::seed_catalog;
use mindcare::server::{serve, AppState};
use mindcare::store::{DocumentStore, JsonlStore, MemoryStore};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "mindcare")]
#[command(about = "Student wellbeing risk screening and crisis escalation", version)]
struct Args {
    /// Config file (default: ~/.mindcare/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Parser, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Bind address (default: server.bind_address from config)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Classify a message and print the risk result
    Classify {
        /// Message text
        text: String,
    },
    /// Run one full chat turn
    Chat {
        /// Student account id
        #[arg(long)]
        user: String,
        /// Student display alias
        #[arg(long)]
        alias: String,
        /// Guardian contact for crisis emails
        #[arg(long)]
        guardian_email: Option<String>,
        /// Message text
        text: String,
    },
    /// Insert the starter resource catalog and a default responder
    Seed,
    /// Write a default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    if let Command::InitConfig { force } = &args.command {
        return run_init_config(args.config.clone(), *force);
    }

    let config = load_config(args.config.as_deref())
        .map_err(|e| anyhow::anyhow!(errors::config_parse_error(&e)))?;

    match args.command {
        Command::Serve { bind } => run_serve(config, bind).await,
        Command::Classify { text } => run_classify(&config, &text),
        Command::Chat {
            user,
            alias,
            guardian_email,
            text,
        } => {
            let mut student = StudentIdentity::student(user, alias);
            if let Some(email) = guardian_email {
                student = student.with_guardian_email(email);
            }
            run_chat(config, student, &text).await
        }
        Command::Seed => run_seed(&config).await,
        Command::InitConfig { .. } => Ok(()),
    }
}

/// Initialize tracing
///
/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing() {
    let show_debug = std::env::var("MINDCARE_DEBUG")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false);

    // Default: INFO level, can be overridden with RUST_LOG env var
    let env_filter = if show_debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init(); // also bridges log records from dependencies
}

/// Everything a command needs to run the pipeline
struct Runtime {
    store: Arc<dyn DocumentStore>,
    broadcaster: Arc<AlertBroadcaster>,
    telemetry: Arc<Telemetry>,
    pipeline: Arc<MessagePipeline>,
    persistent: bool,
}

async fn open_store(config: &Config) -> Result<(Arc<dyn DocumentStore>, bool)> {
    match &config.storage.data_dir {
        Some(dir) => {
            let store = JsonlStore::open(dir).await.map_err(|e| {
                anyhow::anyhow!(errors::storage_open_error(&dir.display().to_string(), e))
            })?;
            tracing::info!(dir = %dir.display(), "Using JSONL document store");
            let store: Arc<dyn DocumentStore> = Arc::new(store);
            Ok((store, true))
        }
        None => {
            tracing::info!("Using in-memory document store");
            let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
            Ok((store, false))
        }
    }
}

fn create_mailer(config: &Config) -> Result<Option<Arc<dyn MailTransport>>> {
    let settings = &config.notifications;
    let Some(url) = &settings.mail_relay_url else {
        tracing::warn!("No mail relay configured, email channels will be skipped");
        return Ok(None);
    };

    let mut relay = HttpMailRelay::new(url.clone(), settings.sender_address.clone())?;
    if let Some(token) = &settings.mail_relay_token {
        relay = relay.with_token(token.clone());
    }
    let mailer: Arc<dyn MailTransport> = Arc::new(relay);
    Ok(Some(mailer))
}

async fn build_runtime(config: &Config) -> Result<Runtime> {
    let (store, persistent) = open_store(config).await?;
    let telemetry = Arc::new(Telemetry::new().context("Failed to register metrics")?);
    let broadcaster = Arc::new(AlertBroadcaster::new(
        config.notifications.alert_channel_capacity,
    ));

    let generator = create_generator(&config.generative)?;
    if generator.is_none() && config.generative.api_key.is_some() {
        eprintln!("{}", errors::api_key_invalid_error("Gemini"));
    }

    let deps = PipelineDeps {
        store: store.clone(),
        generator,
        publisher: broadcaster.clone(),
        mailer: create_mailer(config)?,
        telemetry: telemetry.clone(),
    };
    let pipeline = MessagePipeline::new(config, deps).context("Failed to build message pipeline")?;

    Ok(Runtime {
        store,
        broadcaster,
        telemetry,
        pipeline: Arc::new(pipeline),
        persistent,
    })
}

async fn run_serve(config: Config, bind: Option<String>) -> Result<()> {
    let runtime = build_runtime(&config).await?;
    if !runtime.persistent {
        seed_catalog(runtime.store.as_ref()).await?;
    }

    let bind = bind.unwrap_or_else(|| config.server.bind_address.clone());
    let state = AppState::new(runtime.pipeline, runtime.broadcaster, runtime.telemetry);
    serve(state, &bind).await
}

fn run_classify(config: &Config, text: &str) -> Result<()> {
    let classifier = match &config.signal_lists_path {
        Some(path) => RiskClassifier::load_from_file(path)?,
        None => RiskClassifier::default(),
    };
    let result = classifier.classify(text);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn run_chat(config: Config, student: StudentIdentity, text: &str) -> Result<()> {
    let runtime = build_runtime(&config).await?;
    if !runtime.persistent {
        seed_catalog(runtime.store.as_ref()).await?;
    }

    let outcome = runtime
        .pipeline
        .handle_incoming_message(&student, text)
        .await
        .map_err(|e| anyhow::anyhow!(errors::wrap_error_with_suggestion(e, "Pass a non-empty message")))?;

    println!("{}", serde_json::to_string_pretty(&outcome.payload)?);

    match outcome.escalation {
        Some(Escalation::Dispatched(pending)) => {
            let report = pending.report().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Some(Escalation::NotPersisted { error }) => {
            eprintln!("Crisis alert was not persisted: {}", error);
        }
        None => {}
    }
    Ok(())
}

async fn run_seed(config: &Config) -> Result<()> {
    let (store, persistent) = open_store(config).await?;
    if !persistent {
        eprintln!(
            "{}",
            errors::wrap_error_with_suggestion(
                "No data directory configured; seeded data will not outlive this process",
                "Set storage.data_dir in the config file"
            )
        );
    }
    let added = seed_catalog(store.as_ref()).await?;
    println!("Seeded {} documents", added);
    Ok(())
}

fn run_init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path.or_else(default_config_path) {
        Some(path) => path,
        None => anyhow::bail!("Could not determine home directory; pass --config"),
    };
    write_default_config(&path, force)?;
    println!("Wrote {}", path.display());
    Ok(())
}
