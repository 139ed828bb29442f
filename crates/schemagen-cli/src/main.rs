//! Schemagen - Prisma schema generation CLI
//!
//! ## Commands
//!
//! - `chat`: interactive session, one schema per message (default)
//! - `generate`: one-shot generation from requirements on the command line
//! - `validate`: run the validate/repair loop on an existing schema
//! - `show`: print the stored schema

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};

use schemagen_core::{
    AgentConfig, FsSchemaStore, LlmClient, OpenAiClient, PrismaValidator, SchemaAgent,
    SchemaRepairer, SchemaStore, ValidationLoop, ValidationOutcome,
};

#[derive(Parser)]
#[command(name = "schemagen")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate and validate Prisma schemas from natural language", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Directory holding the schema file
    #[arg(long, global = true, env = "SCHEMA_DIR")]
    schema_dir: Option<PathBuf>,

    /// Schema file name inside the schema directory
    #[arg(long, global = true, env = "SCHEMA_FILE")]
    schema_file: Option<String>,

    /// Maximum validator invocations per schema
    #[arg(long, global = true, env = "MAX_ATTEMPTS")]
    max_attempts: Option<u32>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat: describe a data model, get a validated schema
    Chat,

    /// Generate a schema from requirements given as arguments
    Generate {
        /// Natural-language requirements
        #[arg(required = true, num_args = 1..)]
        requirements: Vec<String>,
    },

    /// Validate a schema file, repairing it with the LLM when possible
    Validate {
        /// Schema to validate (default: the stored schema)
        file: Option<PathBuf>,

        /// Check only; never ask the LLM for a fix
        #[arg(long)]
        no_repair: bool,
    },

    /// Print the stored schema
    Show,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // `.env` must be loaded before clap reads env-backed flags.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = load_config(&cli)?;

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        config.tracing_level()
    };
    schemagen_core::init_tracing(cli.json, level);

    let success = match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => cmd_chat(&config).await?,
        Commands::Generate { requirements } => {
            cmd_generate(&config, &requirements.join(" ")).await?
        }
        Commands::Validate { file, no_repair } => {
            cmd_validate(&config, file.as_deref(), no_repair).await?
        }
        Commands::Show => cmd_show(&config)?,
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Environment first, then command-line overrides.
fn load_config(cli: &Cli) -> Result<AgentConfig> {
    let mut config = AgentConfig::from_env().context("Failed to load configuration")?;
    if let Some(dir) = &cli.schema_dir {
        config = config.with_schema_dir(dir);
    }
    if let Some(file) = &cli.schema_file {
        config.schema_file = file.clone();
    }
    if let Some(max) = cli.max_attempts {
        config.max_attempts = max;
    }
    Ok(config)
}

fn build_agent(config: &AgentConfig) -> Result<SchemaAgent> {
    SchemaAgent::from_config(config).context("Failed to initialize application")
}

fn is_exit_command(input: &str) -> bool {
    matches!(input.to_lowercase().as_str(), "quit" | "exit" | "bye")
}

/// Interactive session
async fn cmd_chat(config: &AgentConfig) -> Result<bool> {
    let agent = build_agent(config)?;
    info!("Starting interactive chat mode");

    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    };
    chat_session(
        &agent,
        BufReader::new(tokio::io::stdin()),
        interrupted,
        &mut std::io::stdout(),
    )
    .await?;
    Ok(true)
}

/// Read-respond loop over `reader`.
///
/// `interrupted` is one future for the whole session, watched both while
/// waiting for input and while a turn runs. Resolving it abandons the turn
/// in flight.
async fn chat_session<R, W>(
    agent: &SchemaAgent,
    reader: R,
    interrupted: impl Future<Output = ()>,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    tokio::pin!(interrupted);
    let mut lines = reader.lines();

    writeln!(
        out,
        "Welcome to schemagen! Type 'quit' or 'exit' to end the conversation."
    )?;
    writeln!(out, "{}", "=".repeat(50))?;

    loop {
        write!(out, "\nYou: ")?;
        out.flush().context("Failed to flush stdout")?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read from stdin")?,
            _ = &mut interrupted => {
                writeln!(out, "\nGoodbye!")?;
                break;
            }
        };

        // EOF
        let Some(line) = line else {
            writeln!(out, "\nGoodbye!")?;
            break;
        };

        let input = line.trim();
        if is_exit_command(input) {
            writeln!(out, "Goodbye!")?;
            break;
        }
        if input.is_empty() {
            continue;
        }

        let reply = tokio::select! {
            reply = agent.respond(input) => reply,
            _ = &mut interrupted => {
                info!("Interrupted during a turn");
                writeln!(out, "\nGoodbye!")?;
                break;
            }
        };
        if reply.success {
            writeln!(out, "Assistant: {}", reply.message)?;
        } else {
            writeln!(out, "Error: {}", reply.message)?;
        }
    }

    Ok(())
}

/// One-shot generation
async fn cmd_generate(config: &AgentConfig, requirements: &str) -> Result<bool> {
    let agent = build_agent(config)?;
    let reply = agent.respond(requirements).await;
    println!("{}", reply.message);
    Ok(reply.success)
}

/// Validate (and optionally repair) an existing schema
async fn cmd_validate(
    config: &AgentConfig,
    file: Option<&Path>,
    no_repair: bool,
) -> Result<bool> {
    let store = Arc::new(
        FsSchemaStore::new(&config.schema_dir, &config.schema_file)
            .context("Failed to open schema directory")?,
    );

    let content = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema file: {}", path.display()))?,
        None => store.read().context("Failed to read stored schema")?,
    };

    let repairer = if no_repair {
        SchemaRepairer::disabled()
    } else {
        match OpenAiClient::new(config.llm.clone()) {
            Ok(client) => {
                let llm: Arc<dyn LlmClient> = Arc::new(client);
                SchemaRepairer::new(Some(llm))
            }
            Err(e) => {
                warn!(error = %e, "LLM unavailable; validating without repair");
                SchemaRepairer::disabled()
            }
        }
    };

    let vloop = ValidationLoop::new(
        Arc::new(PrismaValidator::new(config.validator.clone())),
        repairer,
        store.clone(),
    );
    let outcome = vloop
        .validate(&content, config.max_attempts)
        .await
        .context("Failed to save repaired schema")?;

    print_outcome(&outcome, &content, store.path());
    Ok(outcome.success())
}

fn print_outcome(outcome: &ValidationOutcome, original: &str, saved_to: &Path) {
    match outcome {
        ValidationOutcome::Passed { schema, attempts } => {
            println!("Schema is valid (attempts: {attempts})");
            if schema != original {
                println!("Repaired schema saved to {}\n", saved_to.display());
                println!("{schema}");
            }
        }
        ValidationOutcome::Failed {
            diagnostic,
            attempts,
            ..
        } => {
            println!("Schema validation failed after {attempts} attempts.\n");
            println!("Error: {diagnostic}");
        }
    }
}

/// Print the stored schema
fn cmd_show(config: &AgentConfig) -> Result<bool> {
    let store = FsSchemaStore::new(&config.schema_dir, &config.schema_file)
        .context("Failed to open schema directory")?;
    let content = store.read().context("Failed to read stored schema")?;

    if content.is_empty() {
        println!("No schema stored at {}", store.path().display());
    } else {
        println!("{content}");
    }
    Ok(true)
}
