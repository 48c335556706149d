// sentinel-cortex: a thin CLI shell around the Cognitive Pipeline core.
//
// This binary does not emulate an SSH server or an HTTP login endpoint —
// that's the outer honeypot service's job (non-goal per spec.md §1). What
// it drives is the pipeline itself: feed one interaction at a time (or a
// REPL of them) through `Director::handle` and print what comes back, so
// the core can be inspected and smoke-tested standalone.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sentinel_cortex::config::{CoreConfig, Mode};
use sentinel_cortex::director::Director;
use sentinel_cortex::interaction::{Interaction, Payload};
use sentinel_cortex::persistence::FileModelStore;
use sentinel_cortex::response::StubEmulator;
use sentinel_cortex::telemetry::{TracingAlerts, TracingTelemetry};

#[derive(Parser)]
#[command(name = "sentinel-cortex", version, about = "Cognitive pipeline core for an adaptive SSH/HTTP honeypot")]
struct Cli {
    /// Directory holding persisted predictor/classifier blobs.
    #[arg(long, global = true, default_value = "./storage")]
    storage_path: String,

    /// Deployment mode: observation (L1-L4 never influence the response,
    /// predictors still learn) or engagement (L4 may be invoked).
    #[arg(long, global = true, default_value = "observation")]
    mode: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed a single SSH command through the pipeline and print the response.
    Ssh {
        /// Attacker source IP — the context key.
        #[arg(long, default_value = "127.0.0.1")]
        ip: String,
        /// Session id for this interaction (only the latest is remembered per IP).
        #[arg(long, default_value = "cli-session")]
        session: String,
        /// The shell command the attacker typed.
        command: String,
    },

    /// Feed a single HTTP login attempt through the pipeline and print the response.
    Http {
        #[arg(long, default_value = "127.0.0.1")]
        ip: String,
        #[arg(long, default_value = "cli-session")]
        session: String,
        username: String,
        password: String,
    },

    /// Interactive shell: each line is treated as an SSH command from one
    /// fixed attacker IP/session, until `exit` or EOF. Persists on exit.
    Repl {
        #[arg(long, default_value = "127.0.0.1")]
        ip: String,
        #[arg(long, default_value = "cli-session")]
        session: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = CoreConfig::from_env();
    config.storage_path = cli.storage_path;
    config.mode = match cli.mode.as_str() {
        "engagement" => Mode::Engagement,
        _ => Mode::Observation,
    };
    config.validate()?;

    let store = Arc::new(FileModelStore::new(&config.storage_path));
    store.ensure_dir().await?;

    let director = Director::new(
        config,
        store,
        Arc::new(StubEmulator),
        None,
        Arc::new(TracingTelemetry),
        Arc::new(TracingAlerts),
    )
    .await;

    match cli.command {
        Commands::Ssh { ip, session, command } => {
            let response = director
                .handle(Interaction {
                    attacker_ip: ip,
                    session_id: session,
                    payload: Payload::SshCommand { command },
                    received_at: Utc::now(),
                })
                .await;
            println!("{}", response);
        }
        Commands::Http {
            ip,
            session,
            username,
            password,
        } => {
            let response = director
                .handle(Interaction {
                    attacker_ip: ip,
                    session_id: session,
                    payload: Payload::HttpLogin { username, password },
                    received_at: Utc::now(),
                })
                .await;
            println!("{}", response);
        }
        Commands::Repl { ip, session } => {
            run_repl(&director, &ip, &session).await?;
        }
    }

    director.shutdown().await?;
    info!("predictor and classifier state persisted");
    Ok(())
}

async fn run_repl(director: &Director, ip: &str, session: &str) -> Result<()> {
    println!("{}", "sentinel-cortex interactive shell (type 'exit' to quit)".bold());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    loop {
        print!("{} ", "$".green());
        stdout.flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        if command == "exit" {
            break;
        }

        let response = director
            .handle(Interaction {
                attacker_ip: ip.to_string(),
                session_id: session.to_string(),
                payload: Payload::SshCommand {
                    command: command.to_string(),
                },
                received_at: Utc::now(),
            })
            .await;
        println!("{}", response);
    }
    Ok(())
}
