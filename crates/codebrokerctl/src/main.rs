//! codebrokerctl - command-line client for codebrokerd
//!
//! Submits a single code-assistance request and prints the answer.

mod client;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use client::{fetch_health, BrokerClient, DEFAULT_HEALTH_URL};
use codebroker_common::{Action, InboundRequest, ResponseEnvelope, VERSION};
use owo_colors::OwoColorize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codebrokerctl")]
#[command(about = "Code assistance from the codebroker daemon", long_about = None)]
#[command(version = VERSION)]
struct Cli {
    /// Daemon address (host:port). Defaults to $CODEBROKER_ADDR or 127.0.0.1:8765
    #[arg(long, global = true)]
    addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explain what a piece of code does
    Explain(RequestArgs),

    /// Translate code to another language
    Translate {
        #[command(flatten)]
        request: RequestArgs,

        /// Target language
        #[arg(long, default_value = "python")]
        target_language: String,
    },

    /// Suggest optimizations
    Optimize(RequestArgs),

    /// Free-form programming chat
    Chat(RequestArgs),

    /// Diagnose an error message
    FixError {
        #[command(flatten)]
        request: RequestArgs,

        /// The error message produced by the code
        #[arg(long, default_value = "")]
        error: String,
    },

    /// Query the daemon health endpoint
    Health {
        #[arg(long, default_value = DEFAULT_HEALTH_URL)]
        url: String,
    },
}

#[derive(Args)]
struct RequestArgs {
    /// Code or message text
    text: Option<String>,

    /// Read the content from a file instead
    #[arg(long, conflicts_with = "text")]
    file: Option<PathBuf>,

    /// teacher, hacker or reviewer
    #[arg(long, default_value = "teacher")]
    persona: String,

    /// online or offline
    #[arg(long, default_value = "online")]
    mode: String,
}

impl RequestArgs {
    fn content(&self) -> Result<String> {
        match (&self.file, &self.text) {
            (Some(path), _) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display())),
            (None, Some(text)) => Ok(text.clone()),
            (None, None) => anyhow::bail!("Provide content as an argument or with --file"),
        }
    }

    fn into_request(self, action: Action) -> Result<InboundRequest> {
        let content = self.content()?;
        Ok(InboundRequest::new(action.as_str(), content)
            .with_persona(self.persona)
            .with_mode(self.mode))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let request = match cli.command {
        Commands::Health { url } => return health(&url).await,
        Commands::Explain(args) => args.into_request(Action::Explain)?,
        Commands::Optimize(args) => args.into_request(Action::Optimize)?,
        Commands::Chat(args) => args.into_request(Action::Chat)?,
        Commands::Translate {
            request,
            target_language,
        } => request
            .into_request(Action::Translate)?
            .with_option("targetLanguage", target_language),
        Commands::FixError { request, error } => request
            .into_request(Action::FixError)?
            .with_option("error", error),
    };

    let addr = BrokerClient::discover_addr(cli.addr.as_deref());
    let mut client = BrokerClient::connect(&addr).await?;
    let envelope = client.send(&request).await?;
    print_envelope(&envelope);

    if !envelope.success {
        std::process::exit(1);
    }
    Ok(())
}

async fn health(url: &str) -> Result<()> {
    let report = fetch_health(url).await?;
    println!("{} {} v{}", "●".green(), report.service.bold(), report.version);
    println!("  status:  {}", report.status);
    println!("  online:  {}", yes_no(report.remote_configured));
    println!("  offline: {}", yes_no(report.local_configured));
    Ok(())
}

fn yes_no(flag: bool) -> String {
    if flag {
        "available".green().to_string()
    } else {
        "unavailable".yellow().to_string()
    }
}

fn print_envelope(envelope: &ResponseEnvelope) {
    match (&envelope.response, &envelope.error) {
        (Some(text), _) if envelope.success => println!("{}", text.green()),
        (_, Some(error)) => eprintln!("{} {}", "error:".red().bold(), error.red()),
        _ => eprintln!("{}", "empty response".red()),
    }
}
