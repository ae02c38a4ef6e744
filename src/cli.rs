use clap::{Parser, Subcommand};

/// Chat with qBraid-hosted models from the terminal
#[derive(Debug, Parser)]
#[command(name = "qchat")]
#[command(version)]
#[command(about = "Chat with qBraid-hosted models from the terminal", long_about = None)]
pub struct Args {
    /// Model name (default: config/model, else first model in the catalog)
    #[arg(short = 'm', long = "model", global = true)]
    pub model: Option<String>,

    /// Transport: "http" or "stub" (default: config/transport or "http")
    #[arg(long = "transport", global = true)]
    pub transport: Option<String>,

    /// API base URL (default: config/base_url or https://api.qbraid.com/api)
    #[arg(long = "base-url", global = true)]
    pub base_url: Option<String>,

    /// Ask the service for a non-streamed response body
    #[arg(long = "no-stream")]
    pub no_stream: bool,

    /// Keep the conversation in memory only; the stored context is neither read nor written
    #[arg(long = "ephemeral", global = true)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// Prompt text (positional) (used when no subcommand is given)
    #[arg(value_name = "PROMPT")]
    pub prompt: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List available chat models and their pricing
    Models,

    /// Print the stored conversation context
    History,

    /// Forget the stored conversation context
    Clear,

    /// Check that an API key can be found
    Auth,

    /// Run an interactive terminal chat UI
    #[cfg(feature = "tui")]
    Tui,
}
