mod app;
mod auth;
mod cli;
mod client;
mod config;
mod error;
mod paths;
mod prompt;
mod store;
mod transport;

#[cfg(feature = "tui")]
mod tui;

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the reply only.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = cli::Args::parse();

    let dirs = match paths::Dirs::from_env() {
        Ok(d) => Some(d),
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "cannot resolve qchat directories");
            None
        }
    };
    let cfg = match &dirs {
        Some(d) => config::Config::load_optional(d.config_file())?,
        None => None,
    };
    tracing::debug!(?dirs, ?cfg, "resolved config");

    let settings = app::Settings::resolve(&args, cfg.as_ref());
    let http = app::build_http(cfg.as_ref())?;
    let client = app::build_client(&http, cfg.as_ref(), &settings, dirs.as_ref())?;
    tracing::debug!(transport = client.transport_name(), ?settings, "client ready");

    match args.cmd {
        Some(cli::Command::Models) => return app::cmd_models(&client).await,
        Some(cli::Command::History) => return app::cmd_history(&client),
        Some(cli::Command::Clear) => return app::cmd_clear(&client),
        Some(cli::Command::Auth) => return app::cmd_auth(&client),
        #[cfg(feature = "tui")]
        Some(cli::Command::Tui) => {
            return tui::run_tui(client, &settings).await;
        }
        None => {}
    }

    let prompt = args.prompt.join(" ");
    if prompt.trim().is_empty() {
        anyhow::bail!("No prompt provided. Try: qchat \"Hello\" or `qchat models`");
    }

    app::cmd_chat(&client, &settings, &prompt, !args.no_stream).await
}
