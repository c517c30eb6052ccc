//! Banter bot launcher.
//!
//! ```text
//! banter-bot --api stub                    # profile "stub"
//! banter-bot --profile main --api stub -v  # profile "main", debug logging
//! ```
//!
//! Exits with the code the bot stopped with; `42` asks a supervisor to start
//! it again.

mod cli;
mod eval;
mod plugins;

use anyhow::Context;
use banter::core::ChatApi;
use banter::runtime::{Bot, LoggingBuilder, ProfileLayout};
use clap::Parser;
use tracing::info;

use banter_adapter_stub as _;

use crate::cli::Cli;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    if let Some(expr) = &cli.eval {
        return eval::run_cli(expr);
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start the async runtime: {err}");
            return std::process::ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => std::process::ExitCode::from(code.code()),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<banter::framework::ExitCode> {
    let layout = ProfileLayout::resolve(
        cli.profile.as_deref(),
        cli.api.as_deref(),
        cli.profiledir,
        cli.configdir,
    )?;

    let bot = Bot::load(&layout, cli.api.as_deref())
        .await
        .with_context(|| format!("failed to load profile '{}'", layout.name()))?;

    LoggingBuilder::for_profile(&layout, &bot.config().log_level, cli.verbose)
        .context("failed to prepare the log file")?
        .try_init()?;

    info!(
        profile = %layout.name(),
        dir = %layout.profile_dir().display(),
        api = %bot.api().api_name(),
        "Starting bot"
    );
    let code = bot.run().await?;
    info!(%code, "Bot stopped");
    Ok(code)
}
