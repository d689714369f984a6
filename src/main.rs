use anyhow::Result;
use clap::Parser;
use meeting_watcher::cli::{Cli, WatchCommandHandler, WatchOptions, commands::Commands};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let handler = WatchCommandHandler::default();

    match cli.command {
        Commands::Watch {
            config,
            idle_timeout,
            interval,
            session_log,
            json,
        } => {
            let options = WatchOptions {
                config,
                idle_timeout,
                interval,
                session_log,
                json,
            };
            handler.handle_watch_command(options).await?;
        }
        Commands::Signatures { config, json } => {
            handler.handle_signatures_command(config, json)?;
        }
        Commands::Local { config } => {
            handler.handle_local_command(config)?;
        }
        Commands::Sign { state } => {
            handler.handle_sign_command(state).await?;
        }
    }

    Ok(())
}
