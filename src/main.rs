use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use kripadham::app::Services;
use kripadham::cli::{Cli, Command, RegisterCommand};
use kripadham::commands;
use kripadham::config::AppConfig;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    kripadham::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    let Cli {
        config,
        cache_dir,
        json,
        command,
    } = cli;
    let services = || -> anyhow::Result<Services> {
        let config = AppConfig::load(config.as_deref()).context("load config")?;
        Services::new(config, &cache_dir)
    };

    match command {
        Command::Chat(args) => commands::chat(&args.message, json).context("chat")?,
        Command::Youtube(args) => commands::youtube(&args.link, json).context("youtube")?,
        Command::Books(args) => {
            commands::books(&services()?, args, json)
                .await
                .context("books")?;
        }
        Command::Read(args) => {
            commands::read(&services()?, args, json)
                .await
                .context("read")?;
        }
        Command::Switch(args) => {
            commands::switch(&services()?, args, json)
                .await
                .context("switch")?;
        }
        Command::Open(args) => {
            commands::open(&services()?, &args.path, json)
                .await
                .context("open")?;
        }
        Command::Devotees(args) => {
            commands::devotees(&services()?, args, json)
                .await
                .context("devotees")?;
        }
        Command::Kirtans(args) => {
            commands::kirtans(&services()?, args, json)
                .await
                .context("kirtans")?;
        }
        Command::Bhajans(args) => {
            commands::bhajans(&services()?, args, json)
                .await
                .context("bhajans")?;
        }
        Command::Kathas(args) => {
            commands::kathas(&services()?, args, json)
                .await
                .context("kathas")?;
        }
        Command::Register {
            command: RegisterCommand::Initiation(args),
        } => {
            commands::initiation(&services()?, args, json)
                .await
                .context("register initiation")?;
        }
        Command::Register {
            command: RegisterCommand::GuruPurnima(args),
        } => {
            commands::guru_purnima(&services()?, args, json)
                .await
                .context("register guru-purnima")?;
        }
        Command::Register {
            command: RegisterCommand::Event(args),
        } => {
            commands::event(&services()?, args, json)
                .await
                .context("register event")?;
        }
        Command::Register {
            command: RegisterCommand::Checkout(args),
        } => {
            commands::checkout(&services()?, args, json)
                .await
                .context("register checkout")?;
        }
    }

    Ok(())
}
