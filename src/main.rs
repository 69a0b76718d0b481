//! Portfolio Race Bot
//!
//! Values brokerage accounts, tracks their race against each other and a
//! benchmark index, and reports over Telegram.

use clap::{Parser, Subcommand};
use portfolio_race_bot::{
    broker::{BrokerData, InvestApiClient},
    config::Config,
    notify::Notifier,
    scheduler::Engine,
    telegram::{BotCommand, CommandHandler, TelegramBot},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "portfolio-race-bot")]
#[command(about = "Portfolio valuation and race reporting bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot: daily schedule plus Telegram commands
    Run,
    /// Run one full report cycle now and exit
    Report,
    /// Print the race standings to stdout
    Race,
    /// Print the lifetime P&L of the primary account to stdout
    Pnl,
    /// Send a test message to Telegram
    TestNotify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run => run_bot(config).await,
        Commands::Report => {
            let (engine, _) = build_engine(config)?;
            engine.run_cycle().await?;
            println!("✅ Report cycle finished");
            Ok(())
        }
        Commands::Race => {
            let (engine, _) = build_engine(config)?;
            println!("{}", engine.race_report_text()?);
            Ok(())
        }
        Commands::Pnl => {
            let (engine, _) = build_engine(config)?;
            println!("{}", engine.pnl_report_text().await?);
            Ok(())
        }
        Commands::TestNotify => {
            let notifier = make_notifier(&config);
            anyhow::ensure!(notifier.is_enabled(), "Telegram not configured in config");
            notifier
                .send_text("🧪 <b>Test Notification</b>\n\nTelegram integration is working!")
                .await?;
            println!("✅ Test notification sent");
            Ok(())
        }
    }
}

fn make_notifier(config: &Config) -> Notifier {
    match &config.telegram {
        Some(tg) => Notifier::new(tg.clone()),
        None => {
            tracing::warn!("Telegram not configured, notifications disabled");
            Notifier::disabled()
        }
    }
}

fn build_engine(config: Config) -> anyhow::Result<(Arc<Engine>, Notifier)> {
    let notifier = make_notifier(&config);
    let broker: Arc<dyn BrokerData> = Arc::new(InvestApiClient::new(&config.broker)?);
    let engine = Arc::new(Engine::new(config, broker, notifier.clone()));
    Ok((engine, notifier))
}

async fn run_bot(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting portfolio race bot");

    let telegram_config = config.telegram.clone();
    let (engine, notifier) = build_engine(config)?;

    if let Err(e) = notifier.startup().await {
        tracing::warn!("Failed to send startup notification: {}", e);
    }

    let (cmd_tx, cmd_rx) = mpsc::channel::<BotCommand>(100);

    if let Some(tg) = telegram_config {
        let bot = TelegramBot::new(tg, cmd_tx);
        tokio::spawn(async move {
            bot.start_polling().await;
        });
        tracing::info!("Telegram command listener started");
    }

    let handler = CommandHandler::new(engine.clone(), notifier);
    tokio::spawn(async move {
        handler.run(cmd_rx).await;
    });

    engine.run_schedule().await;
    Ok(())
}
