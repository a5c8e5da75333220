use slack_bot_api::{SlackBot, SlackBotError};
use slack_bot_api::config::load_settings;
use slack_bot_api::error::Result;
use slack_bot_api::logging::log_error;
use slack_bot_api::slack::{PostOptions, StreamEvent};
use tokio::signal;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    init_tracing();

    tracing::info!("Starting Slack bot");

    let settings = load_settings()?;
    tracing::info!("Configuration loaded");
    tracing::debug!(
        api = %settings.slack.api_base_url,
        bot_name = ?settings.slack.bot_name,
        ping_interval_secs = settings.stream.ping_interval_secs,
        "Config"
    );

    let bot = SlackBot::from_settings(&settings)?;

    // `slack-bot-api <name> <text...>` sends one message and exits
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let [target, words @ ..] = args.as_slice() {
        if words.is_empty() {
            tracing::error!("Usage: slack-bot-api <#channel|@user|name> <text...>");
            return Err(SlackBotError::Config("missing message text".to_string()));
        }
        let text = words.join(" ");
        return match bot.send_to(target, &text, &PostOptions::new()).await {
            Ok(delivery) => {
                tracing::info!(channel = %delivery.channel, ts = ?delivery.ts, "Message sent");
                Ok(())
            }
            Err(e) => {
                log_error("send_to", &e);
                Err(e)
            }
        };
    }

    if !settings.stream.auto_connect {
        tracing::info!("Auto-connect disabled, not starting a session");
        return Ok(());
    }

    let mut events = bot.subscribe();
    let snapshot = bot.start().await?;
    tracing::info!(
        bot = ?bot.self_identity().map(|s| &s.name),
        team = ?bot.team().map(|t| &t.name),
        collections = ?snapshot.included(),
        "Session started"
    );

    let shutdown = tokio::select! {
        result = log_events(&mut events) => result,
        signal_name = shutdown_signal() => {
            let signal_name = signal_name?;
            tracing::info!(signal = %signal_name, "Received shutdown signal");
            Ok(())
        }
    };

    tracing::info!(state = ?bot.state(), "Shutting down");
    bot.log_cache_stats().await;
    shutdown
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("slack_bot_api=debug"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_line_number(true)
            .init();
    }
}

/// Log stream events until the session closes
async fn log_events(events: &mut broadcast::Receiver<StreamEvent>) -> Result<()> {
    loop {
        match events.recv().await {
            Ok(StreamEvent::Open) => tracing::info!("Bot is ready to receive messages"),
            Ok(StreamEvent::Message(payload)) => {
                let kind = payload.get("type").and_then(|t| t.as_str()).unwrap_or("unknown");
                tracing::debug!(event_type = %kind, "Stream event");
            }
            Ok(StreamEvent::Close { reason }) => {
                tracing::info!(reason = ?reason, "Stream closed");
                return Ok(());
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped = skipped, "Event log fell behind");
            }
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}

/// Wait for SIGINT, SIGTERM or SIGQUIT (Ctrl+C elsewhere)
async fn shutdown_signal() -> Result<String> {
    #[cfg(unix)]
    {
        use signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigquit = signal(SignalKind::quit())?;

        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT (Ctrl+C)",
            _ = sigterm.recv() => "SIGTERM",
            _ = sigquit.recv() => "SIGQUIT",
        };
        Ok(name.to_string())
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        Ok("Ctrl+C".to_string())
    }
}
