use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, filter::LevelFilter};

use bot_fleet::config::FleetConfig;
use bot_fleet::console::Console;
use bot_fleet::definitions::DefinitionStore;
use bot_fleet::poll::{HttpPollClient, PollClient};
use bot_fleet::supervisor::Supervisor;
use bot_fleet::worker::WorkerSettings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = FleetConfig::from_env()?;

    // File log gets everything RUST_LOG allows; the terminal only warnings and up
    // so the console stays readable.
    let log_dir = config
        .log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let log_name = config
        .log_file
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "log.txt".into());
    let (file_writer, log_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, log_name));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer)
                .with_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(LevelFilter::WARN),
        )
        .init();

    eprintln!("🤖 Bot fleet v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Endpoint: {}", config.endpoint);
    eprintln!("   Bots: {}", config.bots_dir.display());
    eprintln!("   Log: {}", config.log_file.display());
    eprintln!(
        "   Poll every {}s (timeout {}s), stagnation: {:?}",
        config.poll_interval.as_secs(),
        config.request_timeout.as_secs(),
        config.stagnation
    );

    let client: Arc<dyn PollClient> = Arc::new(HttpPollClient::new(
        config.endpoint.clone(),
        config.request_timeout,
    )?);
    let supervisor = Arc::new(Supervisor::new(
        client,
        WorkerSettings {
            poll_interval: config.poll_interval,
            stagnation: config.stagnation,
        },
    ));

    // ── Load definitions ──────────────────────────────────────────────
    let store = Arc::new(DefinitionStore::new(config.bots_dir.clone()));
    store.ensure_dir().await?;
    let definitions = store.load_all().await?;
    for definition in &definitions {
        match supervisor
            .create(definition.name.clone(), definition.credentials())
            .await
        {
            Ok(id) if config.autostart => {
                supervisor.start(id).await?;
            }
            Ok(_) => {}
            Err(e) => tracing::error!(name = %definition.name, error = %e, "Skipping definition"),
        }
    }
    eprintln!("   Agents: {} loaded\n", definitions.len());

    // ── Console ───────────────────────────────────────────────────────
    let console = Console::new(Arc::clone(&supervisor), store);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let outcome = tokio::select! {
        result = console.run(stdin, tokio::io::stdout()) => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!();
            Ok(())
        }
    };

    eprintln!("Stopping agents...");
    supervisor.shutdown(config.request_timeout).await;
    drop(log_guard);

    // A pending stdin read sits on a blocking thread that cannot be cancelled,
    // so returning from main would wait for the next input line.
    if let Err(e) = outcome {
        eprintln!("Console error: {e}");
        std::process::exit(1);
    }
    std::process::exit(0)
}
