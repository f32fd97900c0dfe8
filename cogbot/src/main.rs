#[macro_use]
extern crate tracing;

use cogbot::{
    cogs::Cogs,
    core::{logging, BotConfig, Context},
};
use eyre::{Result, WrapErr};
use tokio::{runtime::Builder as RuntimeBuilder, signal};

fn main() {
    let runtime = RuntimeBuilder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Could not build runtime");

    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            panic!("Failed to prepare .env variables: {err}");
        }
    }

    let _log_worker_guard = logging::init();

    if let Err(source) = runtime.block_on(async_main()) {
        error!(?source, "Critical error in main");
    }
}

async fn async_main() -> Result<()> {
    BotConfig::init().context("failed to initialize config")?;

    let ctx = Context::init().context("failed to create context")?;
    let cogs = Cogs::load(&ctx).context("failed to load cogs")?;

    let namespaces: Vec<_> = ctx
        .registry()
        .namespaces()
        .iter()
        .map(ToString::to_string)
        .collect();

    info!(?namespaces, "Loaded {} caches", namespaces.len());

    // The store may be down at startup; operations recover once it is back
    match cogs.trivia.players().await {
        Ok(players) => info!(players, "Trivia scores are available"),
        Err(err) => warn!(?err, "Cache backend is not reachable yet"),
    }

    match signal::ctrl_c().await {
        Ok(_) => info!("Received Ctrl+C"),
        Err(err) => error!(?err, "Failed to await Ctrl+C"),
    }

    tokio::select! {
        _ = ctx.shutdown() => info!("Shutting down"),
        res = signal::ctrl_c() => match res {
            Ok(_) => info!("Forcing shutdown"),
            Err(err) => error!(?err, "Failed to await second Ctrl+C"),
        }
    }

    Ok(())
}
