use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use rollforward::db;
use rollforward::error::Result;
use rollforward::scheduler::{Scheduler, SchedulerConfig};
use rollforward::settings::Settings;

pub fn run(settings: &Settings) -> Result<()> {
    db::open(&PathBuf::from(&settings.data_dir))?;
    let config = SchedulerConfig::from_settings(settings);
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async move {
        let (scheduler, _handle) = Scheduler::new(config);
        let cancel = CancellationToken::new();

        let shutdown = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("received Ctrl-C, shutting down"),
                Err(e) => warn!(error = %e, "could not listen for Ctrl-C"),
            }
            shutdown.cancel();
        });

        println!("Scheduler running against {} (Ctrl-C to stop)", settings.data_dir);
        scheduler.run(cancel).await;
    });
    Ok(())
}
