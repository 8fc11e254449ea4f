use anyhow::Result;
use owo_colors::OwoColorize;
use routine_core::{DateRange, SyncPipeline, watch};
use tracing::error;

use super::{Overrides, Settings, google_calendar};
use crate::render::Render;

pub async fn run(overrides: Overrides, range: DateRange, watch_mode: bool) -> Result<()> {
    let settings = Settings::resolve(overrides)?;
    let source = settings.source()?;
    let pipeline = SyncPipeline::new(google_calendar()?, &settings.options);

    println!(
        "{} {} → {} ({})",
        "Syncing".bold(),
        range.start,
        range.last(),
        settings.options.timezone
    );

    match pipeline.sync_file(&source, &range).await {
        Ok(report) => println!("{}", report.render()),
        Err(e) if watch_mode => error!("Initial sync failed: {}", e),
        Err(e) => return Err(e.into()),
    }

    if watch_mode {
        watch::run(&source, &pipeline, &range, settings.config.debounce()).await?;
    }

    Ok(())
}
