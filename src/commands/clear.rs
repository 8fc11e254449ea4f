use anyhow::Result;
use owo_colors::OwoColorize;
use routine_core::{DateRange, SyncPipeline};

use super::{Overrides, Settings, google_calendar};
use crate::render::Render;

pub async fn run(overrides: Overrides, range: DateRange, confirmed: bool) -> Result<()> {
    let settings = Settings::resolve(overrides)?;

    if !confirmed {
        anyhow::bail!(
            "This deletes every event in calendar '{}' from {} to {}.\n\
            Re-run with --yes to confirm.",
            settings.options.calendar_id,
            range.start,
            range.last()
        );
    }

    let pipeline = SyncPipeline::new(google_calendar()?, &settings.options);
    let report = pipeline.clear_range(&range).await?;

    println!("{} {}", "Cleared".bold(), report.render());

    Ok(())
}
