use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use routine_core::{DateRange, SyncPipeline, schedule};

use super::{Overrides, Settings, google_calendar};
use crate::render::Render;

pub async fn run(overrides: Overrides, range: DateRange) -> Result<()> {
    let settings = Settings::resolve(overrides)?;
    let source = settings.source()?;
    let entries = schedule::load(&source).with_context(|| format!("Failed to read {}", source.display()))?;
    let pipeline = SyncPipeline::new(google_calendar()?, &settings.options);

    for (i, date) in range.dates().enumerate() {
        println!("📅 {}", date.to_string().bold());

        match pipeline.plan_day(&entries, date).await {
            Ok(ops) if ops.is_empty() => println!("   {}", "Nothing to sync".dimmed()),
            Ok(ops) => {
                for op in ops.iter() {
                    println!("   {}", op.kind.render());
                }
            }
            Err(e) => println!("   {}", e.to_string().red()),
        }

        // Spacing between dates (but not after the last one)
        if i + 1 < range.days as usize {
            println!();
        }
    }

    Ok(())
}
