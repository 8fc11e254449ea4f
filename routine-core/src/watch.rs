//! Re-sync when the routine file changes.
//!
//! The filesystem watcher runs on its own thread and only forwards paths over a
//! bounded channel. A single dispatcher loop consumes them, so runs never
//! overlap; notifications that arrive while a run is in flight are coalesced
//! into one follow-up run.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::date_range::DateRange;
use crate::error::{RoutineError, RoutineResult};
use crate::pipeline::SyncPipeline;
use crate::service::CalendarService;

const CHANNEL_CAPACITY: usize = 64;

/// Watch the directory holding `source` and forward changes to it.
///
/// Dropping the returned watcher ends the subscription and closes the channel.
pub fn watch_source(source: &Path) -> RoutineResult<(RecommendedWatcher, mpsc::Receiver<PathBuf>)> {
    let (tx, rx) = mpsc::channel::<PathBuf>(CHANNEL_CAPACITY);
    let watched = source.to_path_buf();

    let mut watcher = RecommendedWatcher::new(
        move |result: notify::Result<Event>| match result {
            Ok(event) => forward(event, &watched, &tx),
            Err(e) => warn!("Watch error: {}", e),
        },
        notify::Config::default(),
    )
    .map_err(|e| RoutineError::Watch(e.to_string()))?;

    let dir = source
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .map_err(|e| RoutineError::Watch(format!("failed to watch {}: {e}", dir.display())))?;

    Ok((watcher, rx))
}

/// Whether a notification for `path` concerns the routine file.
pub fn is_source_path(path: &Path, source: &Path) -> bool {
    if path == source {
        return true;
    }
    if path.file_name() != source.file_name() {
        return false;
    }

    match (path.parent(), source.parent()) {
        (Some(a), Some(b)) => canonical(a) == canonical(b),
        _ => false,
    }
}

/// Queue the routine file's path if `event` created or modified it.
fn forward(event: Event, source: &Path, tx: &mpsc::Sender<PathBuf>) {
    // Editors that save atomically show up as a create
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return;
    }

    for path in event.paths {
        if !is_source_path(&path, source) {
            continue;
        }
        // Only routine-file paths are queued, so a full channel already holds a pending run
        if tx.try_send(path).is_err() {
            debug!("Change already queued");
        }
    }
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Run the pipeline once per relevant notification until `shutdown` resolves
/// or the channel closes. Returns the number of runs.
///
/// Each run waits `debounce` and drains the queue first. A run in progress is
/// always finished before `shutdown` is looked at again, and a resolved
/// `shutdown` wins over queued notifications.
pub async fn dispatch<S, F>(
    rx: &mut mpsc::Receiver<PathBuf>,
    source: &Path,
    pipeline: &SyncPipeline<S>,
    range: &DateRange,
    debounce: Duration,
    shutdown: F,
) -> usize
where
    S: CalendarService,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut runs = 0;

    loop {
        let path = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            received = rx.recv() => match received {
                Some(path) => path,
                None => break,
            },
        };

        if !is_source_path(&path, source) {
            debug!(path = %path.display(), "Ignoring change");
            continue;
        }

        sleep(debounce).await;
        while rx.try_recv().is_ok() {}

        info!("Change detected in {}, re-syncing", source.display());
        match pipeline.sync_file(source, range).await {
            Ok(report) => info!("Synced: {}", report),
            Err(e) => error!("Sync after change failed: {}", e),
        }
        runs += 1;
    }

    runs
}

/// Watch `source` and re-sync `range` on every change until Ctrl-C.
pub async fn run<S: CalendarService>(
    source: &Path,
    pipeline: &SyncPipeline<S>,
    range: &DateRange,
    debounce: Duration,
) -> RoutineResult<usize> {
    let source = std::path::absolute(source)?;
    let (watcher, mut rx) = watch_source(&source)?;
    info!("Watching {} for changes (Ctrl-C to stop)", source.display());

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Could not listen for Ctrl-C: {}", e);
        }
    };

    let runs = dispatch(&mut rx, &source, pipeline, range, debounce, shutdown).await;

    drop(watcher);
    info!("Stopped watching after {} runs", runs);

    Ok(runs)
}
