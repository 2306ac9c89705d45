//! Per-run file transformation: select files, process each one in its own
//! task, and merge contents and source maps back into the file set.

use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};
use tracing::{Instrument, debug, info_span, instrument, warn};

use stylesmith_engine::{MapOptions, ProcessOptions, ProcessResult, Processor};
use stylesmith_shared::{FileEntry, Files, Result, StylesmithError, map_key};

use crate::host::BuildContext;

/// Process every file matching `patterns` with `processor`.
///
/// Every task runs to completion. Successful results are written back as they
/// arrive; the first failure observed is returned once all tasks have settled.
#[instrument(skip_all, fields(patterns = ?patterns))]
pub async fn transform_files(
    files: &mut Files,
    ctx: &dyn BuildContext,
    processor: Arc<Processor>,
    patterns: &[String],
    map: Option<&MapOptions>,
) -> Result<()> {
    let selected = {
        let keys: Vec<&str> = files.keys().map(String::as_str).collect();
        ctx.match_files(patterns, &keys)
    };

    if selected.is_empty() {
        debug!("no files matched");
        return Ok(());
    }
    debug!(count = selected.len(), "processing files");

    let mut tasks = JoinSet::new();
    for key in selected {
        let Some(entry) = files.get(&key) else {
            continue;
        };
        let css = entry.text();
        let path = ctx.source().join(&key);

        // A map left by an earlier step (e.g. a compiler) is chained, not replaced.
        let file_map = map.cloned().map(|mut m| {
            m.prev = files.get(&map_key(&key)).map(FileEntry::text);
            m
        });
        let opts = ProcessOptions {
            from: Some(path.clone()),
            to: Some(path),
            map: file_map,
        };

        let processor = Arc::clone(&processor);
        let span = info_span!("process_file", file = %key);
        tasks.spawn(
            async move {
                let result = processor.process(&css, &opts).await;
                (key, result)
            }
            .instrument(span),
        );
    }

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((key, Ok(result))) => merge_result(files, &key, result, map),
            Ok((key, Err(err))) => {
                warn!(file = %key, kind = err.kind(), error = %err, "processing failed");
                first_error.get_or_insert(err);
            }
            Err(join_err) => {
                let err = task_failure(join_err);
                warn!(error = %err, "processing task failed");
                first_error.get_or_insert(err);
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Write one file's result, and its companion map entry, into `files`.
fn merge_result(files: &mut Files, key: &str, result: ProcessResult, map: Option<&MapOptions>) {
    let Some(entry) = files.get_mut(key) else {
        return;
    };
    entry.contents = result.css.into_bytes();
    let (mode, stats) = (entry.mode.clone(), entry.stats.clone());
    let companion = map_key(key);

    match (map, result.map) {
        (Some(m), _) if m.inline => {
            if files.remove(&companion).is_some() {
                debug!(file = %companion, "removed external map superseded by inline map");
            }
        }
        (Some(_), Some(source_map)) => {
            files.insert(
                companion,
                FileEntry {
                    contents: source_map.to_json().into_bytes(),
                    mode,
                    stats,
                },
            );
        }
        _ => {}
    }
}

/// Turn a task that ended without a structured error into one.
fn task_failure(err: JoinError) -> StylesmithError {
    let payload = if err.is_panic() {
        let panic = err.into_panic();
        panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .map_or(serde_json::Value::Null, serde_json::Value::String)
    } else {
        serde_json::Value::String(err.to_string())
    };
    StylesmithError::processing(&payload)
}
