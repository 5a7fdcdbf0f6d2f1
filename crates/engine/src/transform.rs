//! Applies a plugin chain to every entry of a bundle.
//!
//! Invocation is entry-major: every plugin runs on the first entry, then
//! every plugin on the second, and so on. Only entries present when the run
//! starts are visited. Synchronous work finishes for all entries before the
//! engine waits on any pending result.
//!
//! Pending results resolve to writes that are applied after the join, so they
//! land after every synchronous write of the run, in invocation order.

use crate::plugin::{EntryWrite, Plugin, PluginOutcome};
use rebundle_common::{Error, Result};
use rebundle_format::EntryStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Counters for one transform run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransformReport {
    /// Entries in the snapshot taken at the start of the run.
    pub entries: usize,
    /// Plugin invocations performed.
    pub invocations: usize,
    /// Invocations that returned a pending result.
    pub pending: usize,
    /// Deferred writes applied after the join.
    pub deferred_writes: usize,
}

/// A spawned async tail and the invocation it came from.
struct PendingTask {
    plugin: String,
    entry: String,
    handle: JoinHandle<anyhow::Result<Vec<EntryWrite>>>,
}

/// Outstanding async tails, in invocation order.
///
/// Dropping the set aborts whatever is still running, so a failed run leaves
/// nothing behind.
#[derive(Default)]
struct PendingSet {
    tasks: Vec<PendingTask>,
}

impl PendingSet {
    fn len(&self) -> usize {
        self.tasks.len()
    }

    fn spawn(&mut self, plugin: &str, entry: &str, pending: crate::plugin::PendingResult) {
        self.tasks.push(PendingTask {
            plugin: plugin.to_string(),
            entry: entry.to_string(),
            handle: tokio::spawn(pending),
        });
    }

    /// Wait for every task. Writes come back in invocation order.
    async fn join(&mut self) -> Result<Vec<Vec<EntryWrite>>> {
        let mut settled = Vec::with_capacity(self.tasks.len());
        for task in &mut self.tasks {
            let writes = match (&mut task.handle).await {
                Ok(Ok(writes)) => writes,
                Ok(Err(e)) => return Err(execution_error(&task.plugin, &task.entry, e)),
                Err(e) => {
                    return Err(execution_error(
                        &task.plugin,
                        &task.entry,
                        anyhow::anyhow!("task failed: {}", e),
                    ))
                }
            };
            trace!("{} settled for {}", task.plugin, task.entry);
            settled.push(writes);
        }
        Ok(settled)
    }
}

impl Drop for PendingSet {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.handle.abort();
        }
    }
}

fn execution_error(plugin: &str, entry: &str, e: anyhow::Error) -> Error {
    Error::PluginExecution {
        plugin: plugin.to_string(),
        entry: entry.to_string(),
        reason: format!("{:#}", e),
    }
}

/// Runs an ordered list of plugins over a bundle.
#[derive(Clone, Default)]
pub struct TransformEngine {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl TransformEngine {
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self { plugins }
    }

    /// Apply every plugin to every entry and wait for all pending work.
    ///
    /// The first failure, synchronous or not, aborts the run. Writes made by
    /// pending results are applied after the join, in invocation order.
    pub async fn run<S: EntryStore>(&self, store: &mut S) -> Result<TransformReport> {
        let names = store.snapshot_names();
        let mut report = TransformReport {
            entries: names.len(),
            ..TransformReport::default()
        };
        debug!(
            "Transforming {} entries with {} plugins",
            names.len(),
            self.plugins.len()
        );

        let mut pending = PendingSet::default();
        for name in &names {
            for plugin in &self.plugins {
                let Some(entry) = store.read(name) else {
                    warn!("Entry {} is listed but not readable, skipping", name);
                    break;
                };

                trace!("Invoking {} on {}", plugin.name(), name);
                report.invocations += 1;
                let outcome = plugin
                    .apply(store, &entry)
                    .map_err(|e| execution_error(plugin.name(), name, e))?;

                if let PluginOutcome::Pending(result) = outcome {
                    pending.spawn(plugin.name(), name, result);
                }
            }
        }

        report.pending = pending.len();
        if report.pending > 0 {
            debug!("Waiting for {} pending results", report.pending);
        }
        let settled = pending.join().await?;

        for write in settled.into_iter().flatten() {
            trace!("Applying deferred write to {}", write.name);
            write.apply(store);
            report.deferred_writes += 1;
        }

        debug!(
            "Transform complete: {} invocations, {} deferred writes",
            report.invocations, report.deferred_writes
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::plugin_fn;
    use pretty_assertions::assert_eq;
    use rebundle_format::{Bundle, Entry};
    use std::sync::Mutex;
    use std::time::Duration;

    fn shared(plugin: impl Plugin + 'static) -> Arc<dyn Plugin> {
        Arc::new(plugin)
    }

    fn sample() -> Bundle {
        let mut bundle = Bundle::new();
        bundle.write("a.js", b"const x=1".to_vec(), None);
        bundle.write("b.js", b"const y=2".to_vec(), None);
        bundle
    }

    /// A plugin that records `name(entry)` into a shared log.
    fn recorder(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Arc<dyn Plugin> {
        Arc::new(plugin_fn(name, move |_, entry: &Entry| {
            log.lock().unwrap().push(format!("{}({})", name, entry.name));
            Ok(PluginOutcome::Done)
        }))
    }

    fn append(name: &'static str, suffix: &'static str) -> Arc<dyn Plugin> {
        Arc::new(plugin_fn(name, move |store, entry| {
            let mut data = entry.data.clone();
            data.extend_from_slice(suffix.as_bytes());
            store.write(&entry.name, data, None);
            Ok(PluginOutcome::Done)
        }))
    }

    fn text(bundle: &Bundle, name: &str) -> String {
        String::from_utf8(bundle.get(name).unwrap().data.clone()).unwrap()
    }

    #[tokio::test]
    async fn test_no_plugins_leaves_bundle_untouched() {
        let mut bundle = sample();
        let report = TransformEngine::default().run(&mut bundle).await.unwrap();

        assert_eq!(bundle, sample());
        assert_eq!(report.entries, 2);
        assert_eq!(report.invocations, 0);
    }

    #[tokio::test]
    async fn test_entry_major_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let engine = TransformEngine::new(vec![
            recorder("P1", log.clone()),
            recorder("P2", log.clone()),
        ]);

        let report = engine.run(&mut sample()).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["P1(a.js)", "P2(a.js)", "P1(b.js)", "P2(b.js)"]
        );
        assert_eq!(report.invocations, 4);
    }

    #[tokio::test]
    async fn test_later_plugin_sees_earlier_output() {
        let mut bundle = sample();
        let engine = TransformEngine::new(vec![append("first", ";1"), append("second", ";2")]);
        engine.run(&mut bundle).await.unwrap();

        assert_eq!(text(&bundle, "a.js"), "const x=1;1;2");
        assert_eq!(text(&bundle, "b.js"), "const y=2;1;2");
    }

    #[tokio::test]
    async fn test_write_to_upcoming_entry_is_seen() {
        let mut bundle = sample();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_by_plugin = seen.clone();

        let engine = TransformEngine::new(vec![shared(plugin_fn("peek", move |store, entry| {
            if entry.name == "a.js" {
                store.write("b.js", b"rewritten".to_vec(), None);
            } else {
                seen_by_plugin.lock().unwrap().push(entry.data.clone());
            }
            Ok(PluginOutcome::Done)
        }))]);
        engine.run(&mut bundle).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![b"rewritten".to_vec()]);
    }

    #[tokio::test]
    async fn new_entries_written_mid_run_are_not_visited() {
        let mut bundle = sample();
        let log = Arc::new(Mutex::new(Vec::new()));
        let engine = TransformEngine::new(vec![
            shared(plugin_fn("spawner", |store, entry| {
                store.write(&format!("{}.map", entry.name), b"{}".to_vec(), None);
                Ok(PluginOutcome::Done)
            })),
            recorder("after", log.clone()),
        ]);

        let report = engine.run(&mut bundle).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["after(a.js)", "after(b.js)"]);
        assert_eq!(
            bundle.snapshot_names(),
            vec!["a.js", "b.js", "a.js.map", "b.js.map"]
        );
        assert_eq!(report.entries, 2);
    }

    #[tokio::test]
    async fn test_sync_failure_aborts_before_next_plugin() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let engine = TransformEngine::new(vec![
            shared(plugin_fn("explode", |_, entry| {
                if entry.name == "a.js" {
                    anyhow::bail!("cannot parse");
                }
                Ok(PluginOutcome::Done)
            })),
            recorder("second", log.clone()),
        ]);

        let err = engine.run(&mut sample()).await.unwrap_err();

        assert!(log.lock().unwrap().is_empty());
        match err {
            Error::PluginExecution {
                plugin,
                entry,
                reason,
            } => {
                assert_eq!(plugin, "explode");
                assert_eq!(entry, "a.js");
                assert_eq!(reason, "cannot parse");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    fn delayed(name: &'static str, delay_ms: u64, suffix: &'static str) -> Arc<dyn Plugin> {
        Arc::new(plugin_fn(name, move |_, entry| {
            let mut data = entry.data.clone();
            data.extend_from_slice(suffix.as_bytes());
            let target = entry.name.clone();
            Ok(PluginOutcome::pending(async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(vec![EntryWrite::new(target, data)])
            }))
        }))
    }

    #[tokio::test]
    async fn test_delayed_results_are_joined() {
        let mut bundle = sample();
        let engine = TransformEngine::new(vec![delayed("slow", 50, "!")]);
        let report = engine.run(&mut bundle).await.unwrap();

        assert_eq!(text(&bundle, "a.js"), "const x=1!");
        assert_eq!(text(&bundle, "b.js"), "const y=2!");
        assert_eq!(report.pending, 2);
        assert_eq!(report.deferred_writes, 2);
    }

    #[tokio::test]
    async fn test_deferred_writes_apply_in_invocation_order() {
        // the first invocation settles last
        let order = Arc::new(Mutex::new(Vec::new()));
        let delays = Arc::new(Mutex::new(vec![60u64, 5]));
        let order_in_plugin = order.clone();
        let engine = TransformEngine::new(vec![shared(plugin_fn("race", move |_, entry| {
            let delay = delays.lock().unwrap().remove(0);
            let order = order_in_plugin.clone();
            let data = entry.name.clone().into_bytes();
            Ok(PluginOutcome::pending(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                order.lock().unwrap().push(String::from_utf8(data.clone()).unwrap());
                Ok(vec![EntryWrite::new("winner", data)])
            }))
        }))]);

        let mut bundle = sample();
        engine.run(&mut bundle).await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["b.js", "a.js"]);
        assert_eq!(text(&bundle, "winner"), "b.js");
    }

    #[tokio::test]
    async fn test_sync_work_finishes_before_join() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tail_log = log.clone();
        let engine = TransformEngine::new(vec![
            shared(plugin_fn("async", move |_, entry| {
                let log = tail_log.clone();
                let name = entry.name.clone();
                Ok(PluginOutcome::pending(async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    log.lock().unwrap().push(format!("tail({})", name));
                    Ok(Vec::new())
                }))
            })),
            recorder("sync", log.clone()),
        ]);

        engine.run(&mut sample()).await.unwrap();

        let log = log.lock().unwrap();
        assert_eq!(&log[..2], &["sync(a.js)", "sync(b.js)"]);
        assert_eq!(log.len(), 4);
    }

    #[tokio::test]
    async fn test_rejected_pending_result_fails_run() {
        let mut bundle = sample();
        let engine = TransformEngine::new(vec![
            delayed("ok", 1, "?"),
            shared(plugin_fn("reject", |_, entry| {
                let name = entry.name.clone();
                Ok(PluginOutcome::pending(async move {
                    if name == "b.js" {
                        anyhow::bail!("network down");
                    }
                    Ok(Vec::new())
                }))
            })),
        ]);

        let err = engine.run(&mut bundle).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Plugin 'reject' failed on entry 'b.js': network down"
        );
        // deferred writes from the successful tails were not applied
        assert_eq!(text(&bundle, "a.js"), "const x=1");
    }

    async fn explode() -> anyhow::Result<Vec<EntryWrite>> {
        panic!("bug in plugin")
    }

    #[tokio::test]
    async fn test_panicking_tail_fails_run() {
        let engine = TransformEngine::new(vec![shared(plugin_fn("panics", |_, _| {
            Ok(PluginOutcome::pending(explode()))
        }))]);

        let err = engine.run(&mut sample()).await.unwrap_err();
        assert!(matches!(err, Error::PluginExecution { ref plugin, .. } if plugin == "panics"));
    }

    #[tokio::test]
    async fn test_pending_write_lands_after_later_sync_write() {
        let mut bundle = sample();
        let engine = TransformEngine::new(vec![delayed("slow", 10, "+"), append("sync", ";")]);
        engine.run(&mut bundle).await.unwrap();

        // the tail saw the entry before the sync plugin ran and settles last
        assert_eq!(text(&bundle, "a.js"), "const x=1+");
        assert_eq!(text(&bundle, "b.js"), "const y=2+");
    }

    #[tokio::test]
    async fn test_pending_plugin_sees_earlier_sync_write() {
        let mut bundle = sample();
        let engine = TransformEngine::new(vec![append("sync", ";"), delayed("slow", 10, "+")]);
        engine.run(&mut bundle).await.unwrap();

        assert_eq!(text(&bundle, "a.js"), "const x=1;+");
        assert_eq!(text(&bundle, "b.js"), "const y=2;+");
    }

    #[tokio::test]
    async fn test_repeated_runs_are_deterministic() {
        let run = || async {
            let mut bundle = sample();
            let engine = TransformEngine::new(vec![
                delayed("slow", 10, "+"),
                append("sync", ";"),
                delayed("fast", 1, "-"),
            ]);
            engine.run(&mut bundle).await.unwrap();
            bundle
        };

        let first = run().await;
        assert_eq!(text(&first, "a.js"), "const x=1;-");
        assert_eq!(text(&first, "b.js"), "const y=2;-");
        assert_eq!(first.to_bytes().unwrap(), run().await.to_bytes().unwrap());
    }

    /// A store that lists an entry it cannot produce.
    struct Forgetful {
        inner: Bundle,
    }

    impl EntryStore for Forgetful {
        fn read(&self, name: &str) -> Option<Entry> {
            if name == "gone.js" {
                None
            } else {
                self.inner.read(name)
            }
        }

        fn write(&mut self, name: &str, data: Vec<u8>, mode: Option<u32>) {
            self.inner.write(name, data, mode);
        }

        fn snapshot_names(&self) -> Vec<String> {
            let mut names = self.inner.snapshot_names();
            names.insert(0, "gone.js".to_string());
            names
        }
    }

    #[tokio::test]
    async fn test_unreadable_entry_is_skipped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let engine = TransformEngine::new(vec![recorder("P1", log.clone())]);
        let mut store = Forgetful { inner: sample() };

        let report = engine.run(&mut store).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["P1(a.js)", "P1(b.js)"]);
        assert_eq!(report.entries, 3);
        assert_eq!(report.invocations, 2);
    }
}
