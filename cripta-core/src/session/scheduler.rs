//! Named single-shot timers on the tokio runtime.
//!
//! At most one task is live per name. Scheduling a name again aborts the
//! pending task, and a task that was superseded never runs its callback
//! even if it already woke up.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Slots {
    next_generation: u64,
    pending: HashMap<&'static str, Pending>,
}

pub struct TaskScheduler {
    runtime: Option<Handle>,
    slots: Arc<Mutex<Slots>>,
}

impl TaskScheduler {
    /// Bind to the tokio runtime of the calling context. Outside a runtime
    /// the scheduler is inert and every `schedule` call is dropped.
    pub fn new() -> Self {
        let runtime = Handle::try_current().ok();
        if runtime.is_none() {
            warn!("No tokio runtime; session timers are disabled");
        }
        Self {
            runtime,
            slots: Arc::new(Mutex::new(Slots::default())),
        }
    }

    /// Run `task` once after `delay`, replacing any pending task named `name`.
    pub fn schedule<F>(&self, name: &'static str, delay: Duration, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(runtime) = &self.runtime else {
            return;
        };

        // Held across spawn so the new task cannot observe a stale slot
        let mut slots = self.slots.lock();
        slots.next_generation += 1;
        let generation = slots.next_generation;

        let shared = Arc::clone(&self.slots);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            let current = {
                let mut slots = shared.lock();
                match slots.pending.get(name) {
                    Some(p) if p.generation == generation => {
                        slots.pending.remove(name);
                        true
                    }
                    _ => false,
                }
            };

            if current {
                debug!("Timer '{}' fired", name);
                task();
            }
        });

        if let Some(previous) = slots.pending.insert(name, Pending { generation, handle }) {
            previous.handle.abort();
        }
    }

    pub fn cancel(&self, name: &str) {
        if let Some(p) = self.slots.lock().pending.remove(name) {
            p.handle.abort();
        }
    }

    pub fn cancel_all(&self) {
        let drained: Vec<Pending> = self.slots.lock().pending.drain().map(|(_, p)| p).collect();
        for p in drained {
            p.handle.abort();
        }
    }

    pub fn is_scheduled(&self, name: &str) -> bool {
        self.slots.lock().pending.contains_key(name)
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_delay() {
        let scheduler = TaskScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        scheduler.schedule("t", Duration::from_secs(5), move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert!(scheduler.is_scheduled("t"));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_scheduled("t"));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_pending() {
        let scheduler = TaskScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let h = Arc::clone(&hits);
            scheduler.schedule("t", Duration::from_secs(5), move || {
                h.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_secs(3)).await;
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let scheduler = TaskScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));

        for name in ["a", "b"] {
            let h = Arc::clone(&hits);
            scheduler.schedule(name, Duration::from_secs(1), move || {
                h.fetch_add(1, Ordering::SeqCst);
            });
        }
        scheduler.cancel("a");
        assert!(!scheduler.is_scheduled("a"));
        assert!(scheduler.is_scheduled("b"));

        scheduler.cancel_all();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_inert_without_runtime() {
        let scheduler = TaskScheduler::new();
        scheduler.schedule("t", Duration::from_secs(1), || {});
        assert!(!scheduler.is_scheduled("t"));
    }
}
