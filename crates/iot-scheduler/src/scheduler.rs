//! The task scheduler: one-shot and recurring fire registration, keyed by
//! task id, with a per-timezone cron-instance cache so each distinct zone
//! name is parsed only once.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::BoxFuture;
use iot_domain::cron::{cron_next_tz, parse_tz};
use iot_domain::error::{Error, Result};
use iot_domain::scheduler_spec::{Frequency, SchedulerSpec};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// A task's fire action: re-invoked on every recurring tick, or once for a
/// one-shot timer.
pub type TaskFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

struct Handle {
    join: JoinHandle<()>,
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.join.abort();
    }
}

#[derive(Default)]
pub struct Scheduler {
    tz_cache: Mutex<HashMap<String, chrono_tz::Tz>>,
    entries: Mutex<HashMap<Uuid, Handle>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve_tz(&self, name: &str) -> Result<chrono_tz::Tz> {
        let mut cache = self.tz_cache.lock();
        if let Some(tz) = cache.get(name) {
            return Ok(*tz);
        }
        let tz = parse_tz(name)
            .ok_or_else(|| Error::Validation(format!("unknown time zone: {name}")))?;
        cache.insert(name.to_string(), tz);
        Ok(tz)
    }

    /// Register a recurring task. At most one live entry exists per
    /// `task_id` — any previous entry for the same id is replaced.
    pub fn schedule_recurring(&self, task_id: Uuid, spec: &SchedulerSpec, f: TaskFn) -> Result<()> {
        self.unschedule(task_id);

        let tz = self.resolve_tz(&spec.time_zone)?;
        let cron = spec
            .to_cron()
            .ok_or_else(|| Error::Validation("spec has no cron representation".into()))?;

        let join = tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let Some(next) = cron_next_tz(&cron, &now, tz) else {
                    tracing::warn!(task_id = %task_id, "cron has no future occurrence; stopping");
                    return;
                };
                let delay = (next - Utc::now())
                    .to_std()
                    .unwrap_or(std::time::Duration::from_secs(0));
                tokio::time::sleep(delay).await;
                f().await;
            }
        });

        self.entries.lock().insert(task_id, Handle { join });
        Ok(())
    }

    /// Arm a one-shot timer. Runs `f` once after `spec.date_time` elapses,
    /// then drops its own entry.
    pub fn schedule_one_shot(&self, task_id: Uuid, spec: &SchedulerSpec, f: TaskFn) -> Result<()> {
        self.unschedule(task_id);

        if spec.frequency != Frequency::Once {
            return Err(Error::Validation(
                "schedule_one_shot requires frequency=once".into(),
            ));
        }
        let date_time = spec
            .date_time
            .ok_or_else(|| Error::Validation("once requires date_time".into()))?;
        let delay = (date_time - Utc::now())
            .to_std()
            .map_err(|_| Error::Validation("date_time is not in the future".into()))?;

        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            f().await;
        });

        self.entries.lock().insert(task_id, Handle { join });
        Ok(())
    }

    /// Remove any live entry for `task_id`. Idempotent.
    pub fn unschedule(&self, task_id: Uuid) -> bool {
        self.entries.lock().remove(&task_id).is_some()
    }

    pub fn is_scheduled(&self, task_id: Uuid) -> bool {
        self.entries.lock().contains_key(&task_id)
    }

    /// Stop every live entry.
    pub fn stop(&self) {
        self.entries.lock().clear();
    }
}

/// Helper to box an async closure body into the `TaskFn` shape.
pub fn task_fn<F, Fut>(f: F) -> TaskFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move || -> BoxFuture<'static, ()> {
        Box::pin(f()) as Pin<Box<dyn Future<Output = ()> + Send>>
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn one_shot_fires_once() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let spec = SchedulerSpec {
            time_zone: "UTC".into(),
            frequency: Frequency::Once,
            date_time: Some(Utc::now() + chrono::Duration::seconds(5)),
            week: None,
            day_time: None,
            hour: None,
            minute: None,
        };

        scheduler
            .schedule_one_shot(
                Uuid::new_v4(),
                &spec,
                task_fn(move || {
                    let c = c.clone();
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                    }
                }),
            )
            .unwrap();

        // Let the spawned task register its timer before advancing, since
        // the sleep deadline is computed relative to first poll.
        tokio::task::yield_now().await;
        tokio::time::advance(std::time::Duration::from_secs(6)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unschedule_is_idempotent() {
        let scheduler = Scheduler::new();
        let id = Uuid::new_v4();
        assert!(!scheduler.unschedule(id));
        assert!(!scheduler.unschedule(id));
    }
}
