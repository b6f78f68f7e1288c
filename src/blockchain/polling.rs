use crate::models::Naming;
use crate::services::Services;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

struct TaskEntry {
    last_run: Option<Instant>,
    running: Arc<AtomicBool>,
}

/// Marks a task as running until dropped.
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Registry of named periodic tasks. A task is due when its interval has
/// elapsed since its last start and it is not running; tasks are created
/// on first sight, so new networks are picked up on the next tick.
#[derive(Default)]
pub struct Scheduler {
    tasks: Mutex<HashMap<String, TaskEntry>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a run of `id` if it is due. `None` while a previous run of the
    /// same id is still in flight or the interval has not elapsed.
    pub fn try_start(&self, id: &str, every: Duration) -> Option<RunGuard> {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let entry = tasks.entry(id.to_string()).or_insert_with(|| TaskEntry {
            last_run: None,
            running: Arc::new(AtomicBool::new(false)),
        });

        if entry.running.load(Ordering::Acquire) {
            debug!("Task {} still running, skipping", id);
            return None;
        }
        let now = Instant::now();
        if entry.last_run.is_some_and(|last| now.duration_since(last) < every) {
            return None;
        }

        entry.last_run = Some(now);
        entry.running.store(true, Ordering::Release);
        Some(RunGuard {
            running: entry.running.clone(),
        })
    }

    pub fn task_ids(&self) -> Vec<String> {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = tasks.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Spawn `task` when `id` is due; the run guard lives as long as the task.
    pub fn spawn_if_due<F>(&self, id: &str, every: Duration, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.try_start(id, every) {
            Some(guard) => {
                tokio::spawn(async move {
                    let _guard = guard;
                    task.await;
                });
                true
            }
            None => false,
        }
    }
}

/// Dispatch every due task once.
pub async fn run_due(scheduler: &Scheduler, services: &Arc<Services>) {
    let config = &services.state.config;

    for network in services.network.get_networks().await {
        let id = format!("balances_on_{}", network.id);
        let services = services.clone();
        scheduler.spawn_if_due(&id, config.balance_task_interval, async move {
            if let Err(e) = services.balance.check_next_network(&network.id).await {
                error!("Balance task for {} failed: {}", network.id, e);
            }
        });
    }

    for naming in Naming::ALL {
        let id = format!("names_on_{}", naming);
        let services = services.clone();
        scheduler.spawn_if_due(&id, config.naming_task_interval, async move {
            if let Err(e) = services.naming.check_next_naming(naming).await {
                error!("Naming task for {} failed: {}", naming, e);
            }
        });
    }

    let bot = services.bot.clone();
    scheduler.spawn_if_due("update_proxies", config.proxies_task_interval, async move {
        if let Err(e) = bot.update_proxies().await {
            error!("Proxy refresh failed, keeping previous pool: {}", e);
        }
    });

    let bot = services.bot.clone();
    scheduler.spawn_if_due("update_node_checker", config.node_checker_task_interval, async move {
        if let Err(e) = bot.update_node_checker().await {
            error!("Node checker refresh failed: {}", e);
        }
    });

    let bot = services.bot.clone();
    scheduler.spawn_if_due("expire_rpc_monitoring", config.monitoring_cleanup_interval, async move {
        if let Err(e) = bot.expire_rpc_monitoring().await {
            error!("Rpc monitoring cleanup failed: {}", e);
        }
    });
}

pub async fn start_polling(services: Arc<Services>, shutdown: CancellationToken) {
    info!("Starting scheduler");
    let scheduler = Scheduler::new();
    let mut ticker = interval(services.state.config.scheduler_tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_due(&scheduler, &services).await;
            }
            _ = shutdown.cancelled() => {
                info!("Shutting down scheduler");
                break;
            }
        }
    }
}
