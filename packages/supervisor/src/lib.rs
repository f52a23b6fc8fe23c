//! A restartable long-lived worker: `start`, `is_alive`, `kill`, `restart`.
//!
//! `restart` always respawns the same target closure, matching the
//! original's `RestartableDaemonProcess`, which keeps `target`/`args`/`kwargs`
//! fixed at construction and only ever swaps the underlying process handle.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send>>;
type Factory = Arc<dyn Fn() -> BoxedTask + Send + Sync>;

struct State {
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

/// Owns a single child task and can kill/respawn it. Each `start`/`restart`
/// bumps `generation`, so callers can detect a restart without relying on
/// `JoinHandle` identity (which tokio doesn't guarantee is distinguishable).
pub struct SupervisedWorker {
    factory: Factory,
    state: Mutex<State>,
}

impl SupervisedWorker {
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        SupervisedWorker {
            factory: Arc::new(move || Box::pin(factory()) as BoxedTask),
            state: Mutex::new(State { handle: None, generation: 0 }),
        }
    }

    /// Spawns the worker if not already running. Returns the generation of
    /// the task now running.
    pub async fn start(&self) -> u64 {
        let mut state = self.state.lock().await;
        if let Some(handle) = &state.handle {
            if !handle.is_finished() {
                return state.generation;
            }
        }
        state.generation += 1;
        state.handle = Some(tokio::spawn((self.factory)()));
        info!(generation = state.generation, "worker started");
        state.generation
    }

    pub async fn is_alive(&self) -> bool {
        let state = self.state.lock().await;
        matches!(&state.handle, Some(h) if !h.is_finished())
    }

    /// Aborts the running task, if any. Idempotent.
    pub async fn kill(&self) {
        let mut state = self.state.lock().await;
        if let Some(handle) = state.handle.take() {
            handle.abort();
            info!(generation = state.generation, "worker killed");
        }
    }

    /// Kills the current task (if alive) and spawns a fresh one with the
    /// same target. Returns the new generation, which is always strictly
    /// greater than the one that was running before.
    pub async fn restart(&self) -> u64 {
        self.kill().await;
        self.start().await
    }

    pub async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }
}
