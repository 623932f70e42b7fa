use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use pipedag::action::{ExecutionContext, ExecutionError, TaskAction};

/// A fake action that:
/// - records how many times it was invoked (and optionally in which order,
///   via a shared log)
/// - plays back a queue of scripted outcomes, then falls back to a default.
#[derive(Debug)]
pub struct ScriptedAction {
    name: String,
    queued: Mutex<VecDeque<Result<(), ExecutionError>>>,
    default: Result<(), ExecutionError>,
    invocations: Arc<AtomicU32>,
    log: Option<Arc<Mutex<Vec<String>>>>,
}

impl ScriptedAction {
    /// Succeeds on every invocation.
    pub fn succeeding(name: &str) -> Self {
        Self {
            name: name.to_string(),
            queued: Mutex::new(VecDeque::new()),
            default: Ok(()),
            invocations: Arc::new(AtomicU32::new(0)),
            log: None,
        }
    }

    /// Fails with `error` on every invocation.
    pub fn always_failing(name: &str, error: ExecutionError) -> Self {
        Self {
            default: Err(error),
            ..Self::succeeding(name)
        }
    }

    /// Fails `times` times with `error`, then succeeds.
    pub fn failing_then_succeeding(name: &str, times: u32, error: ExecutionError) -> Self {
        let action = Self::succeeding(name);
        {
            let mut queued = action.queued.lock().unwrap();
            for _ in 0..times {
                queued.push_back(Err(error.clone()));
            }
        }
        action
    }

    /// Record each invocation's task name into a shared log.
    pub fn with_log(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.log = Some(log);
        self
    }

    /// Handle to the invocation counter.
    pub fn invocation_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.invocations)
    }

    pub fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }
}

impl TaskAction for ScriptedAction {
    fn run<'a>(
        &'a self,
        _ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExecutionError>> + Send + 'a>> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.lock().unwrap().push(self.name.clone());
        }

        let outcome = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());

        Box::pin(async move { outcome })
    }
}

/// Tracks how many instances run concurrently, holding each invocation open
/// for `hold` so overlaps are observable.
#[derive(Debug)]
pub struct GaugeAction {
    current: Arc<AtomicUsize>,
    max_seen: Arc<AtomicUsize>,
    hold: Duration,
}

impl GaugeAction {
    pub fn new(current: Arc<AtomicUsize>, max_seen: Arc<AtomicUsize>, hold: Duration) -> Self {
        Self {
            current,
            max_seen,
            hold,
        }
    }
}

impl TaskAction for GaugeAction {
    fn run<'a>(
        &'a self,
        _ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExecutionError>> + Send + 'a>> {
        Box::pin(async move {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.hold).await;

            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Notifies `started`, then blocks until the run is cancelled.
///
/// Used by cancellation tests: the test waits for `started`, cancels the
/// engine, and the action observes the token cooperatively.
#[derive(Debug)]
pub struct WaitForCancelAction {
    started: Arc<Notify>,
}

impl WaitForCancelAction {
    pub fn new(started: Arc<Notify>) -> Self {
        Self { started }
    }
}

impl TaskAction for WaitForCancelAction {
    fn run<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExecutionError>> + Send + 'a>> {
        Box::pin(async move {
            self.started.notify_one();
            ctx.cancel_token().cancelled().await;
            Err(ExecutionError::Fatal("cancelled".to_string()))
        })
    }
}
