use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::FutureExt;
use rand::Rng;
use serde_json::Value;

type CleanupHook = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Lifecycle phase of an in-flight request, advanced by the Handler Engine
/// and/or user handlers as the request moves through processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Received,
    Authenticated,
    Authorized,
    Validated,
    Processing,
    Completed,
    Error,
}

/// Options seeding a freshly created [`LocalContext`]; any identifier left
/// `None` is generated.
#[derive(Debug, Clone, Default)]
pub struct LocalContextOptions {
    pub request_id: Option<String>,
    pub trace_id: Option<String>,
    pub client_id: Option<String>,
}

/// A deep, independent copy of a [`LocalContext`]'s restorable fields,
/// taken on demand and restorable back onto the owning context.
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    pub request_id: String,
    pub trace_id: String,
    pub client_id: Option<String>,
    pub timestamp: u128,
    pub state: HashMap<String, Value>,
    pub phase: Phase,
    pub last_hook_index: usize,
    pub outstanding_ops: Vec<String>,
}

/// Per-request scratch space and cleanup lifecycle.
pub struct LocalContext {
    pub request_id: String,
    pub trace_id: String,
    pub client_id: Option<String>,
    pub timestamp: u128,
    state: HashMap<String, Value>,
    phase: Phase,
    cleanup_hooks: Vec<CleanupHook>,
    last_hook_index: usize,
    is_cleaning_up: AtomicBool,
    outstanding_ops: Vec<String>,
}

impl LocalContext {
    pub fn create(options: LocalContextOptions) -> Self {
        let timestamp = now_millis();
        Self {
            request_id: options.request_id.unwrap_or_else(|| generate_request_id(timestamp)),
            trace_id: options.trace_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            client_id: options.client_id,
            timestamp,
            state: HashMap::new(),
            phase: Phase::Received,
            cleanup_hooks: Vec::new(),
            last_hook_index: 0,
            is_cleaning_up: AtomicBool::new(false),
            outstanding_ops: Vec::new(),
        }
    }

    pub fn set_state(&mut self, key: impl Into<String>, value: Value) {
        self.state.insert(key.into(), value);
    }

    pub fn get_state(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn on_cleanup<F, Fut>(&mut self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cleanup_hooks.push(Arc::new(move || {
            Box::pin(hook()) as Pin<Box<dyn Future<Output = ()> + Send>>
        }));
    }

    pub fn is_cleaning_up(&self) -> bool {
        self.is_cleaning_up.load(Ordering::SeqCst)
    }

    pub fn register_outstanding_op(&mut self, id: impl Into<String>) {
        self.outstanding_ops.push(id.into());
    }

    pub fn complete_outstanding_op(&mut self, id: &str) {
        self.outstanding_ops.retain(|op| op != id);
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            request_id: self.request_id.clone(),
            trace_id: self.trace_id.clone(),
            client_id: self.client_id.clone(),
            timestamp: self.timestamp,
            state: self.state.clone(),
            phase: self.phase,
            last_hook_index: self.last_hook_index,
            outstanding_ops: self.outstanding_ops.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: &ContextSnapshot) {
        self.request_id = snapshot.request_id.clone();
        self.trace_id = snapshot.trace_id.clone();
        self.client_id = snapshot.client_id.clone();
        self.timestamp = snapshot.timestamp;
        self.state = snapshot.state.clone();
        self.phase = snapshot.phase;
        self.last_hook_index = snapshot.last_hook_index;
        self.outstanding_ops = snapshot.outstanding_ops.clone();
    }

    /// Runs all cleanup hooks concurrently, isolating failures, then empties
    /// the state map and marks the context as cleaning up. Idempotent only
    /// in the sense that it always sets `isCleaningUp`; hooks are not
    /// re-run if called twice, since they are drained on the first call.
    pub async fn cleanup(&mut self) {
        let hooks = std::mem::take(&mut self.cleanup_hooks);
        self.last_hook_index = hooks.len();
        let futures = hooks.into_iter().map(|hook| async move {
            let result = std::panic::AssertUnwindSafe(hook()).catch_unwind().await;
            if result.is_err() {
                tracing::error!("local context cleanup hook panicked");
            }
        });
        futures::future::join_all(futures).await;
        self.state.clear();
        self.is_cleaning_up.store(true, Ordering::SeqCst);
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

fn generate_request_id(timestamp_millis: u128) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::rng();
    let suffix: String = (0..8)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect();
    format!("req_{timestamp_millis}_{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_request_ids() {
        let a = LocalContext::create(LocalContextOptions::default());
        let b = LocalContext::create(LocalContextOptions::default());
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn request_id_format() {
        let ctx = LocalContext::create(LocalContextOptions::default());
        assert!(ctx.request_id.starts_with("req_"));
    }

    #[tokio::test]
    async fn snapshot_restore_round_trip() {
        let mut ctx = LocalContext::create(LocalContextOptions::default());
        ctx.set_state("k1", Value::String("v1".into()));
        ctx.set_state("k2", Value::from(42));
        ctx.set_phase(Phase::Processing);
        let snap = ctx.snapshot();

        ctx.set_state("k1", Value::String("x".into()));
        ctx.set_phase(Phase::Completed);

        ctx.restore(&snap);
        assert_eq!(ctx.get_state("k1").unwrap(), &Value::String("v1".into()));
        assert_eq!(ctx.get_state("k2").unwrap(), &Value::from(42));
        assert_eq!(ctx.phase(), Phase::Processing);
    }

    #[tokio::test]
    async fn cleanup_empties_state_and_sets_flag() {
        let mut ctx = LocalContext::create(LocalContextOptions::default());
        ctx.set_state("k", Value::from(1));
        ctx.cleanup().await;
        assert!(ctx.get_state("k").is_none());
        assert!(ctx.is_cleaning_up());
    }

    #[tokio::test]
    async fn cleanup_hooks_run_even_on_panic() {
        let mut ctx = LocalContext::create(LocalContextOptions::default());
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = ran.clone();
        ctx.on_cleanup(|| async { panic!("boom") });
        ctx.on_cleanup(move || {
            let ran2 = ran2.clone();
            async move {
                ran2.store(true, Ordering::SeqCst);
            }
        });
        ctx.cleanup().await;
        assert!(ran.load(Ordering::SeqCst));
        assert!(ctx.is_cleaning_up());
    }
}
