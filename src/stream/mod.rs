//! Stream client: re-emits bus events to local listeners
//!
//! A [`StreamClient`] wraps a [`Client`] and owns a relay task that reads the
//! client's event bus. Every event whose kind passes the [`ForwardPolicy`] is
//! handed, unchanged, to the listeners registered with [`StreamClient::on`].

mod listeners;
mod policy;

use std::collections::VecDeque;
use std::sync::{Arc, RwLock as StdRwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::client::Client;
use crate::error::{relay_stopped, RelayResult};
use crate::events::{BusEvent, EventKind, EventPayload, Subscriber, TrackEvent};
use crate::flow::TraceContext;

pub use listeners::{Callback, DispatchOutcome, ListenerId, ListenerRegistry};
pub use policy::ForwardPolicy;

/// Number of completed traces kept per stream client
pub const TRACE_HISTORY: usize = 64;

/// Counters for relay activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStats {
    /// Events handed to at least one listener
    pub forwarded: u64,
    /// Events whose kind the policy does not forward
    pub filtered: u64,
    /// Forwardable events that arrived with no listener registered
    pub unhandled: u64,
    /// Listener invocations that failed
    pub listener_errors: u64,
    /// Events skipped because the relay fell behind the bus
    pub lagged: u64,
}

/// State shared between the handle and the relay task
struct RelayShared {
    host: String,
    listeners: ListenerRegistry,
    policy: StdRwLock<ForwardPolicy>,
    stats: RwLock<RelayStats>,
    traces: Mutex<VecDeque<TraceContext>>,
}

impl RelayShared {
    fn policy(&self) -> ForwardPolicy {
        match self.policy.read() {
            Ok(policy) => policy.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    async fn relay(&self, mut event: BusEvent) {
        let kind = event.kind();

        if !self.policy().forwards(kind) {
            trace!(host = %self.host, kind = %kind, "Event kind not forwarded");
            self.stats.write().await.filtered += 1;
            return;
        }

        let listeners = self.listeners.count(kind);
        if listeners == 0 {
            debug!(host = %self.host, kind = %kind, "No listeners for forwarded event");
            self.stats.write().await.unhandled += 1;
            return;
        }

        if let Some(trace_context) = event.trace.as_mut() {
            trace_context
                .add_span("relay", "StreamClient")
                .context(Some(serde_json::json!({ "listeners": listeners })));
        }

        let outcome = self.listeners.dispatch(&event.payload);
        trace!(
            host = %self.host,
            kind = %kind,
            invoked = outcome.invoked,
            failed = outcome.failed,
            "Forwarded event"
        );

        {
            let mut stats = self.stats.write().await;
            stats.forwarded += 1;
            stats.listener_errors += outcome.failed as u64;
        }

        if let Some(mut trace_context) = event.trace.take() {
            trace_context.complete();
            let mut traces = self.traces.lock().await;
            if traces.len() >= TRACE_HISTORY {
                traces.pop_front();
            }
            traces.push_back(trace_context);
        }
    }
}

/// Relays selected bus events to locally registered listeners
pub struct StreamClient {
    client: Arc<Client>,
    shared: Arc<RelayShared>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    relay_task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamClient {
    /// Wrap `client`, forwarding the kinds named in its configuration.
    ///
    /// The bus subscription is taken before this returns, so every event
    /// published afterwards reaches the relay. Must be called inside a tokio
    /// runtime.
    pub fn new(client: Arc<Client>) -> Self {
        let policy = client.config().forward_policy().unwrap_or_default();
        Self::with_policy(client, policy)
    }

    #[instrument(skip(client), fields(host = %client.host()), level = "debug")]
    pub fn with_policy(client: Arc<Client>, policy: ForwardPolicy) -> Self {
        let shared = Arc::new(RelayShared {
            host: client.host().to_string(),
            listeners: ListenerRegistry::new(),
            policy: StdRwLock::new(policy),
            stats: RwLock::new(RelayStats::default()),
            traces: Mutex::new(VecDeque::new()),
        });

        let subscriber = client.bus().subscribe();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run_relay(subscriber, Arc::clone(&shared), shutdown_rx));

        info!(host = %client.host(), policy = %shared.policy(), "Stream client started");

        Self {
            client,
            shared,
            shutdown: Mutex::new(Some(shutdown_tx)),
            relay_task: Mutex::new(Some(handle)),
        }
    }

    /// The wrapped client
    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }

    /// Register a listener for `kind`
    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&EventPayload) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        if !self.shared.policy().forwards(kind) {
            warn!(
                host = %self.shared.host,
                kind = %kind,
                "Registered listener for an event kind that is not forwarded"
            );
        }
        self.shared.listeners.register(kind, Arc::new(callback), false)
    }

    /// Register a listener that receives the track of every `track` event
    pub fn on_track<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&TrackEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on(EventKind::Track, move |payload| match payload.as_track() {
            Some(track) => callback(track),
            None => Ok(()),
        })
    }

    /// Resolve with the next forwarded payload of `kind`
    pub fn once(&self, kind: EventKind) -> oneshot::Receiver<EventPayload> {
        if !self.shared.policy().forwards(kind) {
            warn!(
                host = %self.shared.host,
                kind = %kind,
                "Waiting once for an event kind that is not forwarded"
            );
        }
        let (tx, rx) = oneshot::channel();
        let slot = std::sync::Mutex::new(Some(tx));

        let callback: Callback = Arc::new(move |payload: &EventPayload| -> anyhow::Result<()> {
            let sender = match slot.lock() {
                Ok(mut guard) => guard.take(),
                Err(poisoned) => poisoned.into_inner().take(),
            };
            if let Some(sender) = sender {
                let _ = sender.send(payload.clone());
            }
            Ok(())
        });

        self.shared.listeners.register(kind, callback, true);
        rx
    }

    /// Remove a listener
    pub fn off(&self, id: ListenerId) -> bool {
        self.shared.listeners.unregister(id)
    }

    /// Remove every listener for `kind`
    pub fn remove_all(&self, kind: EventKind) -> usize {
        self.shared.listeners.clear(kind)
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.shared.listeners.count(kind)
    }

    /// Current forward policy
    pub fn policy(&self) -> ForwardPolicy {
        self.shared.policy()
    }

    /// Replace the forward policy; applies to events relayed afterwards
    pub fn set_policy(&self, policy: ForwardPolicy) {
        info!(host = %self.shared.host, policy = %policy, "Updating forward policy");
        match self.shared.policy.write() {
            Ok(mut guard) => *guard = policy,
            Err(poisoned) => *poisoned.into_inner() = policy,
        }
    }

    pub async fn stats(&self) -> RelayStats {
        self.shared.stats.read().await.clone()
    }

    /// Completed traces of recently relayed events, oldest first
    pub async fn recent_traces(&self) -> Vec<TraceContext> {
        self.shared.traces.lock().await.iter().cloned().collect()
    }

    pub async fn is_running(&self) -> bool {
        self.relay_task
            .lock()
            .await
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Stop the relay task and wait for it to finish
    #[instrument(skip(self), fields(host = %self.shared.host), level = "debug")]
    pub async fn shutdown(&self) -> RelayResult<()> {
        let sender = self
            .shutdown
            .lock()
            .await
            .take()
            .ok_or_else(|| relay_stopped(self.shared.host.as_str()))?;
        let _ = sender.send(());

        if let Some(handle) = self.relay_task.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(host = %self.shared.host, error = %e, "Relay task ended abnormally");
            }
        }

        info!(host = %self.shared.host, "Stream client stopped");
        Ok(())
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        if let Some(handle) = self.relay_task.get_mut().take() {
            handle.abort();
        }
    }
}

async fn run_relay(
    mut subscriber: Subscriber<BusEvent>,
    shared: Arc<RelayShared>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!(host = %shared.host, "Relay task started");

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown_rx => {
                debug!(host = %shared.host, "Relay received shutdown signal");
                break;
            }

            received = subscriber.recv() => match received {
                Ok(event) => shared.relay(event).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(host = %shared.host, skipped, "Relay lagged behind event bus");
                    shared.stats.write().await.lagged += skipped;
                }
                Err(RecvError::Closed) => {
                    debug!(host = %shared.host, "Event bus closed");
                    break;
                }
            }
        }
    }

    debug!(host = %shared.host, "Relay task stopped");
}
