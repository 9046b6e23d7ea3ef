//! Per-session flow-event publishing and time-boxed subscription.
//!
//! Events travel as JSON strings over a [`FlowBus`] channel named
//! `"<prefix>:<session_id>"`. Publishing is best-effort; subscribers see only
//! what is published while they are attached.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use wayfarer_core::config::EventsConfig;
use wayfarer_core::{FlowEvent, FlowStep, SessionId};

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("event bus state lock is poisoned")]
    Poisoned,
    #[error("subscription channel closed")]
    Closed,
    #[error("could not encode flow event: {0}")]
    Encode(#[from] serde_json::Error),
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("event backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait FlowBus: Send + Sync {
    async fn publish(&self, channel: &str, payload: String) -> Result<(), BusError>;

    /// Opens a subscription that does not share the publishing connection.
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn FlowSubscription>, BusError>;
}

#[async_trait]
pub trait FlowSubscription: Send {
    /// Waits up to `wait` for the next payload; `Ok(None)` when idle.
    async fn next_message(&mut self, wait: Duration) -> Result<Option<String>, BusError>;

    /// Releases the channel. Dropping a subscription releases it as well.
    async fn unsubscribe(self: Box<Self>);
}

type ChannelMap = Arc<Mutex<HashMap<String, broadcast::Sender<String>>>>;

/// Process-local bus on tokio broadcast channels.
#[derive(Clone)]
pub struct InMemoryFlowBus {
    channels: ChannelMap,
    capacity: usize,
}

impl Default for InMemoryFlowBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl InMemoryFlowBus {
    pub fn new(capacity: usize) -> Self {
        Self { channels: Arc::new(Mutex::new(HashMap::new())), capacity: capacity.max(1) }
    }

    /// Channels that currently have at least one subscriber.
    pub fn channel_count(&self) -> usize {
        self.channels.lock().map(|channels| channels.len()).unwrap_or_default()
    }
}

#[async_trait]
impl FlowBus for InMemoryFlowBus {
    async fn publish(&self, channel: &str, payload: String) -> Result<(), BusError> {
        let channels = self.channels.lock().map_err(|_| BusError::Poisoned)?;
        if let Some(sender) = channels.get(channel) {
            // A send error only means every receiver is gone.
            let _ = sender.send(payload);
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn FlowSubscription>, BusError> {
        let mut channels = self.channels.lock().map_err(|_| BusError::Poisoned)?;
        let receiver = channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        Ok(Box::new(InMemorySubscription {
            channel: channel.to_string(),
            receiver,
            channels: Arc::clone(&self.channels),
        }))
    }
}

struct InMemorySubscription {
    channel: String,
    receiver: broadcast::Receiver<String>,
    channels: ChannelMap,
}

#[async_trait]
impl FlowSubscription for InMemorySubscription {
    async fn next_message(&mut self, wait: Duration) -> Result<Option<String>, BusError> {
        match tokio::time::timeout(wait, self.receiver.recv()).await {
            Err(_) => Ok(None),
            Ok(Ok(payload)) => Ok(Some(payload)),
            Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                warn!(
                    event_name = "agent.flow_events.lagged",
                    channel = %self.channel,
                    skipped,
                    "subscriber fell behind; events were skipped"
                );
                Ok(None)
            }
            Ok(Err(broadcast::error::RecvError::Closed)) => Err(BusError::Closed),
        }
    }

    async fn unsubscribe(self: Box<Self>) {
        debug!(event_name = "agent.flow_events.unsubscribed", channel = %self.channel);
    }
}

impl Drop for InMemorySubscription {
    fn drop(&mut self) {
        if let Ok(mut channels) = self.channels.lock() {
            let last = channels.get(&self.channel).is_some_and(|sender| sender.receiver_count() <= 1);
            if last {
                channels.remove(&self.channel);
            }
        }
    }
}

#[cfg(feature = "redis")]
pub use self::redis_bus::RedisFlowBus;

#[cfg(feature = "redis")]
mod redis_bus {
    use std::pin::Pin;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::{Stream, StreamExt};
    use redis::aio::MultiplexedConnection;
    use redis::AsyncCommands;
    use tokio::sync::OnceCell;
    use tracing::debug;

    use super::{BusError, FlowBus, FlowSubscription};

    /// Redis pub/sub bus. Each subscription opens its own connection since a
    /// connection in subscribe mode cannot issue ordinary commands.
    pub struct RedisFlowBus {
        client: redis::Client,
        publisher: OnceCell<MultiplexedConnection>,
    }

    impl RedisFlowBus {
        pub fn new(redis_url: &str) -> Result<Self, BusError> {
            Ok(Self { client: redis::Client::open(redis_url)?, publisher: OnceCell::new() })
        }
    }

    #[async_trait]
    impl FlowBus for RedisFlowBus {
        async fn publish(&self, channel: &str, payload: String) -> Result<(), BusError> {
            let mut connection = self
                .publisher
                .get_or_try_init(|| self.client.get_multiplexed_async_connection())
                .await?
                .clone();
            let _receivers: i64 = connection.publish(channel, payload).await?;
            Ok(())
        }

        async fn subscribe(&self, channel: &str) -> Result<Box<dyn FlowSubscription>, BusError> {
            let mut pubsub = self.client.get_async_pubsub().await?;
            pubsub.subscribe(channel).await?;
            Ok(Box::new(RedisSubscription {
                channel: channel.to_string(),
                messages: pubsub.into_on_message().boxed(),
            }))
        }
    }

    struct RedisSubscription {
        channel: String,
        messages: Pin<Box<dyn Stream<Item = redis::Msg> + Send>>,
    }

    #[async_trait]
    impl FlowSubscription for RedisSubscription {
        async fn next_message(&mut self, wait: Duration) -> Result<Option<String>, BusError> {
            match tokio::time::timeout(wait, self.messages.next()).await {
                Err(_) => Ok(None),
                Ok(None) => Err(BusError::Closed),
                Ok(Some(message)) => Ok(Some(message.get_payload::<String>()?)),
            }
        }

        async fn unsubscribe(self: Box<Self>) {
            // Dropping the message stream closes the dedicated connection.
            debug!(event_name = "agent.flow_events.unsubscribed", channel = %self.channel);
        }
    }
}

/// Best-effort publisher used by the turn driver.
#[derive(Clone)]
pub struct FlowEventEmitter {
    bus: Arc<dyn FlowBus>,
    channel_prefix: String,
}

impl FlowEventEmitter {
    pub fn new(bus: Arc<dyn FlowBus>, channel_prefix: impl Into<String>) -> Self {
        Self { bus, channel_prefix: channel_prefix.into() }
    }

    pub fn channel_for(&self, session_id: &SessionId) -> String {
        channel_name(&self.channel_prefix, session_id)
    }

    /// Never fails; publish problems are logged at debug level only.
    pub async fn emit(&self, session_id: &SessionId, event: FlowEvent) {
        let channel = self.channel_for(session_id);
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(error) => {
                debug!(
                    event_name = "agent.flow_events.encode_failed",
                    session_id = %session_id,
                    error = %error,
                    "flow event could not be encoded"
                );
                return;
            }
        };

        debug!(
            event_name = "agent.flow_events.emit",
            session_id = %session_id,
            channel = %channel,
            step = event.step.as_str(),
            "flow event"
        );
        if let Err(error) = self.bus.publish(&channel, payload).await {
            debug!(
                event_name = "agent.flow_events.publish_failed",
                session_id = %session_id,
                error = %error,
                "flow event publish failed (non-critical)"
            );
        }
    }
}

fn channel_name(prefix: &str, session_id: &SessionId) -> String {
    format!("{prefix}:{session_id}")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubscriptionItem {
    KeepAlive,
    Event(String),
}

impl SubscriptionItem {
    /// Server-sent-events framing.
    pub fn to_sse_frame(&self) -> String {
        match self {
            Self::KeepAlive => ": keepalive\n\n".to_string(),
            Self::Event(payload) => format!("data: {payload}\n\n"),
        }
    }
}

fn is_terminal_payload(payload: &str) -> bool {
    serde_json::from_str::<Value>(payload)
        .ok()
        .and_then(|value| value.get("step").and_then(Value::as_str).map(FlowStep::is_terminal_name))
        .unwrap_or(false)
}

/// Opens time-boxed subscription streams.
#[derive(Clone)]
pub struct FlowSubscriber {
    bus: Arc<dyn FlowBus>,
    channel_prefix: String,
    lifetime: Duration,
    poll_interval: Duration,
}

struct SubscriptionState {
    subscription: Option<Box<dyn FlowSubscription>>,
    session_id: SessionId,
    deadline: Instant,
    poll_interval: Duration,
    finished: bool,
}

impl SubscriptionState {
    async fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe().await;
        }
    }
}

impl FlowSubscriber {
    pub fn new(
        bus: Arc<dyn FlowBus>,
        channel_prefix: impl Into<String>,
        lifetime: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self { bus, channel_prefix: channel_prefix.into(), lifetime, poll_interval }
    }

    pub fn from_config(bus: Arc<dyn FlowBus>, config: &EventsConfig) -> Self {
        Self::new(
            bus,
            config.channel_prefix.clone(),
            Duration::from_secs(config.subscribe_timeout_secs),
            Duration::from_millis(config.poll_interval_ms),
        )
    }

    /// Attaches to the session channel and returns the event stream.
    ///
    /// The stream yields a keep-alive on every idle poll, stops right after a
    /// terminal event, and always ends once the lifetime elapses. Dropping the
    /// stream early releases the subscription.
    pub async fn subscribe(
        &self,
        session_id: &SessionId,
    ) -> Result<BoxStream<'static, SubscriptionItem>, BusError> {
        let channel = channel_name(&self.channel_prefix, session_id);
        let subscription = self.bus.subscribe(&channel).await?;
        debug!(
            event_name = "agent.flow_events.subscribed",
            session_id = %session_id,
            channel = %channel,
            "flow subscription opened"
        );

        let state = SubscriptionState {
            subscription: Some(subscription),
            session_id: session_id.clone(),
            deadline: Instant::now() + self.lifetime,
            poll_interval: self.poll_interval,
            finished: false,
        };

        Ok(stream::unfold(state, next_item).boxed())
    }
}

async fn next_item(mut state: SubscriptionState) -> Option<(SubscriptionItem, SubscriptionState)> {
    if state.finished {
        state.close().await;
        return None;
    }

    let remaining = state.deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        info!(
            event_name = "agent.flow_events.subscribe_timeout",
            session_id = %state.session_id,
            "flow subscription reached its deadline"
        );
        state.close().await;
        return None;
    }

    let wait = state.poll_interval.min(remaining);
    let outcome = match state.subscription.as_mut() {
        Some(subscription) => subscription.next_message(wait).await,
        None => return None,
    };

    match outcome {
        Ok(None) => Some((SubscriptionItem::KeepAlive, state)),
        Ok(Some(payload)) => {
            state.finished = is_terminal_payload(&payload);
            Some((SubscriptionItem::Event(payload), state))
        }
        Err(error) => {
            warn!(
                event_name = "agent.flow_events.subscription_failed",
                session_id = %state.session_id,
                error = %error,
                "flow subscription ended early"
            );
            state.close().await;
            None
        }
    }
}
