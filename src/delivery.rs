/*!
 * Outbound delivery channels
 * Named in-process queues standing in for the message broker, and HTTP callbacks
 */

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Messages held per queue before the oldest is dropped
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Where a response is delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Destination {
    /// Named outbound queue
    Queue(String),
    /// URL receiving the payload as a JSON POST
    Callback(String),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Queue(name) => write!(f, "queue:{name}"),
            Destination::Callback(url) => write!(f, "callback:{url}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The queue was never declared, i.e. there is no connection for it
    #[error("Queue connection not found: {0}")]
    QueueNotFound(String),

    #[error("Callback to {url} failed: {reason}")]
    Callback { url: String, reason: String },
}

#[async_trait]
pub trait Outbound: Send + Sync {
    async fn send(&self, destination: &Destination, payload: &Value) -> Result<(), DeliveryError>;
}

/// Named FIFO queues. Only declared queues accept messages.
///
/// A full queue drops its oldest message to make room.
pub struct MemoryQueues {
    queues: DashMap<String, VecDeque<Value>>,
    capacity: usize,
}

impl Default for MemoryQueues {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl MemoryQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queues: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Declare a queue; declaring an existing queue keeps its messages.
    pub fn declare(&self, name: &str) {
        self.queues.entry(name.to_string()).or_default();
    }

    pub fn push(&self, name: &str, payload: Value) -> Result<(), DeliveryError> {
        let mut queue = self
            .queues
            .get_mut(name)
            .ok_or_else(|| DeliveryError::QueueNotFound(name.to_string()))?;
        if queue.len() >= self.capacity {
            queue.pop_front();
            warn!(queue = name, capacity = self.capacity, "Queue full, dropped oldest message");
        }
        queue.push_back(payload);
        Ok(())
    }

    /// Remove and return every pending message, oldest first.
    pub fn drain(&self, name: &str) -> Option<Vec<Value>> {
        self.queues
            .get_mut(name)
            .map(|mut queue| queue.drain(..).collect())
    }

    pub fn len(&self, name: &str) -> usize {
        self.queues.get(name).map_or(0, |queue| queue.len())
    }
}

/// Routes payloads to memory queues or HTTP callbacks
pub struct Dispatcher {
    queues: Arc<MemoryQueues>,
    http: reqwest::Client,
}

impl Dispatcher {
    /// Callbacks that take longer than `timeout` count as failed.
    pub fn new(queues: Arc<MemoryQueues>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { queues, http })
    }
}

#[async_trait]
impl Outbound for Dispatcher {
    async fn send(&self, destination: &Destination, payload: &Value) -> Result<(), DeliveryError> {
        match destination {
            Destination::Queue(name) => self.queues.push(name, payload.clone()),
            Destination::Callback(url) => {
                let callback_error = |reason: String| DeliveryError::Callback {
                    url: url.clone(),
                    reason,
                };

                self.http
                    .post(url)
                    .json(payload)
                    .send()
                    .await
                    .map_err(|e| callback_error(e.to_string()))?
                    .error_for_status()
                    .map_err(|e| callback_error(e.to_string()))?;
                Ok(())
            }
        }
    }
}
