use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, trace};

/// Generic broadcast stream with a bounded replay buffer
pub struct EventStream<T: Clone + Send + 'static> {
    sender: broadcast::Sender<T>,
    buffer: Arc<RwLock<VecDeque<T>>>,
    buffer_size: usize,
}

impl<T: Clone + Send + 'static> EventStream<T> {
    /// Create a new event stream with specified capacity
    pub fn new(capacity: usize, buffer_size: usize) -> Self {
        info!(capacity, buffer_size, "Creating new event stream");
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            buffer: Arc::new(RwLock::new(VecDeque::with_capacity(buffer_size))),
            buffer_size,
        }
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> Subscriber<T> {
        debug!("New subscriber registered to event stream");
        Subscriber {
            receiver: self.sender.subscribe(),
            buffer: Arc::clone(&self.buffer),
        }
    }

    /// Send an event to all current receivers and record it for replay.
    ///
    /// Returns the number of receivers, `0` when nobody is listening.
    pub async fn publish(&self, event: T) -> usize {
        self.buffer_event(event.clone()).await;

        match self.sender.send(event) {
            Ok(receivers) => {
                trace!(receivers, "Event sent to stream");
                receivers
            }
            Err(_) => {
                debug!("No receivers for event, message buffered");
                0
            }
        }
    }

    async fn buffer_event(&self, event: T) {
        if self.buffer_size == 0 {
            return;
        }

        let mut buffer = self.buffer.write().await;
        buffer.push_back(event);
        while buffer.len() > self.buffer_size {
            buffer.pop_front();
        }
    }

    /// Snapshot of the replay buffer, oldest first
    pub async fn replay(&self) -> Vec<T> {
        self.buffer.read().await.iter().cloned().collect()
    }

    /// Size of the replay buffer
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone + Send + 'static> Clone for EventStream<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            buffer: Arc::clone(&self.buffer),
            buffer_size: self.buffer_size,
        }
    }
}

/// Subscriber for receiving events from a stream
pub struct Subscriber<T: Clone + Send + 'static> {
    receiver: broadcast::Receiver<T>,
    buffer: Arc<RwLock<VecDeque<T>>>,
}

impl<T: Clone + Send + 'static> Subscriber<T> {
    /// Receive the next event
    pub async fn recv(&mut self) -> Result<T, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Receive without waiting
    pub fn try_recv(&mut self) -> Result<T, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Events published before this subscriber existed
    pub async fn replay_buffer(&self) -> Vec<T> {
        self.buffer.read().await.iter().cloned().collect()
    }
}
