use crate::error::{Result, ViewerError};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Line the scraper prints as its last words.
pub const FINISHED_SENTINEL: &str = "脚本已结束";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    Connected,
    Line(String),
    Finished,
}

impl StatusMessage {
    pub fn is_finished(&self) -> bool {
        match self {
            StatusMessage::Finished => true,
            StatusMessage::Line(text) => text.contains(FINISHED_SENTINEL),
            StatusMessage::Connected => false,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            StatusMessage::Connected => "connected",
            StatusMessage::Line(text) => text,
            StatusMessage::Finished => FINISHED_SENTINEL,
        }
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<(u64, Sender<StatusMessage>)>,
}

/// Subscribers to script status. Cloning shares the same registry.
#[derive(Clone, Default)]
pub struct StatusHub {
    registry: Arc<Mutex<Registry>>,
}

impl StatusHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// New subscribers get `Connected` before anything else.
    pub fn subscribe(&self) -> StatusSubscription {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(StatusMessage::Connected);

        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.push((id, tx));
        debug!(id, subscribers = registry.subscribers.len(), "status subscriber added");

        StatusSubscription {
            id,
            rx,
            hub: self.clone(),
            closed: false,
        }
    }

    pub fn unsubscribe(&self, id: u64) {
        let mut registry = self.lock();
        registry.subscribers.retain(|(sub, _)| *sub != id);
        debug!(id, subscribers = registry.subscribers.len(), "status subscriber removed");
    }

    /// Sends to every live subscriber, dropping the ones that went away.
    pub fn broadcast(&self, message: StatusMessage) {
        let mut registry = self.lock();
        registry
            .subscribers
            .retain(|(_, tx)| tx.send(message.clone()).is_ok());
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

/// One listener. Dropping it unsubscribes.
pub struct StatusSubscription {
    id: u64,
    rx: Receiver<StatusMessage>,
    hub: StatusHub,
    closed: bool,
}

impl StatusSubscription {
    /// Next message if one is waiting. After the finish message the stream is
    /// closed and every further call fails.
    pub fn try_next(&mut self) -> Result<Option<StatusMessage>> {
        if self.closed {
            return Err(ViewerError::StatusStreamClosed);
        }
        match self.rx.try_recv() {
            Ok(message) => {
                if message.is_finished() {
                    self.close();
                }
                Ok(Some(message))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                self.close();
                Err(ViewerError::StatusStreamClosed)
            }
        }
    }

    /// Everything currently queued, stopping at the finish message or error.
    pub fn drain(&mut self) -> Result<Vec<StatusMessage>> {
        let mut out = Vec::new();
        while let Some(message) = self.try_next()? {
            let finished = message.is_finished();
            out.push(message);
            if finished {
                break;
            }
        }
        Ok(out)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.hub.unsubscribe(self.id);
        }
    }
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn subscribers_get_connected_then_broadcasts() {
        let hub = StatusHub::new();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        hub.broadcast(StatusMessage::Line("page 1".to_string()));

        for sub in [&mut a, &mut b] {
            assert_eq!(
                sub.drain().unwrap(),
                vec![StatusMessage::Connected, StatusMessage::Line("page 1".to_string())]
            );
        }
    }

    #[test]
    fn dropping_a_subscription_unregisters_it() {
        let hub = StatusHub::new();
        let a = hub.subscribe();
        let _b = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);
        drop(a);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn finish_closes_the_stream() {
        let hub = StatusHub::new();
        let mut sub = hub.subscribe();
        hub.broadcast(StatusMessage::Line(format!("done: {FINISHED_SENTINEL}")));
        hub.broadcast(StatusMessage::Line("late".to_string()));

        let got = sub.drain().unwrap();
        assert_eq!(got.len(), 2);
        assert!(got[1].is_finished());
        assert!(sub.is_closed());
        assert_eq!(hub.subscriber_count(), 0);
        assert!(matches!(sub.try_next(), Err(ViewerError::StatusStreamClosed)));
    }

    #[test]
    fn dead_receivers_are_pruned_on_broadcast() {
        let hub = StatusHub::new();
        let (tx, rx) = mpsc::channel();
        hub.lock().subscribers.push((99, tx));
        drop(rx);

        hub.broadcast(StatusMessage::Finished);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
