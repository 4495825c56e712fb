use super::{DeliveryError, FeedMessage, Subscriber};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Forwards feed messages into an mpsc channel. Backs the streaming
/// endpoint: the receiver half becomes the response body.
#[derive(Debug, Clone)]
pub struct ChannelSubscriber {
    sender: mpsc::Sender<Arc<FeedMessage>>,
}

impl ChannelSubscriber {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Arc<FeedMessage>>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Subscriber for ChannelSubscriber {
    async fn deliver(&self, message: Arc<FeedMessage>) -> Result<(), DeliveryError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| DeliveryError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::EventBroadcaster;
    use crate::domain::MatchId;

    #[tokio::test]
    async fn test_dropped_receiver_ends_subscription() {
        let b = EventBroadcaster::default();
        let id = MatchId::new();
        b.open(id);
        let (sub, rx) = ChannelSubscriber::new(4);
        b.subscribe(id, Arc::new(sub)).unwrap();
        drop(rx);

        let state = crate::test_support::sample_state(id);
        b.publish(FeedMessage::snapshot(&state));
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert_eq!(b.subscriber_count(id), 0);
    }
}
