use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{DeleteError, TransportError};
use crate::types::{DisplayDocument, MessageId};

/// Sends and deletes messages in the leaderboard channel.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn send(&self, document: &DisplayDocument) -> Result<MessageId, TransportError>;

    async fn delete(&self, id: MessageId) -> Result<(), DeleteError>;
}

/// Keeps exactly one leaderboard message in the channel.
///
/// Each `publish` removes the previously sent message (best effort) and posts
/// the new one. The handle of the last sent message lives only in memory.
pub struct Publisher<T> {
    transport: T,
    last_message: Mutex<Option<MessageId>>,
}

impl<T: ChannelTransport> Publisher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            last_message: Mutex::new(None),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Id of the message currently tracked as the live leaderboard.
    pub async fn last_message(&self) -> Option<MessageId> {
        *self.last_message.lock().await
    }

    /// Replace the tracked message with `document`.
    ///
    /// Cleanup never blocks publishing: a missing previous message clears the
    /// handle, any other delete failure is logged and ignored. A send failure
    /// is returned without retrying.
    pub async fn publish(&self, document: &DisplayDocument) -> Result<MessageId, TransportError> {
        // Held across delete + send so overlapping publishes cannot interleave.
        let mut last = self.last_message.lock().await;

        if let Some(previous) = *last {
            match self.transport.delete(previous).await {
                Ok(()) => info!("Previous leaderboard message {previous} deleted"),
                Err(DeleteError::NotFound) => {
                    info!(
                        "Previous leaderboard message {previous} no longer exists, clearing handle"
                    );
                    *last = None;
                }
                Err(e) => warn!("Failed to delete previous leaderboard message {previous}: {e}"),
            }
        }

        let id = self.transport.send(document).await?;
        *last = Some(id);
        info!("Leaderboard message sent with id {id}");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Send,
        Delete(MessageId),
    }

    /// In-memory transport with scripted outcomes.
    #[derive(Default)]
    struct FakeTransport {
        calls: StdMutex<Vec<Call>>,
        next_id: StdMutex<u64>,
        delete_results: StdMutex<VecDeque<Result<(), DeleteError>>>,
        send_results: StdMutex<VecDeque<Result<(), TransportError>>>,
    }

    impl FakeTransport {
        fn script_delete(&self, result: Result<(), DeleteError>) {
            self.delete_results.lock().unwrap().push_back(result);
        }

        fn script_send(&self, result: Result<(), TransportError>) {
            self.send_results.lock().unwrap().push_back(result);
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChannelTransport for FakeTransport {
        async fn send(&self, _document: &DisplayDocument) -> Result<MessageId, TransportError> {
            self.calls.lock().unwrap().push(Call::Send);
            if let Some(Err(e)) = self.send_results.lock().unwrap().pop_front() {
                return Err(e);
            }
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            Ok(MessageId(*next))
        }

        async fn delete(&self, id: MessageId) -> Result<(), DeleteError> {
            self.calls.lock().unwrap().push(Call::Delete(id));
            self.delete_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()))
        }
    }

    fn doc() -> DisplayDocument {
        DisplayDocument {
            title: "t".to_string(),
            description: "d".to_string(),
            fields: Vec::new(),
            colour: 0,
            timestamp: Utc::now(),
            footer: "f".to_string(),
            footer_icon_url: None,
        }
    }

    #[tokio::test]
    async fn first_publish_sends_without_delete() {
        let publisher = Publisher::new(FakeTransport::default());
        let id = publisher.publish(&doc()).await.unwrap();
        assert_eq!(id, MessageId(1));
        assert_eq!(publisher.last_message().await, Some(MessageId(1)));
        assert_eq!(publisher.transport.calls(), vec![Call::Send]);
    }

    #[tokio::test]
    async fn second_publish_deletes_once_and_tracks_new_id() {
        let publisher = Publisher::new(FakeTransport::default());
        publisher.publish(&doc()).await.unwrap();
        publisher.publish(&doc()).await.unwrap();

        assert_eq!(
            publisher.transport.calls(),
            vec![Call::Send, Call::Delete(MessageId(1)), Call::Send]
        );
        assert_eq!(publisher.last_message().await, Some(MessageId(2)));
    }

    #[tokio::test]
    async fn missing_previous_message_does_not_block() {
        let publisher = Publisher::new(FakeTransport::default());
        publisher.publish(&doc()).await.unwrap();
        publisher.transport.script_delete(Err(DeleteError::NotFound));

        let id = publisher.publish(&doc()).await.unwrap();
        assert_eq!(id, MessageId(2));
        assert_eq!(publisher.last_message().await, Some(MessageId(2)));

        // Handle keeps cycling normally afterwards.
        publisher.publish(&doc()).await.unwrap();
        assert_eq!(publisher.last_message().await, Some(MessageId(3)));
        assert_eq!(publisher.transport.calls().last(), Some(&Call::Send));
    }

    #[tokio::test]
    async fn other_delete_failure_still_publishes() {
        let publisher = Publisher::new(FakeTransport::default());
        publisher.publish(&doc()).await.unwrap();
        publisher
            .transport
            .script_delete(Err(DeleteError::Other("missing permissions".to_string())));

        let id = publisher.publish(&doc()).await.unwrap();
        assert_eq!(id, MessageId(2));
        assert_eq!(publisher.last_message().await, Some(MessageId(2)));
    }

    #[tokio::test]
    async fn send_failure_reported_and_handle_kept() {
        let publisher = Publisher::new(FakeTransport::default());
        publisher.publish(&doc()).await.unwrap();
        publisher
            .transport
            .script_send(Err(TransportError::Rejected("503".to_string())));

        let err = publisher.publish(&doc()).await.unwrap_err();
        assert_eq!(err, TransportError::Rejected("503".to_string()));
        // Delete succeeded, send failed: handle still points at the old id.
        assert_eq!(publisher.last_message().await, Some(MessageId(1)));
        // No retry inside the publisher.
        assert_eq!(
            publisher.transport.calls(),
            vec![Call::Send, Call::Delete(MessageId(1)), Call::Send]
        );
    }

    #[tokio::test]
    async fn send_failure_after_not_found_leaves_no_handle() {
        let publisher = Publisher::new(FakeTransport::default());
        publisher.publish(&doc()).await.unwrap();
        publisher.transport.script_delete(Err(DeleteError::NotFound));
        publisher.transport.script_send(Err(TransportError::Timeout(15)));

        assert!(publisher.publish(&doc()).await.is_err());
        assert_eq!(publisher.last_message().await, None);

        // Next publish starts from a clean slate: no delete attempt.
        publisher.publish(&doc()).await.unwrap();
        assert_eq!(publisher.transport.calls().last(), Some(&Call::Send));
        assert_eq!(publisher.transport.calls().len(), 4);
    }
}
