//! NATS subscriber forwarding triggers to the event runner.

use anyhow::Result;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::runner::Trigger;

/// Core NATS subscription on this server's trigger subject.
pub struct TriggerSubscriber {
    /// Live subscription.
    subscriber: async_nats::Subscriber,

    /// Subject subscribed to.
    subject: String,
}

impl TriggerSubscriber {
    /// Connect to NATS and subscribe to `subject`.
    pub async fn connect(nats_url: &str, subject: &str) -> Result<Self> {
        let client = async_nats::connect(nats_url).await?;
        let subscriber = client.subscribe(subject.to_string()).await?;

        tracing::info!(url = %nats_url, subject = %subject, "Subscribed to trigger subject");

        Ok(Self {
            subscriber,
            subject: subject.to_string(),
        })
    }

    /// Subject this subscriber listens on.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Decode messages into triggers and forward them until cancelled.
    ///
    /// Undecodable payloads are logged and dropped. Returns when the
    /// subscription ends, the receiver is dropped, or `cancel` fires.
    pub async fn forward(mut self, tx: mpsc::Sender<Trigger>, cancel: CancellationToken) {
        loop {
            let message = tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                message = self.subscriber.next() => match message {
                    Some(message) => message,
                    None => {
                        tracing::warn!(subject = %self.subject, "Trigger subscription ended");
                        break;
                    }
                },
            };

            let trigger = match decode(&message.payload) {
                Ok(trigger) => trigger,
                Err(e) => {
                    tracing::warn!(subject = %message.subject, error = %e, "Dropping malformed trigger");
                    continue;
                }
            };

            if tx.send(trigger).await.is_err() {
                tracing::debug!("Event runner gone, stopping trigger forwarding");
                break;
            }
        }

        if let Err(e) = self.subscriber.unsubscribe().await {
            tracing::debug!(error = %e, "Unsubscribe failed");
        }
    }
}

fn decode(payload: &[u8]) -> Result<Trigger, serde_json::Error> {
    serde_json::from_slice(payload)
}
