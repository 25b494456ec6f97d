use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Events emitted by the services after a successful state change.
///
/// Consumers are decoupled from request handling; a send failure never
/// fails the operation that produced the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderCompleted(Uuid),
    OrderCancelled(Uuid),
    OrderDeleted(Uuid),

    // Customer events
    CustomerCreated(Uuid),
    CustomerUpdated(Uuid),
    CustomerDeleted(Uuid),

    // Product events
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event channel, logging each event.
///
/// Runs until every sender is dropped. Integrations (webhooks, queues)
/// would hang off this loop.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated(id) => info!(order_id = %id, "event: order created"),
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => info!(
                order_id = %order_id,
                old_status = %old_status,
                new_status = %new_status,
                "event: order status changed"
            ),
            Event::OrderCompleted(id) => info!(order_id = %id, "event: order completed"),
            Event::OrderCancelled(id) => info!(order_id = %id, "event: order cancelled"),
            Event::OrderDeleted(id) => info!(order_id = %id, "event: order deleted"),
            Event::CustomerCreated(id) => info!(customer_id = %id, "event: customer created"),
            Event::CustomerUpdated(id) => info!(customer_id = %id, "event: customer updated"),
            Event::CustomerDeleted(id) => info!(customer_id = %id, "event: customer deleted"),
            Event::ProductCreated(id) => info!(product_id = %id, "event: product created"),
            Event::ProductUpdated(id) => info!(product_id = %id, "event: product updated"),
            Event::ProductDeleted(id) => info!(product_id = %id, "event: product deleted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let id = Uuid::new_v4();

        sender.send(Event::OrderCreated(id)).await.unwrap();

        match rx.recv().await {
            Some(Event::OrderCreated(received)) => assert_eq!(received, id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender.send(Event::OrderCreated(Uuid::new_v4())).await.is_err());
    }
}
