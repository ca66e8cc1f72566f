//! Post-commit change notification. The ambient realtime channels of
//! the source system become an explicit publish/subscribe handle that is
//! injected into the orchestrator: subscribers register interest in an
//! (owner, entity kind) pair and receive events only after the commit
//! has landed. Delivery is at-least-once from the subscriber's view and
//! purely informational; no ledger effect ever runs on receipt.

use tokio::sync::broadcast;

use crate::model::TxKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Employment,
    Wage,
    Loan,
    Bonus,
    Attendance,
    Transaction,
    Statement,
}

#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub owner_id: String,
    pub entity: EntityKind,
    pub summary: String,
}

impl ChangeEvent {
    pub fn transaction_completed(owner_id: impl Into<String>, kind: TxKind) -> Self {
        Self {
            owner_id: owner_id.into(),
            entity: EntityKind::Transaction,
            summary: format!("{kind} transaction completed"),
        }
    }
}

#[derive(Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Fans the event out to current subscribers. No subscribers is not
    /// an error; events are fire-and-forget.
    pub fn publish(&self, event: ChangeEvent) {
        tracing::debug!(owner = %event.owner_id, entity = ?event.entity, "change event");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self, owner_id: impl Into<String>, entity: EntityKind) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            owner_id: owner_id.into(),
            entity,
        }
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

/// One subscriber's filtered view of the event stream.
pub struct Subscription {
    rx: broadcast::Receiver<ChangeEvent>,
    owner_id: String,
    entity: EntityKind,
}

impl Subscription {
    /// Next matching event, or `None` once the notifier is gone. A
    /// lagged receiver skips ahead rather than failing.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.owner_id == self.owner_id && event.entity == self.entity => {
                    return Some(event);
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
