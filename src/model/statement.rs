use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable confirmation record appended after a committed ledger
/// mutation. Only the read flag may change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Statement {
    pub id: String,
    pub owner_id: String,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Statement {
    pub fn new(owner_id: impl Into<String>, body: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            body: body.into(),
            read: false,
            created_at: now,
        }
    }
}
