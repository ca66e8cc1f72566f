//! Durable keyed storage behind the ledger. The engine only needs the
//! primitives declared here: keyed reads and writes per record type, a
//! conditional-update primitive for the transaction status, and
//! all-or-nothing commit of a ledger delta plus its statement. Any store
//! offering these suffices; no query language is assumed.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::Result;
use crate::model::{
    AttendanceRecord, BonusEntry, Employment, Loan, Statement, Transaction, WageRecord,
};

mod memory;
mod mysql;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

/// One redemption's worth of ledger writes, applied atomically together
/// with its statement. Upserts keyed by each record's natural key.
#[derive(Debug, Clone, Default)]
pub struct LedgerDelta {
    pub employments: Vec<Employment>,
    pub wages: Vec<WageRecord>,
    pub loans: Vec<Loan>,
    pub bonuses: Vec<BonusEntry>,
    pub attendance: Vec<AttendanceRecord>,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn employment(&self, employer_id: &str, employee_id: &str)
        -> Result<Option<Employment>>;

    async fn wage_record(&self, employer_id: &str, employee_id: &str)
        -> Result<Option<WageRecord>>;

    async fn loans(&self, employer_id: &str, employee_id: &str) -> Result<Vec<Loan>>;

    /// Bonus ledger lines created after `since` (all lines when `None`),
    /// oldest first.
    async fn bonus_entries_since(
        &self,
        employer_id: &str,
        employee_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<BonusEntry>>;

    async fn attendance(
        &self,
        employer_id: &str,
        employee_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>>;

    async fn attendance_between(
        &self,
        employer_id: &str,
        employee_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>>;

    /// Direct upsert used for employee-submitted leave, which bypasses
    /// the token path and emits no statement.
    async fn put_attendance(&self, record: &AttendanceRecord) -> Result<()>;

    async fn insert_transaction(&self, transaction: &Transaction) -> Result<()>;

    async fn transaction_by_token(&self, token: &str) -> Result<Option<Transaction>>;

    /// Atomic pending -> completed transition. Returns `true` iff this
    /// caller observed `pending` and flipped it; of N concurrent calls
    /// exactly one returns `true`. This is the sole double-redemption
    /// defense.
    async fn claim_transaction(&self, token: &str, completed_at: DateTime<Utc>) -> Result<bool>;

    /// Applies the delta and appends the statement as one unit: if the
    /// statement cannot be written, none of the delta may become
    /// visible.
    async fn commit(&self, delta: LedgerDelta, statement: Statement) -> Result<()>;

    async fn statements_for(&self, owner_id: &str) -> Result<Vec<Statement>>;

    async fn mark_statement_read(&self, statement_id: &str) -> Result<()>;
}
