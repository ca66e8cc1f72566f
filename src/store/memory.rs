//! In-process store used by tests and by hosts that do not need
//! durability. One RwLock over the whole ledger makes `commit` and
//! `claim_transaction` trivially atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::model::{
    AttendanceRecord, BonusEntry, Employment, Loan, Statement, Transaction, TxStatus, WageRecord,
};

use super::{LedgerDelta, LedgerStore};

type PairKey = (String, String);

#[derive(Default)]
struct Inner {
    employments: HashMap<PairKey, Employment>,
    wages: HashMap<PairKey, WageRecord>,
    loans: HashMap<String, Loan>,
    bonuses: Vec<BonusEntry>,
    attendance: HashMap<(String, String, NaiveDate), AttendanceRecord>,
    transactions: HashMap<String, Transaction>,
    statements: Vec<Statement>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn pair(employer_id: &str, employee_id: &str) -> PairKey {
    (employer_id.to_string(), employee_id.to_string())
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn employment(
        &self,
        employer_id: &str,
        employee_id: &str,
    ) -> Result<Option<Employment>> {
        let inner = self.inner.read().await;
        Ok(inner.employments.get(&pair(employer_id, employee_id)).cloned())
    }

    async fn wage_record(
        &self,
        employer_id: &str,
        employee_id: &str,
    ) -> Result<Option<WageRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.wages.get(&pair(employer_id, employee_id)).cloned())
    }

    async fn loans(&self, employer_id: &str, employee_id: &str) -> Result<Vec<Loan>> {
        let inner = self.inner.read().await;
        let mut loans: Vec<Loan> = inner
            .loans
            .values()
            .filter(|l| l.employer_id == employer_id && l.employee_id == employee_id)
            .cloned()
            .collect();
        loans.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(loans)
    }

    async fn bonus_entries_since(
        &self,
        employer_id: &str,
        employee_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<BonusEntry>> {
        let inner = self.inner.read().await;
        Ok(inner
            .bonuses
            .iter()
            .filter(|b| b.employer_id == employer_id && b.employee_id == employee_id)
            .filter(|b| since.map_or(true, |s| b.created_at > s))
            .cloned()
            .collect())
    }

    async fn attendance(
        &self,
        employer_id: &str,
        employee_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>> {
        let inner = self.inner.read().await;
        let key = (employer_id.to_string(), employee_id.to_string(), date);
        Ok(inner.attendance.get(&key).cloned())
    }

    async fn attendance_between(
        &self,
        employer_id: &str,
        employee_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>> {
        let inner = self.inner.read().await;
        let mut records: Vec<AttendanceRecord> = inner
            .attendance
            .values()
            .filter(|r| {
                r.employer_id == employer_id
                    && r.employee_id == employee_id
                    && r.date >= from
                    && r.date <= to
            })
            .cloned()
            .collect();
        records.sort_by_key(|r| r.date);
        Ok(records)
    }

    async fn put_attendance(&self, record: &AttendanceRecord) -> Result<()> {
        let mut inner = self.inner.write().await;
        let key = (
            record.employer_id.clone(),
            record.employee_id.clone(),
            record.date,
        );
        inner.attendance.insert(key, record.clone());
        Ok(())
    }

    async fn insert_transaction(&self, transaction: &Transaction) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .transactions
            .insert(transaction.token.clone(), transaction.clone());
        Ok(())
    }

    async fn transaction_by_token(&self, token: &str) -> Result<Option<Transaction>> {
        let inner = self.inner.read().await;
        Ok(inner.transactions.get(token).cloned())
    }

    async fn claim_transaction(&self, token: &str, completed_at: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.transactions.get_mut(token) {
            Some(tx) if tx.status == TxStatus::Pending => {
                tx.status = TxStatus::Completed;
                tx.completed_at = Some(completed_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn commit(&self, delta: LedgerDelta, statement: Statement) -> Result<()> {
        let mut inner = self.inner.write().await;
        for employment in delta.employments {
            let key = pair(&employment.employer_id, &employment.employee_id);
            inner.employments.insert(key, employment);
        }
        for wage in delta.wages {
            let key = pair(&wage.employer_id, &wage.employee_id);
            inner.wages.insert(key, wage);
        }
        for loan in delta.loans {
            inner.loans.insert(loan.id.clone(), loan);
        }
        inner.bonuses.extend(delta.bonuses);
        for record in delta.attendance {
            let key = (
                record.employer_id.clone(),
                record.employee_id.clone(),
                record.date,
            );
            inner.attendance.insert(key, record);
        }
        inner.statements.push(statement);
        Ok(())
    }

    async fn statements_for(&self, owner_id: &str) -> Result<Vec<Statement>> {
        let inner = self.inner.read().await;
        Ok(inner
            .statements
            .iter()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn mark_statement_read(&self, statement_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(statement) = inner.statements.iter_mut().find(|s| s.id == statement_id) {
            statement.read = true;
        }
        Ok(())
    }
}
