//! Transaction registry: issues pending transactions and claims them
//! exactly once. The conditional status transition here is the only
//! thing standing between two concurrent scans of the same printed code
//! and a double payout.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::info;

use crate::error::{LedgerError, Result};
use crate::model::{TokenSubject, Transaction, TxKind, TxMetadata, TxStatus};
use crate::store::LedgerStore;
use crate::token::{self, TxToken};

pub struct TransactionRegistry {
    store: Arc<dyn LedgerStore>,
}

impl TransactionRegistry {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Encodes a token for the intended action and persists it pending.
    /// The metadata shape is checked here as well so an issuer learns
    /// about a broken payload before printing the code.
    pub async fn create(
        &self,
        kind: TxKind,
        employer_id: &str,
        subject: TokenSubject,
        metadata: TxMetadata,
        date: Option<NaiveDate>,
    ) -> Result<Transaction> {
        metadata.validate_for(kind)?;

        let now = Utc::now();
        // Token text doubles as the storage key; bump the millisecond
        // stamp if two issuances of the same action collide.
        let mut issued_at_ms = now.timestamp_millis();
        let token = loop {
            let candidate = token::encode_transaction(&TxToken {
                kind,
                employer_id: employer_id.to_string(),
                subject: subject.clone(),
                date,
                issued_at_ms,
            });
            if self.store.transaction_by_token(&candidate).await?.is_none() {
                break candidate;
            }
            issued_at_ms += 1;
        };

        let transaction = Transaction {
            token,
            kind,
            status: TxStatus::Pending,
            employer_id: employer_id.to_string(),
            subject,
            metadata,
            date,
            created_at: now,
            completed_at: None,
        };
        self.store.insert_transaction(&transaction).await?;
        info!(kind = %kind, employer = employer_id, "transaction issued");
        Ok(transaction)
    }

    /// Claims a token for `redeemer_employee_id`.
    ///
    /// Decode, lookup, subject and metadata checks all happen before the
    /// claim so a rejected redemption never burns the token. The claim
    /// itself is a single conditional write; the loser of a concurrent
    /// race gets `AlreadyRedeemed`.
    pub async fn redeem(
        &self,
        token_text: &str,
        redeemer_employee_id: &str,
    ) -> Result<Transaction> {
        let decoded = token::decode_transaction(token_text)?;

        let transaction = self
            .store
            .transaction_by_token(token_text)
            .await?
            .ok_or(LedgerError::NotFound("transaction"))?;

        if decoded.kind != transaction.kind {
            return Err(LedgerError::ConsistencyViolation(format!(
                "token kind {} does not match stored transaction kind {}",
                decoded.kind, transaction.kind
            )));
        }
        if !transaction.subject.admits(redeemer_employee_id) {
            return Err(LedgerError::SubjectMismatch);
        }
        transaction.metadata.validate_for(transaction.kind)?;

        let completed_at = Utc::now();
        if !self.store.claim_transaction(token_text, completed_at).await? {
            return Err(LedgerError::AlreadyRedeemed);
        }
        info!(kind = %transaction.kind, redeemer = redeemer_employee_id, "transaction claimed");

        Ok(Transaction {
            status: TxStatus::Completed,
            completed_at: Some(completed_at),
            ..transaction
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registry() -> TransactionRegistry {
        TransactionRegistry::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn create_then_redeem_once() {
        let registry = registry();
        let tx = registry
            .create(
                TxKind::PayWages,
                "emp-1",
                TokenSubject::Employee("worker-9".into()),
                TxMetadata::PayWages,
                None,
            )
            .await
            .unwrap();
        assert_eq!(tx.status, TxStatus::Pending);

        let redeemed = registry.redeem(&tx.token, "worker-9").await.unwrap();
        assert_eq!(redeemed.status, TxStatus::Completed);
        assert!(redeemed.completed_at.is_some());
    }

    #[tokio::test]
    async fn second_redeem_is_already_redeemed() {
        let registry = registry();
        let tx = registry
            .create(
                TxKind::PayWages,
                "emp-1",
                TokenSubject::Employee("worker-9".into()),
                TxMetadata::PayWages,
                None,
            )
            .await
            .unwrap();
        registry.redeem(&tx.token, "worker-9").await.unwrap();
        assert!(matches!(
            registry.redeem(&tx.token, "worker-9").await,
            Err(LedgerError::AlreadyRedeemed)
        ));
    }

    #[tokio::test]
    async fn subject_mismatch_is_distinct_from_not_found() {
        let registry = registry();
        let tx = registry
            .create(
                TxKind::PayWages,
                "emp-1",
                TokenSubject::Employee("worker-9".into()),
                TxMetadata::PayWages,
                None,
            )
            .await
            .unwrap();

        assert!(matches!(
            registry.redeem(&tx.token, "intruder").await,
            Err(LedgerError::SubjectMismatch)
        ));
        // The failed attempt must not burn the token.
        assert!(registry.redeem(&tx.token, "worker-9").await.is_ok());

        assert!(matches!(
            registry.redeem("qr:pay_wages:emp-1:worker-9:12345", "worker-9").await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn universal_token_admits_any_redeemer() {
        let registry = registry();
        let tx = registry
            .create(
                TxKind::MarkAttendance,
                "emp-1",
                TokenSubject::Universal,
                TxMetadata::MarkAttendance,
                None,
            )
            .await
            .unwrap();
        assert!(registry.redeem(&tx.token, "anyone").await.is_ok());
    }

    #[tokio::test]
    async fn mismatched_metadata_is_rejected_at_issue_time() {
        let registry = registry();
        let result = registry
            .create(
                TxKind::GrantLoan,
                "emp-1",
                TokenSubject::Employee("worker-9".into()),
                TxMetadata::PayWages,
                None,
            )
            .await;
        assert!(matches!(result, Err(LedgerError::InsufficientData(_))));
    }

    #[tokio::test]
    async fn concurrent_redeems_single_winner() {
        let registry = Arc::new(registry());
        let tx = registry
            .create(
                TxKind::MarkAttendance,
                "emp-1",
                TokenSubject::Universal,
                TxMetadata::MarkAttendance,
                None,
            )
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let registry = registry.clone();
            let token = tx.token.clone();
            handles.push(tokio::spawn(async move {
                registry.redeem(&token, &format!("worker-{i}")).await
            }));
        }

        let mut wins = 0;
        let mut losses = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(LedgerError::AlreadyRedeemed) => losses += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(losses, 15);
    }
}
