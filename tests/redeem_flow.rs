//! End-to-end issuance -> redemption -> statement flow against the
//! in-memory store, including the concurrent-scan race and post-commit
//! notification delivery.

use std::sync::Arc;

use anyhow::Result;
use paylink::model::{TokenSubject, TxKind, TxMetadata, TxStatus};
use paylink::store::{LedgerStore, MemoryStore};
use paylink::{ChangeNotifier, EntityKind, LedgerError, LedgerOrchestrator};

const EMPLOYER: &str = "emp-42";
const EMPLOYEE: &str = "worker-7";

fn setup() -> (Arc<MemoryStore>, ChangeNotifier, Arc<LedgerOrchestrator>) {
    let store = Arc::new(MemoryStore::new());
    let notifier = ChangeNotifier::new(32);
    let orchestrator = Arc::new(LedgerOrchestrator::new(store.clone(), notifier.clone()));
    (store, notifier, orchestrator)
}

#[tokio::test]
async fn pay_wages_end_to_end() -> Result<()> {
    let (store, notifier, orchestrator) = setup();

    orchestrator
        .establish_employment("employer:emp-42:payroll@acme.example", EMPLOYEE)
        .await?;
    orchestrator
        .set_monthly_wage(EMPLOYER, EMPLOYEE, 2000.0, "USD")
        .await?;

    let mut issuer_events = notifier.subscribe(EMPLOYER, EntityKind::Transaction);
    let mut employee_events = notifier.subscribe(EMPLOYEE, EntityKind::Statement);

    let transaction = orchestrator
        .registry()
        .create(
            TxKind::PayWages,
            EMPLOYER,
            TokenSubject::Employee(EMPLOYEE.into()),
            TxMetadata::PayWages,
            None,
        )
        .await?;

    let statements_before = store.statements_for(EMPLOYEE).await?.len();
    let statement = orchestrator
        .redeem_and_apply(&transaction.token, EMPLOYEE)
        .await?;
    assert!(statement.body.contains("2000.00 USD"));

    // Wage row stamped and exactly one new statement appended.
    let wage = store.wage_record(EMPLOYER, EMPLOYEE).await?.unwrap();
    assert!(wage.last_payment_at.is_some());
    assert_eq!(
        store.statements_for(EMPLOYEE).await?.len(),
        statements_before + 1
    );

    // The issuer hears about completion asynchronously, after commit.
    let event = issuer_events.recv().await.unwrap();
    assert!(event.summary.contains("pay_wages"));
    let event = employee_events.recv().await.unwrap();
    assert_eq!(event.summary, statement.body);

    // Same token text again: the claim is gone, nothing else moves.
    let err = orchestrator
        .redeem_and_apply(&transaction.token, EMPLOYEE)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyRedeemed));
    assert_eq!(
        store.statements_for(EMPLOYEE).await?.len(),
        statements_before + 1
    );

    let stored = store.transaction_by_token(&transaction.token).await?.unwrap();
    assert_eq!(stored.status, TxStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn concurrent_scans_produce_one_payout() -> Result<()> {
    let (store, _notifier, orchestrator) = setup();

    orchestrator
        .establish_employment("employer:emp-42:payroll@acme.example", EMPLOYEE)
        .await?;
    orchestrator
        .set_monthly_wage(EMPLOYER, EMPLOYEE, 1500.0, "USD")
        .await?;

    let transaction = orchestrator
        .registry()
        .create(
            TxKind::PayWages,
            EMPLOYER,
            TokenSubject::Employee(EMPLOYEE.into()),
            TxMetadata::PayWages,
            None,
        )
        .await?;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let orchestrator = orchestrator.clone();
        let token = transaction.token.clone();
        handles.push(tokio::spawn(async move {
            orchestrator.redeem_and_apply(&token, EMPLOYEE).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => successes += 1,
            Err(LedgerError::AlreadyRedeemed) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(successes, 1);
    // link + wage-set + exactly one payout
    assert_eq!(store.statements_for(EMPLOYEE).await?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn foreign_employee_cannot_redeem_but_token_survives() -> Result<()> {
    let (_store, _notifier, orchestrator) = setup();

    orchestrator
        .establish_employment("employer:emp-42:payroll@acme.example", EMPLOYEE)
        .await?;
    orchestrator
        .set_monthly_wage(EMPLOYER, EMPLOYEE, 2000.0, "USD")
        .await?;

    let transaction = orchestrator
        .registry()
        .create(
            TxKind::PayWages,
            EMPLOYER,
            TokenSubject::Employee(EMPLOYEE.into()),
            TxMetadata::PayWages,
            None,
        )
        .await?;

    let err = orchestrator
        .redeem_and_apply(&transaction.token, "someone-else")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::SubjectMismatch));

    // The mismatch never consumed the claim.
    orchestrator
        .redeem_and_apply(&transaction.token, EMPLOYEE)
        .await?;
    Ok(())
}
