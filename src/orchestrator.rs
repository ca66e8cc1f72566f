//! Top-level coordinator. Takes a claimed transaction, computes the
//! ledger delta for its kind, and lands the delta together with its
//! confirmation statement in one store commit. Change events go out
//! only after the commit; the effect itself happens exactly once at
//! claim time, so a duplicated notification never re-applies anything.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use crate::attendance::{self, AttendanceTransition, LeaveKind};
use crate::error::{LedgerError, Result};
use crate::model::{
    AttendanceRecord, AttendanceStatus, BonusCategory, BonusEntry, Employment, EmploymentKind,
    EmploymentStatus, Loan, LoanStatus, Statement, TokenSubject, Transaction, TxKind, TxMetadata,
    WageRecord,
};
use crate::notify::{ChangeEvent, ChangeNotifier, EntityKind};
use crate::payroll::{self, AmortizationTerm};
use crate::registry::TransactionRegistry;
use crate::store::{LedgerDelta, LedgerStore};
use crate::token;

/// Work-day length assumed when an employment does not carry one.
const DEFAULT_HOURS_PER_DAY: f64 = 8.0;
const DEFAULT_CURRENCY: &str = "USD";

pub struct LedgerOrchestrator {
    store: Arc<dyn LedgerStore>,
    registry: TransactionRegistry,
    notifier: ChangeNotifier,
}

impl LedgerOrchestrator {
    pub fn new(store: Arc<dyn LedgerStore>, notifier: ChangeNotifier) -> Self {
        let registry = TransactionRegistry::new(store.clone());
        Self {
            store,
            registry,
            notifier,
        }
    }

    /// Issuer-side handle for building tokens.
    pub fn registry(&self) -> &TransactionRegistry {
        &self.registry
    }

    /// Full redemption path: claim the token exactly once, apply its
    /// ledger effect, notify the issuer and the addressee after commit.
    pub async fn redeem_and_apply(
        &self,
        token_text: &str,
        redeemer_employee_id: &str,
    ) -> Result<Statement> {
        let transaction = self.registry.redeem(token_text, redeemer_employee_id).await?;
        let statement = self.apply(&transaction, redeemer_employee_id).await?;

        self.notifier.publish(ChangeEvent::transaction_completed(
            transaction.employer_id.clone(),
            transaction.kind,
        ));
        self.notifier.publish(ChangeEvent {
            owner_id: statement.owner_id.clone(),
            entity: EntityKind::Statement,
            summary: statement.body.clone(),
        });
        Ok(statement)
    }

    async fn apply(&self, transaction: &Transaction, redeemer: &str) -> Result<Statement> {
        let employee_id = match &transaction.subject {
            TokenSubject::Employee(id) => id.clone(),
            TokenSubject::Universal => redeemer.to_string(),
        };
        let employer_id = transaction.employer_id.as_str();
        let now = transaction.completed_at.unwrap_or_else(Utc::now);

        let (delta, statement) = match (&transaction.kind, &transaction.metadata) {
            (TxKind::PayWages, TxMetadata::PayWages) => {
                self.pay_wages(employer_id, &employee_id, now).await?
            }
            (TxKind::SettleLoan, TxMetadata::SettleLoan) => {
                self.settle_loans(employer_id, &employee_id, now).await?
            }
            (TxKind::ForecloseLoan, TxMetadata::ForecloseLoan { loan_ids }) => {
                self.foreclose_loans(employer_id, &employee_id, loan_ids, now)
                    .await?
            }
            (
                TxKind::GrantLoan,
                TxMetadata::GrantLoan {
                    principal,
                    interest_rate,
                    monthly_deduction,
                },
            ) => {
                self.grant_loan(
                    employer_id,
                    &employee_id,
                    *principal,
                    *interest_rate,
                    *monthly_deduction,
                    now,
                )
                .await?
            }
            (TxKind::PayContractWages, TxMetadata::PayContractWages { amount, currency }) => {
                self.pay_contract(employer_id, &employee_id, *amount, currency, now)
                    .await?
            }
            (TxKind::MarkAttendance, TxMetadata::MarkAttendance) => {
                self.mark_attendance(employer_id, &employee_id, transaction.date, now)
                    .await?
            }
            // The registry validates metadata against the kind before
            // the claim; reaching this arm means the store was edited
            // behind our back.
            (kind, _) => {
                return Err(LedgerError::ConsistencyViolation(format!(
                    "metadata does not match transaction kind {kind}"
                )));
            }
        };

        self.store.commit(delta, statement.clone()).await?;
        info!(kind = %transaction.kind, employee = %employee_id, "ledger effect committed");
        Ok(statement)
    }

    async fn pay_wages(
        &self,
        employer_id: &str,
        employee_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(LedgerDelta, Statement)> {
        let employment = self
            .store
            .employment(employer_id, employee_id)
            .await?
            .ok_or(LedgerError::NotFound("employment"))?;
        let mut wage = self
            .store
            .wage_record(employer_id, employee_id)
            .await?
            .ok_or_else(|| {
                LedgerError::ConsistencyViolation(format!(
                    "no wage record for employee {employee_id}"
                ))
            })?;

        let period_start = wage.last_payment_at;
        let entries = self
            .store
            .bonus_entries_since(employer_id, employee_id, period_start)
            .await?;
        let mut merits = 0.0;
        let mut advances = 0.0;
        let mut demerits = 0.0;
        let mut past_loan_deductions = 0.0;
        for entry in &entries {
            match entry.category {
                BonusCategory::Merit => merits += entry.amount,
                BonusCategory::Advance => advances += entry.amount,
                BonusCategory::Demerit => demerits += entry.amount,
                BonusCategory::LoanDeduction => past_loan_deductions += entry.amount,
            }
        }

        let base = match employment.kind {
            EmploymentKind::PartTime => {
                let from = period_start
                    .map(|t| t.date_naive())
                    .unwrap_or_else(|| employment.created_at.date_naive());
                // The fetch window is date-granular and inclusive, so a
                // day completed on the payment date shows up again in
                // the next fetch; the logout-after-last-payment filter
                // keeps every worked hour in exactly one period.
                let worked: f64 = self
                    .store
                    .attendance_between(employer_id, employee_id, from, now.date_naive())
                    .await?
                    .iter()
                    .filter(|r| {
                        period_start.map_or(true, |start| {
                            r.logout_time.map_or(false, |logout| logout > start)
                        })
                    })
                    .filter_map(|r| r.total_hours)
                    .sum();
                wage.hourly_rate * worked
            }
            EmploymentKind::FullTime | EmploymentKind::Contract => wage.monthly_wage,
        };

        // This month's installment comes off every active loan, clamped
        // so a balance never goes negative.
        let mut delta = LedgerDelta::default();
        let mut monthly_loan_deduction = 0.0;
        for loan in self.store.loans(employer_id, employee_id).await? {
            if !loan.is_active() {
                continue;
            }
            let outstanding = loan.outstanding();
            let cut = loan.monthly_deduction.min(outstanding);
            if cut <= 0.0 {
                continue;
            }
            monthly_loan_deduction += cut;
            let remaining = outstanding - cut;
            delta.bonuses.push(BonusEntry {
                id: Uuid::new_v4().to_string(),
                employer_id: employer_id.to_string(),
                employee_id: employee_id.to_string(),
                category: BonusCategory::LoanDeduction,
                amount: cut,
                note: Some(format!("installment for loan {}", loan.id)),
                created_at: now,
            });
            delta.loans.push(Loan {
                remaining_amount: Some(remaining),
                status: if remaining <= 0.0 {
                    LoanStatus::Paid
                } else {
                    LoanStatus::Active
                },
                ..loan
            });
        }

        let net = payroll::final_payable(
            base,
            merits,
            advances,
            demerits,
            past_loan_deductions,
            monthly_loan_deduction,
        );

        wage.last_payment_at = Some(now);
        wage.total_deductions += demerits + past_loan_deductions + monthly_loan_deduction;
        let currency = wage.currency.clone();
        delta.wages.push(wage);

        let statement = Statement::new(
            employee_id,
            format!("Wage payment of {net:.2} {currency} processed"),
            now,
        );
        Ok((delta, statement))
    }

    async fn settle_loans(
        &self,
        employer_id: &str,
        employee_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(LedgerDelta, Statement)> {
        let active: Vec<Loan> = self
            .store
            .loans(employer_id, employee_id)
            .await?
            .into_iter()
            .filter(Loan::is_active)
            .collect();
        if active.is_empty() {
            return Err(LedgerError::NotFound("active loan"));
        }

        let total = payroll::foreclose_total(&active);
        let count = active.len();
        let mut delta = LedgerDelta::default();
        for loan in active {
            delta.loans.push(Loan {
                remaining_amount: Some(0.0),
                status: LoanStatus::Paid,
                ..loan
            });
        }
        let statement = Statement::new(
            employee_id,
            format!("{count} loan(s) settled, {total:.2} cleared"),
            now,
        );
        Ok((delta, statement))
    }

    async fn foreclose_loans(
        &self,
        employer_id: &str,
        employee_id: &str,
        loan_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<(LedgerDelta, Statement)> {
        let selected: Vec<Loan> = self
            .store
            .loans(employer_id, employee_id)
            .await?
            .into_iter()
            .filter(|l| l.is_active() && loan_ids.contains(&l.id))
            .collect();
        // Already-closed loans drop out of the subset; a token aimed
        // only at closed loans has nothing left to do.
        if selected.is_empty() {
            return Err(LedgerError::NotFound("active loan"));
        }

        let total = payroll::foreclose_total(&selected);
        let count = selected.len();
        let mut delta = LedgerDelta::default();
        for loan in selected {
            delta.loans.push(Loan {
                remaining_amount: Some(0.0),
                status: LoanStatus::Foreclosed,
                ..loan
            });
        }
        let statement = Statement::new(
            employee_id,
            format!("{count} loan(s) foreclosed, {total:.2} cleared"),
            now,
        );
        Ok((delta, statement))
    }

    async fn grant_loan(
        &self,
        employer_id: &str,
        employee_id: &str,
        principal: f64,
        interest_rate: f64,
        monthly_deduction: f64,
        now: DateTime<Utc>,
    ) -> Result<(LedgerDelta, Statement)> {
        self.store
            .employment(employer_id, employee_id)
            .await?
            .ok_or(LedgerError::NotFound("employment"))?;

        let terms = payroll::loan_amortization(
            principal,
            interest_rate,
            AmortizationTerm::MonthlyDeduction(monthly_deduction),
        );
        let loan = Loan {
            id: Uuid::new_v4().to_string(),
            employer_id: employer_id.to_string(),
            employee_id: employee_id.to_string(),
            principal,
            interest_rate,
            total_amount: terms.total_amount,
            remaining_amount: None,
            monthly_deduction: terms.monthly_deduction,
            tenure_months: terms.tenure_months,
            status: LoanStatus::Active,
            created_at: now,
        };
        let statement = Statement::new(
            employee_id,
            format!(
                "Loan granted: {principal:.2} at {interest_rate}% interest, {:.2} payable over {} monthly deductions of {:.2}",
                terms.total_amount, terms.tenure_months, terms.monthly_deduction
            ),
            now,
        );
        let delta = LedgerDelta {
            loans: vec![loan],
            ..Default::default()
        };
        Ok((delta, statement))
    }

    async fn pay_contract(
        &self,
        employer_id: &str,
        employee_id: &str,
        amount: f64,
        currency: &str,
        now: DateTime<Utc>,
    ) -> Result<(LedgerDelta, Statement)> {
        self.store
            .employment(employer_id, employee_id)
            .await?
            .ok_or(LedgerError::NotFound("employment"))?;

        // Contract invoices are flat one-off amounts; they only stamp
        // the wage row, never feed the monthly formula.
        let mut wage = self
            .store
            .wage_record(employer_id, employee_id)
            .await?
            .unwrap_or_else(|| WageRecord {
                employer_id: employer_id.to_string(),
                employee_id: employee_id.to_string(),
                monthly_wage: 0.0,
                currency: currency.to_string(),
                hourly_rate: 0.0,
                last_payment_at: None,
                total_deductions: 0.0,
            });
        wage.last_payment_at = Some(now);

        let statement = Statement::new(
            employee_id,
            format!("Contract payment of {amount:.2} {currency} recorded"),
            now,
        );
        let delta = LedgerDelta {
            wages: vec![wage],
            ..Default::default()
        };
        Ok((delta, statement))
    }

    async fn mark_attendance(
        &self,
        employer_id: &str,
        employee_id: &str,
        token_date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<(LedgerDelta, Statement)> {
        let employment = self
            .store
            .employment(employer_id, employee_id)
            .await?
            .ok_or(LedgerError::NotFound("employment"))?;

        let date = token_date.unwrap_or_else(|| now.date_naive());
        let backfill = token_date.is_some();
        let standard_hours = employment.hours_per_day.unwrap_or(DEFAULT_HOURS_PER_DAY);

        let existing = self.store.attendance(employer_id, employee_id, date).await?;
        let outcome = attendance::mark(
            existing,
            employer_id,
            employee_id,
            date,
            now,
            backfill,
            standard_hours,
        )?;

        let body = match outcome.transition {
            AttendanceTransition::LoggedIn => format!("Attendance login recorded for {date}"),
            AttendanceTransition::LoggedOut => format!(
                "Attendance complete for {date}: {:.2} hours",
                outcome.record.total_hours.unwrap_or_default()
            ),
            AttendanceTransition::Backfilled => format!(
                "Attendance backfilled for {date}: {:.2} hours",
                outcome.record.total_hours.unwrap_or_default()
            ),
        };
        let statement = Statement::new(employee_id, body, now);
        let delta = LedgerDelta {
            attendance: vec![outcome.record],
            ..Default::default()
        };
        Ok((delta, statement))
    }

    /// Redeems a linking token, creating the employment plus an empty
    /// wage shell. Re-scanning a code for an existing active employment
    /// returns the existing link unchanged.
    pub async fn establish_employment(
        &self,
        link_text: &str,
        employee_id: &str,
    ) -> Result<Employment> {
        let link = token::decode_link(link_text)?;
        if let Some(existing) = self.store.employment(&link.employer_id, employee_id).await? {
            if existing.is_active() {
                return Ok(existing);
            }
        }

        let now = Utc::now();
        let employment = Employment {
            employer_id: link.employer_id.clone(),
            employee_id: employee_id.to_string(),
            kind: link.kind,
            hours_per_day: link.config.map(|c| c.working_hours_per_day),
            days_per_month: link.config.map(|c| c.working_days_per_month),
            status: EmploymentStatus::Active,
            created_at: now,
        };

        let mut delta = LedgerDelta {
            employments: vec![employment.clone()],
            ..Default::default()
        };
        if self
            .store
            .wage_record(&link.employer_id, employee_id)
            .await?
            .is_none()
        {
            delta.wages.push(WageRecord {
                employer_id: link.employer_id.clone(),
                employee_id: employee_id.to_string(),
                monthly_wage: 0.0,
                currency: DEFAULT_CURRENCY.to_string(),
                hourly_rate: 0.0,
                last_payment_at: None,
                total_deductions: 0.0,
            });
        }

        let statement = Statement::new(
            employee_id,
            format!("Employment established with {}", link.contact),
            now,
        );
        self.store.commit(delta, statement).await?;

        self.notifier.publish(ChangeEvent {
            owner_id: link.employer_id.clone(),
            entity: EntityKind::Employment,
            summary: format!("employee {employee_id} linked"),
        });
        info!(employer = %link.employer_id, employee = employee_id, "employment established");
        Ok(employment)
    }

    /// Soft termination; the row stays for the ledger history.
    pub async fn terminate_employment(&self, employer_id: &str, employee_id: &str) -> Result<()> {
        let mut employment = self
            .store
            .employment(employer_id, employee_id)
            .await?
            .ok_or(LedgerError::NotFound("employment"))?;
        if !employment.is_active() {
            return Ok(());
        }
        employment.status = EmploymentStatus::Inactive;

        let now = Utc::now();
        let statement = Statement::new(
            employee_id,
            format!("Employment with {employer_id} terminated"),
            now,
        );
        let delta = LedgerDelta {
            employments: vec![employment],
            ..Default::default()
        };
        self.store.commit(delta, statement).await?;
        self.notifier.publish(ChangeEvent {
            owner_id: employer_id.to_string(),
            entity: EntityKind::Employment,
            summary: format!("employee {employee_id} terminated"),
        });
        Ok(())
    }

    /// Employer action: sets the monthly wage, deriving the part-time
    /// hourly rate from the employment configuration.
    pub async fn set_monthly_wage(
        &self,
        employer_id: &str,
        employee_id: &str,
        monthly_wage: f64,
        currency: &str,
    ) -> Result<WageRecord> {
        let employment = self
            .store
            .employment(employer_id, employee_id)
            .await?
            .ok_or(LedgerError::NotFound("employment"))?;

        let hourly_rate = match employment.kind {
            EmploymentKind::PartTime => {
                let hours = employment
                    .hours_per_day
                    .ok_or(LedgerError::InsufficientData("hours_per_day"))?;
                let days = employment
                    .days_per_month
                    .ok_or(LedgerError::InsufficientData("days_per_month"))?;
                payroll::monthly_hourly_rate(monthly_wage, hours, days)
            }
            EmploymentKind::FullTime | EmploymentKind::Contract => 0.0,
        };

        let mut wage = self
            .store
            .wage_record(employer_id, employee_id)
            .await?
            .unwrap_or_else(|| WageRecord {
                employer_id: employer_id.to_string(),
                employee_id: employee_id.to_string(),
                monthly_wage: 0.0,
                currency: currency.to_string(),
                hourly_rate: 0.0,
                last_payment_at: None,
                total_deductions: 0.0,
            });
        wage.monthly_wage = monthly_wage;
        wage.currency = currency.to_string();
        wage.hourly_rate = hourly_rate;

        let now = Utc::now();
        let statement = Statement::new(
            employee_id,
            format!("Monthly wage set to {monthly_wage:.2} {currency}"),
            now,
        );
        let delta = LedgerDelta {
            wages: vec![wage.clone()],
            ..Default::default()
        };
        self.store.commit(delta, statement).await?;
        self.notifier.publish(ChangeEvent {
            owner_id: employee_id.to_string(),
            entity: EntityKind::Wage,
            summary: format!("wage set to {monthly_wage:.2} {currency}"),
        });
        Ok(wage)
    }

    /// Employer action: appends a merit, demerit or advance line to the
    /// bonus ledger. Loan deductions are ledger-generated during wage
    /// payment and cannot be entered by hand.
    pub async fn record_bonus(
        &self,
        employer_id: &str,
        employee_id: &str,
        category: BonusCategory,
        amount: f64,
        note: Option<String>,
    ) -> Result<BonusEntry> {
        if category == BonusCategory::LoanDeduction {
            return Err(LedgerError::ConsistencyViolation(
                "loan deductions are generated during wage payment".to_string(),
            ));
        }
        if amount <= 0.0 {
            return Err(LedgerError::InsufficientData("amount"));
        }
        self.store
            .employment(employer_id, employee_id)
            .await?
            .ok_or(LedgerError::NotFound("employment"))?;

        let now = Utc::now();
        let entry = BonusEntry {
            id: Uuid::new_v4().to_string(),
            employer_id: employer_id.to_string(),
            employee_id: employee_id.to_string(),
            category,
            amount,
            note,
            created_at: now,
        };
        let statement = Statement::new(
            employee_id,
            format!("{category} entry of {amount:.2} recorded"),
            now,
        );
        let delta = LedgerDelta {
            bonuses: vec![entry.clone()],
            ..Default::default()
        };
        self.store.commit(delta, statement).await?;
        self.notifier.publish(ChangeEvent {
            owner_id: employee_id.to_string(),
            entity: EntityKind::Bonus,
            summary: format!("{category} of {amount:.2}"),
        });
        Ok(entry)
    }

    /// Read-time attendance status: a stored row wins, a missing row for
    /// a past date reads as absent, today and the future have no status
    /// yet.
    pub async fn attendance_status(
        &self,
        employer_id: &str,
        employee_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceStatus>> {
        let existing = self.store.attendance(employer_id, employee_id, date).await?;
        Ok(attendance::derived_status(
            existing.as_ref(),
            date,
            Utc::now().date_naive(),
        ))
    }

    /// Employee action: records leave or sick leave for a date. Bypasses
    /// the token path, emits no statement, and wins over any present row
    /// for the same date.
    pub async fn submit_leave(
        &self,
        employer_id: &str,
        employee_id: &str,
        date: NaiveDate,
        kind: LeaveKind,
    ) -> Result<AttendanceRecord> {
        self.store
            .employment(employer_id, employee_id)
            .await?
            .ok_or(LedgerError::NotFound("employment"))?;
        let record = attendance::record_leave(employer_id, employee_id, date, kind);
        self.store.put_attendance(&record).await?;
        self.notifier.publish(ChangeEvent {
            owner_id: employer_id.to_string(),
            entity: EntityKind::Attendance,
            summary: format!("{} marked {} for {date}", employee_id, record.status),
        });
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttendanceStatus, TxStatus};
    use crate::store::MemoryStore;

    const EMPLOYER: &str = "emp-1";
    const EMPLOYEE: &str = "worker-9";

    fn orchestrator() -> (Arc<MemoryStore>, LedgerOrchestrator) {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = LedgerOrchestrator::new(store.clone(), ChangeNotifier::new(16));
        (store, orchestrator)
    }

    async fn linked_full_time(orchestrator: &LedgerOrchestrator) {
        orchestrator
            .establish_employment("employer:emp-1:boss@acme.example", EMPLOYEE)
            .await
            .unwrap();
        orchestrator
            .set_monthly_wage(EMPLOYER, EMPLOYEE, 2000.0, "USD")
            .await
            .unwrap();
    }

    async fn issue(
        orchestrator: &LedgerOrchestrator,
        kind: TxKind,
        metadata: TxMetadata,
    ) -> String {
        orchestrator
            .registry()
            .create(
                kind,
                EMPLOYER,
                TokenSubject::Employee(EMPLOYEE.into()),
                metadata,
                None,
            )
            .await
            .unwrap()
            .token
    }

    #[tokio::test]
    async fn linking_creates_employment_and_wage_shell() {
        let (store, orchestrator) = orchestrator();
        let employment = orchestrator
            .establish_employment("employer:emp-1:boss@acme.example", EMPLOYEE)
            .await
            .unwrap();
        assert_eq!(employment.kind, EmploymentKind::FullTime);
        assert!(employment.is_active());
        assert!(store.wage_record(EMPLOYER, EMPLOYEE).await.unwrap().is_some());
        assert_eq!(store.statements_for(EMPLOYEE).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn part_time_link_carries_config_into_hourly_rate() {
        let (_store, orchestrator) = orchestrator();
        let config = urlencoding::encode(
            r#"{"workingHoursPerDay":8.0,"workingDaysPerMonth":22.0}"#,
        )
        .into_owned();
        orchestrator
            .establish_employment(
                &format!("employer:emp-1:boss@acme.example:part_time:{config}"),
                EMPLOYEE,
            )
            .await
            .unwrap();
        let wage = orchestrator
            .set_monthly_wage(EMPLOYER, EMPLOYEE, 2000.0, "USD")
            .await
            .unwrap();
        assert!((wage.hourly_rate - 2000.0 / 176.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn pay_wages_stamps_record_and_emits_one_statement() {
        let (store, orchestrator) = orchestrator();
        linked_full_time(&orchestrator).await;
        let before = store.statements_for(EMPLOYEE).await.unwrap().len();

        let token = issue(&orchestrator, TxKind::PayWages, TxMetadata::PayWages).await;
        let statement = orchestrator.redeem_and_apply(&token, EMPLOYEE).await.unwrap();
        assert!(statement.body.contains("2000.00 USD"));

        let wage = store.wage_record(EMPLOYER, EMPLOYEE).await.unwrap().unwrap();
        assert!(wage.last_payment_at.is_some());

        // Redeeming the same text again loses the claim and must not
        // produce a second statement.
        assert!(matches!(
            orchestrator.redeem_and_apply(&token, EMPLOYEE).await,
            Err(LedgerError::AlreadyRedeemed)
        ));
        let statements = store.statements_for(EMPLOYEE).await.unwrap();
        assert_eq!(statements.len(), before + 1);

        let tx = store.transaction_by_token(&token).await.unwrap().unwrap();
        assert_eq!(tx.status, TxStatus::Completed);
    }

    #[tokio::test]
    async fn grant_loan_computes_tenure_and_wage_payment_amortizes_it() {
        let (store, orchestrator) = orchestrator();
        linked_full_time(&orchestrator).await;

        let token = issue(
            &orchestrator,
            TxKind::GrantLoan,
            TxMetadata::GrantLoan {
                principal: 1000.0,
                interest_rate: 10.0,
                monthly_deduction: 110.0,
            },
        )
        .await;
        orchestrator.redeem_and_apply(&token, EMPLOYEE).await.unwrap();

        let loans = store.loans(EMPLOYER, EMPLOYEE).await.unwrap();
        assert_eq!(loans.len(), 1);
        assert_eq!(loans[0].total_amount, 1100.0);
        assert_eq!(loans[0].tenure_months, 10);
        assert_eq!(loans[0].outstanding(), 1100.0);

        let token = issue(&orchestrator, TxKind::PayWages, TxMetadata::PayWages).await;
        let statement = orchestrator.redeem_and_apply(&token, EMPLOYEE).await.unwrap();
        // 2000 - 110 installment.
        assert!(statement.body.contains("1890.00"));

        let loans = store.loans(EMPLOYER, EMPLOYEE).await.unwrap();
        assert_eq!(loans[0].remaining_amount, Some(990.0));
        let deductions = store
            .bonus_entries_since(EMPLOYER, EMPLOYEE, None)
            .await
            .unwrap();
        assert_eq!(deductions.len(), 1);
        assert_eq!(deductions[0].category, BonusCategory::LoanDeduction);
        assert_eq!(deductions[0].amount, 110.0);
    }

    #[tokio::test]
    async fn part_time_payment_pays_attendance_hours_exactly_once() {
        let (store, orchestrator) = orchestrator();

        // Seed a month-old part-time employment directly so a day
        // backfilled yesterday falls inside the first pay period.
        let created = Utc::now() - chrono::Duration::days(30);
        let delta = LedgerDelta {
            employments: vec![Employment {
                employer_id: EMPLOYER.into(),
                employee_id: EMPLOYEE.into(),
                kind: EmploymentKind::PartTime,
                hours_per_day: Some(8.0),
                days_per_month: Some(22.0),
                status: EmploymentStatus::Active,
                created_at: created,
            }],
            wages: vec![WageRecord {
                employer_id: EMPLOYER.into(),
                employee_id: EMPLOYEE.into(),
                monthly_wage: 1760.0,
                currency: "USD".into(),
                hourly_rate: 10.0,
                last_payment_at: None,
                total_deductions: 0.0,
            }],
            ..Default::default()
        };
        store
            .commit(delta, Statement::new(EMPLOYEE, "Employment established", created))
            .await
            .unwrap();

        let yesterday = Utc::now().date_naive().pred_opt().unwrap();
        let tx = orchestrator
            .registry()
            .create(
                TxKind::MarkAttendance,
                EMPLOYER,
                TokenSubject::Universal,
                TxMetadata::MarkAttendance,
                Some(yesterday),
            )
            .await
            .unwrap();
        orchestrator.redeem_and_apply(&tx.token, EMPLOYEE).await.unwrap();

        // 8 hours at the 10.00 hourly rate.
        let token = issue(&orchestrator, TxKind::PayWages, TxMetadata::PayWages).await;
        let statement = orchestrator.redeem_and_apply(&token, EMPLOYEE).await.unwrap();
        assert!(
            statement.body.contains("80.00 USD"),
            "unexpected statement: {}",
            statement.body
        );

        // No new attendance since the payment: those hours are spent
        // and must not be paid again.
        let token = issue(&orchestrator, TxKind::PayWages, TxMetadata::PayWages).await;
        let statement = orchestrator.redeem_and_apply(&token, EMPLOYEE).await.unwrap();
        assert!(
            statement.body.contains("0.00 USD"),
            "unexpected statement: {}",
            statement.body
        );
    }

    #[tokio::test]
    async fn bonus_ledger_feeds_net_payable() {
        let (_, orchestrator) = orchestrator();
        linked_full_time(&orchestrator).await;
        orchestrator
            .record_bonus(EMPLOYER, EMPLOYEE, BonusCategory::Merit, 100.0, None)
            .await
            .unwrap();
        orchestrator
            .record_bonus(EMPLOYER, EMPLOYEE, BonusCategory::Demerit, 30.0, None)
            .await
            .unwrap();

        let token = issue(&orchestrator, TxKind::PayWages, TxMetadata::PayWages).await;
        let statement = orchestrator.redeem_and_apply(&token, EMPLOYEE).await.unwrap();
        assert!(statement.body.contains("2070.00"));
    }

    #[tokio::test]
    async fn foreclose_zeroes_selected_loans_and_is_terminal() {
        let (store, orchestrator) = orchestrator();
        linked_full_time(&orchestrator).await;
        let token = issue(
            &orchestrator,
            TxKind::GrantLoan,
            TxMetadata::GrantLoan {
                principal: 1000.0,
                interest_rate: 10.0,
                monthly_deduction: 110.0,
            },
        )
        .await;
        orchestrator.redeem_and_apply(&token, EMPLOYEE).await.unwrap();
        let loan_id = store.loans(EMPLOYER, EMPLOYEE).await.unwrap()[0].id.clone();

        let token = issue(
            &orchestrator,
            TxKind::ForecloseLoan,
            TxMetadata::ForecloseLoan {
                loan_ids: vec![loan_id.clone()],
            },
        )
        .await;
        let statement = orchestrator.redeem_and_apply(&token, EMPLOYEE).await.unwrap();
        assert!(statement.body.contains("1100.00"));

        let loan = store.loans(EMPLOYER, EMPLOYEE).await.unwrap().remove(0);
        assert_eq!(loan.remaining_amount, Some(0.0));
        assert_eq!(loan.status, LoanStatus::Foreclosed);

        // A second foreclosure token for the same loan finds no active
        // subset; the balance can never go negative.
        let token = issue(
            &orchestrator,
            TxKind::ForecloseLoan,
            TxMetadata::ForecloseLoan {
                loan_ids: vec![loan_id],
            },
        )
        .await;
        assert!(matches!(
            orchestrator.redeem_and_apply(&token, EMPLOYEE).await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn settle_closes_every_active_loan() {
        let (store, orchestrator) = orchestrator();
        linked_full_time(&orchestrator).await;
        for _ in 0..2 {
            let token = issue(
                &orchestrator,
                TxKind::GrantLoan,
                TxMetadata::GrantLoan {
                    principal: 500.0,
                    interest_rate: 0.0,
                    monthly_deduction: 50.0,
                },
            )
            .await;
            orchestrator.redeem_and_apply(&token, EMPLOYEE).await.unwrap();
        }

        let token = issue(&orchestrator, TxKind::SettleLoan, TxMetadata::SettleLoan).await;
        orchestrator.redeem_and_apply(&token, EMPLOYEE).await.unwrap();

        for loan in store.loans(EMPLOYER, EMPLOYEE).await.unwrap() {
            assert_eq!(loan.status, LoanStatus::Paid);
            assert_eq!(loan.remaining_amount, Some(0.0));
        }
    }

    #[tokio::test]
    async fn contract_payment_is_flat_and_stamps_wage_row() {
        let (store, orchestrator) = orchestrator();
        orchestrator
            .establish_employment("employer:emp-1:boss@acme.example:contract", EMPLOYEE)
            .await
            .unwrap();

        let token = issue(
            &orchestrator,
            TxKind::PayContractWages,
            TxMetadata::PayContractWages {
                amount: 750.0,
                currency: "EUR".into(),
            },
        )
        .await;
        let statement = orchestrator.redeem_and_apply(&token, EMPLOYEE).await.unwrap();
        assert!(statement.body.contains("750.00 EUR"));
        let wage = store.wage_record(EMPLOYER, EMPLOYEE).await.unwrap().unwrap();
        assert!(wage.last_payment_at.is_some());
    }

    #[tokio::test]
    async fn universal_attendance_token_logs_in_then_out() {
        let (store, orchestrator) = orchestrator();
        linked_full_time(&orchestrator).await;

        let first = orchestrator
            .registry()
            .create(
                TxKind::MarkAttendance,
                EMPLOYER,
                TokenSubject::Universal,
                TxMetadata::MarkAttendance,
                None,
            )
            .await
            .unwrap();
        let statement = orchestrator
            .redeem_and_apply(&first.token, EMPLOYEE)
            .await
            .unwrap();
        assert!(statement.body.contains("login recorded"));

        let second = orchestrator
            .registry()
            .create(
                TxKind::MarkAttendance,
                EMPLOYER,
                TokenSubject::Universal,
                TxMetadata::MarkAttendance,
                None,
            )
            .await
            .unwrap();
        let statement = orchestrator
            .redeem_and_apply(&second.token, EMPLOYEE)
            .await
            .unwrap();
        assert!(statement.body.contains("Attendance complete"));

        let today = Utc::now().date_naive();
        let record = store
            .attendance(EMPLOYER, EMPLOYEE, today)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, AttendanceStatus::PresentComplete);

        // A third scan of the day must fail and leave no extra statement.
        let before = store.statements_for(EMPLOYEE).await.unwrap().len();
        let third = orchestrator
            .registry()
            .create(
                TxKind::MarkAttendance,
                EMPLOYER,
                TokenSubject::Universal,
                TxMetadata::MarkAttendance,
                None,
            )
            .await
            .unwrap();
        assert!(matches!(
            orchestrator.redeem_and_apply(&third.token, EMPLOYEE).await,
            Err(LedgerError::AlreadyComplete(_))
        ));
        assert_eq!(store.statements_for(EMPLOYEE).await.unwrap().len(), before);
    }

    #[tokio::test]
    async fn backfill_token_writes_a_complete_day() {
        let (store, orchestrator) = orchestrator();
        linked_full_time(&orchestrator).await;
        let date = NaiveDate::from_ymd_opt(2026, 2, 3).unwrap();

        let tx = orchestrator
            .registry()
            .create(
                TxKind::MarkAttendance,
                EMPLOYER,
                TokenSubject::Universal,
                TxMetadata::MarkAttendance,
                Some(date),
            )
            .await
            .unwrap();
        orchestrator.redeem_and_apply(&tx.token, EMPLOYEE).await.unwrap();

        let record = store
            .attendance(EMPLOYER, EMPLOYEE, date)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, AttendanceStatus::PresentComplete);
        assert_eq!(record.total_hours, Some(DEFAULT_HOURS_PER_DAY));
    }

    #[tokio::test]
    async fn leave_wins_over_attendance_tokens() {
        let (_, orchestrator) = orchestrator();
        linked_full_time(&orchestrator).await;
        let today = Utc::now().date_naive();
        orchestrator
            .submit_leave(EMPLOYER, EMPLOYEE, today, LeaveKind::Leave)
            .await
            .unwrap();

        let tx = orchestrator
            .registry()
            .create(
                TxKind::MarkAttendance,
                EMPLOYER,
                TokenSubject::Universal,
                TxMetadata::MarkAttendance,
                None,
            )
            .await
            .unwrap();
        assert!(matches!(
            orchestrator.redeem_and_apply(&tx.token, EMPLOYEE).await,
            Err(LedgerError::ConsistencyViolation(_))
        ));
    }

    #[tokio::test]
    async fn terminate_is_soft_and_idempotent() {
        let (store, orchestrator) = orchestrator();
        linked_full_time(&orchestrator).await;
        orchestrator
            .terminate_employment(EMPLOYER, EMPLOYEE)
            .await
            .unwrap();
        let employment = store.employment(EMPLOYER, EMPLOYEE).await.unwrap().unwrap();
        assert_eq!(employment.status, EmploymentStatus::Inactive);
        orchestrator
            .terminate_employment(EMPLOYER, EMPLOYEE)
            .await
            .unwrap();
    }
}
