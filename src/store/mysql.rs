//! MySQL-backed store. Queries are runtime-bound; `commit` wraps the
//! whole delta plus its statement in one database transaction, and
//! `claim_transaction` relies on a conditional UPDATE for the
//! pending -> completed race.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

use crate::error::{LedgerError, Result};
use crate::model::{
    AttendanceRecord, BonusEntry, Employment, Loan, Statement, TokenSubject, Transaction,
    TxStatus, WageRecord,
};

use super::{LedgerDelta, LedgerStore};

pub struct MySqlStore {
    pool: MySqlPool,
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS employments (
        employer_id     VARCHAR(64)  NOT NULL,
        employee_id     VARCHAR(64)  NOT NULL,
        kind            VARCHAR(16)  NOT NULL,
        hours_per_day   DOUBLE       NULL,
        days_per_month  DOUBLE       NULL,
        status          VARCHAR(16)  NOT NULL,
        created_at      DATETIME(3)  NOT NULL,
        PRIMARY KEY (employer_id, employee_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS wage_records (
        employer_id      VARCHAR(64)  NOT NULL,
        employee_id      VARCHAR(64)  NOT NULL,
        monthly_wage     DOUBLE       NOT NULL,
        currency         VARCHAR(8)   NOT NULL,
        hourly_rate      DOUBLE       NOT NULL,
        last_payment_at  DATETIME(3)  NULL,
        total_deductions DOUBLE       NOT NULL,
        PRIMARY KEY (employer_id, employee_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS loans (
        id               VARCHAR(64)  NOT NULL PRIMARY KEY,
        employer_id      VARCHAR(64)  NOT NULL,
        employee_id      VARCHAR(64)  NOT NULL,
        principal        DOUBLE       NOT NULL,
        interest_rate    DOUBLE       NOT NULL,
        total_amount     DOUBLE       NOT NULL,
        remaining_amount DOUBLE       NULL,
        monthly_deduction DOUBLE      NOT NULL,
        tenure_months    INT UNSIGNED NOT NULL,
        status           VARCHAR(16)  NOT NULL,
        created_at       DATETIME(3)  NOT NULL,
        KEY idx_loans_pair (employer_id, employee_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS bonus_entries (
        id          VARCHAR(64)  NOT NULL PRIMARY KEY,
        employer_id VARCHAR(64)  NOT NULL,
        employee_id VARCHAR(64)  NOT NULL,
        category    VARCHAR(16)  NOT NULL,
        amount      DOUBLE       NOT NULL,
        note        VARCHAR(255) NULL,
        created_at  DATETIME(3)  NOT NULL,
        KEY idx_bonus_pair (employer_id, employee_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS attendance_records (
        employer_id VARCHAR(64)  NOT NULL,
        employee_id VARCHAR(64)  NOT NULL,
        date        DATE         NOT NULL,
        status      VARCHAR(24)  NOT NULL,
        login_time  DATETIME(3)  NULL,
        logout_time DATETIME(3)  NULL,
        total_hours DOUBLE       NULL,
        PRIMARY KEY (employer_id, employee_id, date)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        token        VARCHAR(255) NOT NULL PRIMARY KEY,
        kind         VARCHAR(24)  NOT NULL,
        status       VARCHAR(16)  NOT NULL,
        employer_id  VARCHAR(64)  NOT NULL,
        subject      VARCHAR(64)  NOT NULL,
        metadata     TEXT         NOT NULL,
        date         DATE         NULL,
        created_at   DATETIME(3)  NOT NULL,
        completed_at DATETIME(3)  NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS statements (
        id         VARCHAR(64)  NOT NULL PRIMARY KEY,
        owner_id   VARCHAR(64)  NOT NULL,
        body       TEXT         NOT NULL,
        `read`     BOOLEAN      NOT NULL,
        created_at DATETIME(3)  NOT NULL,
        KEY idx_statements_owner (owner_id)
    )
    "#,
];

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates the ledger tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        for ddl in SCHEMA {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn transaction_from_row(row: &MySqlRow) -> Result<Transaction> {
    let subject: String = row.try_get("subject")?;
    let metadata_raw: String = row.try_get("metadata")?;
    let metadata = serde_json::from_str(&metadata_raw).map_err(|e| {
        LedgerError::ConsistencyViolation(format!("undecodable transaction metadata: {e}"))
    })?;
    Ok(Transaction {
        token: row.try_get("token")?,
        kind: row.try_get("kind")?,
        status: row.try_get("status")?,
        employer_id: row.try_get("employer_id")?,
        subject: TokenSubject::parse(&subject),
        metadata,
        date: row.try_get::<Option<NaiveDate>, _>("date")?,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get::<Option<DateTime<Utc>>, _>("completed_at")?,
    })
}

#[async_trait]
impl LedgerStore for MySqlStore {
    async fn employment(
        &self,
        employer_id: &str,
        employee_id: &str,
    ) -> Result<Option<Employment>> {
        let employment = sqlx::query_as::<_, Employment>(
            r#"
            SELECT employer_id, employee_id, kind, hours_per_day, days_per_month, status, created_at
            FROM employments
            WHERE employer_id = ? AND employee_id = ?
            "#,
        )
        .bind(employer_id)
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(employment)
    }

    async fn wage_record(
        &self,
        employer_id: &str,
        employee_id: &str,
    ) -> Result<Option<WageRecord>> {
        let wage = sqlx::query_as::<_, WageRecord>(
            r#"
            SELECT employer_id, employee_id, monthly_wage, currency, hourly_rate,
                   last_payment_at, total_deductions
            FROM wage_records
            WHERE employer_id = ? AND employee_id = ?
            "#,
        )
        .bind(employer_id)
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(wage)
    }

    async fn loans(&self, employer_id: &str, employee_id: &str) -> Result<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT id, employer_id, employee_id, principal, interest_rate, total_amount,
                   remaining_amount, monthly_deduction, tenure_months, status, created_at
            FROM loans
            WHERE employer_id = ? AND employee_id = ?
            ORDER BY created_at
            "#,
        )
        .bind(employer_id)
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    async fn bonus_entries_since(
        &self,
        employer_id: &str,
        employee_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<BonusEntry>> {
        let entries = sqlx::query_as::<_, BonusEntry>(
            r#"
            SELECT id, employer_id, employee_id, category, amount, note, created_at
            FROM bonus_entries
            WHERE employer_id = ? AND employee_id = ?
              AND (? IS NULL OR created_at > ?)
            ORDER BY created_at
            "#,
        )
        .bind(employer_id)
        .bind(employee_id)
        .bind(since)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn attendance(
        &self,
        employer_id: &str,
        employee_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>> {
        let record = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT employer_id, employee_id, date, status, login_time, logout_time, total_hours
            FROM attendance_records
            WHERE employer_id = ? AND employee_id = ? AND date = ?
            "#,
        )
        .bind(employer_id)
        .bind(employee_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn attendance_between(
        &self,
        employer_id: &str,
        employee_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>> {
        let records = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT employer_id, employee_id, date, status, login_time, logout_time, total_hours
            FROM attendance_records
            WHERE employer_id = ? AND employee_id = ? AND date BETWEEN ? AND ?
            ORDER BY date
            "#,
        )
        .bind(employer_id)
        .bind(employee_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn put_attendance(&self, record: &AttendanceRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO attendance_records
                (employer_id, employee_id, date, status, login_time, logout_time, total_hours)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                status = VALUES(status),
                login_time = VALUES(login_time),
                logout_time = VALUES(logout_time),
                total_hours = VALUES(total_hours)
            "#,
        )
        .bind(&record.employer_id)
        .bind(&record.employee_id)
        .bind(record.date)
        .bind(record.status)
        .bind(record.login_time)
        .bind(record.logout_time)
        .bind(record.total_hours)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_transaction(&self, transaction: &Transaction) -> Result<()> {
        let metadata = serde_json::to_string(&transaction.metadata).map_err(|e| {
            LedgerError::ConsistencyViolation(format!("unencodable transaction metadata: {e}"))
        })?;
        sqlx::query(
            r#"
            INSERT INTO transactions
                (token, kind, status, employer_id, subject, metadata, date, created_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&transaction.token)
        .bind(transaction.kind)
        .bind(transaction.status)
        .bind(&transaction.employer_id)
        .bind(transaction.subject.as_str())
        .bind(metadata)
        .bind(transaction.date)
        .bind(transaction.created_at)
        .bind(transaction.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn transaction_by_token(&self, token: &str) -> Result<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            SELECT token, kind, status, employer_id, subject, metadata, date,
                   created_at, completed_at
            FROM transactions
            WHERE token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn claim_transaction(&self, token: &str, completed_at: DateTime<Utc>) -> Result<bool> {
        // The WHERE status = 'pending' clause is the compare half of the
        // compare-and-swap; MySQL serializes the row update.
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = ?, completed_at = ?
            WHERE token = ? AND status = ?
            "#,
        )
        .bind(TxStatus::Completed)
        .bind(completed_at)
        .bind(token)
        .bind(TxStatus::Pending)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn commit(&self, delta: LedgerDelta, statement: Statement) -> Result<()> {
        let mut db_tx = self.pool.begin().await?;

        for employment in &delta.employments {
            sqlx::query(
                r#"
                INSERT INTO employments
                    (employer_id, employee_id, kind, hours_per_day, days_per_month, status, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON DUPLICATE KEY UPDATE
                    kind = VALUES(kind),
                    hours_per_day = VALUES(hours_per_day),
                    days_per_month = VALUES(days_per_month),
                    status = VALUES(status)
                "#,
            )
            .bind(&employment.employer_id)
            .bind(&employment.employee_id)
            .bind(employment.kind)
            .bind(employment.hours_per_day)
            .bind(employment.days_per_month)
            .bind(employment.status)
            .bind(employment.created_at)
            .execute(&mut *db_tx)
            .await?;
        }

        for wage in &delta.wages {
            sqlx::query(
                r#"
                INSERT INTO wage_records
                    (employer_id, employee_id, monthly_wage, currency, hourly_rate,
                     last_payment_at, total_deductions)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON DUPLICATE KEY UPDATE
                    monthly_wage = VALUES(monthly_wage),
                    currency = VALUES(currency),
                    hourly_rate = VALUES(hourly_rate),
                    last_payment_at = VALUES(last_payment_at),
                    total_deductions = VALUES(total_deductions)
                "#,
            )
            .bind(&wage.employer_id)
            .bind(&wage.employee_id)
            .bind(wage.monthly_wage)
            .bind(&wage.currency)
            .bind(wage.hourly_rate)
            .bind(wage.last_payment_at)
            .bind(wage.total_deductions)
            .execute(&mut *db_tx)
            .await?;
        }

        for loan in &delta.loans {
            sqlx::query(
                r#"
                INSERT INTO loans
                    (id, employer_id, employee_id, principal, interest_rate, total_amount,
                     remaining_amount, monthly_deduction, tenure_months, status, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON DUPLICATE KEY UPDATE
                    remaining_amount = VALUES(remaining_amount),
                    status = VALUES(status)
                "#,
            )
            .bind(&loan.id)
            .bind(&loan.employer_id)
            .bind(&loan.employee_id)
            .bind(loan.principal)
            .bind(loan.interest_rate)
            .bind(loan.total_amount)
            .bind(loan.remaining_amount)
            .bind(loan.monthly_deduction)
            .bind(loan.tenure_months)
            .bind(loan.status)
            .bind(loan.created_at)
            .execute(&mut *db_tx)
            .await?;
        }

        for bonus in &delta.bonuses {
            sqlx::query(
                r#"
                INSERT INTO bonus_entries
                    (id, employer_id, employee_id, category, amount, note, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&bonus.id)
            .bind(&bonus.employer_id)
            .bind(&bonus.employee_id)
            .bind(bonus.category)
            .bind(bonus.amount)
            .bind(&bonus.note)
            .bind(bonus.created_at)
            .execute(&mut *db_tx)
            .await?;
        }

        for record in &delta.attendance {
            sqlx::query(
                r#"
                INSERT INTO attendance_records
                    (employer_id, employee_id, date, status, login_time, logout_time, total_hours)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON DUPLICATE KEY UPDATE
                    status = VALUES(status),
                    login_time = VALUES(login_time),
                    logout_time = VALUES(logout_time),
                    total_hours = VALUES(total_hours)
                "#,
            )
            .bind(&record.employer_id)
            .bind(&record.employee_id)
            .bind(record.date)
            .bind(record.status)
            .bind(record.login_time)
            .bind(record.logout_time)
            .bind(record.total_hours)
            .execute(&mut *db_tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO statements (id, owner_id, body, `read`, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&statement.id)
        .bind(&statement.owner_id)
        .bind(&statement.body)
        .bind(statement.read)
        .bind(statement.created_at)
        .execute(&mut *db_tx)
        .await?;

        db_tx.commit().await?;
        Ok(())
    }

    async fn statements_for(&self, owner_id: &str) -> Result<Vec<Statement>> {
        let statements = sqlx::query_as::<_, Statement>(
            r#"
            SELECT id, owner_id, body, `read`, created_at
            FROM statements
            WHERE owner_id = ?
            ORDER BY created_at
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(statements)
    }

    async fn mark_statement_read(&self, statement_id: &str) -> Result<()> {
        sqlx::query("UPDATE statements SET `read` = TRUE WHERE id = ?")
            .bind(statement_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
