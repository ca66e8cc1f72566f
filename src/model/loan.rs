use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum LoanStatus {
    Active,
    Paid,
    Foreclosed,
}

/// An employer-granted loan repaid through monthly wage deductions.
///
/// `remaining_amount` only ever decreases; once it reaches zero the
/// status becomes terminal (`Paid` or `Foreclosed`) and is never reopened.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Loan {
    pub id: String,
    pub employer_id: String,
    pub employee_id: String,
    pub principal: f64,
    /// Flat interest in percent.
    pub interest_rate: f64,
    /// `principal * (1 + interest_rate / 100)`.
    pub total_amount: f64,
    /// Unset means nothing repaid yet; readers fall back to `total_amount`.
    pub remaining_amount: Option<f64>,
    pub monthly_deduction: f64,
    pub tenure_months: u32,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
}

impl Loan {
    pub fn outstanding(&self) -> f64 {
        self.remaining_amount.unwrap_or(self.total_amount)
    }

    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }
}
