use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum BonusCategory {
    Merit,
    Demerit,
    Advance,
    LoanDeduction,
}

impl BonusCategory {
    /// Merit and advance add to the payable amount; demerit and
    /// loan_deduction subtract from it.
    pub fn sign(&self) -> f64 {
        match self {
            BonusCategory::Merit | BonusCategory::Advance => 1.0,
            BonusCategory::Demerit | BonusCategory::LoanDeduction => -1.0,
        }
    }
}

/// A signed line in the append-only bonus ledger. Never edited after
/// creation; pay-period totals are reproducible from these rows alone.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BonusEntry {
    pub id: String,
    pub employer_id: String,
    pub employee_id: String,
    pub category: BonusCategory,
    pub amount: f64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}
