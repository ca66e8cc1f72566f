use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One mutable wage row per (employer, employee) pair.
///
/// `hourly_rate` is derived for part-time employments as
/// `monthly_wage / (hours_per_day * days_per_month)` and is zero for
/// full-time and contract.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WageRecord {
    pub employer_id: String,
    pub employee_id: String,
    pub monthly_wage: f64,
    pub currency: String,
    pub hourly_rate: f64,
    pub last_payment_at: Option<DateTime<Utc>>,
    pub total_deductions: f64,
}
