use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum EmploymentKind {
    FullTime,
    PartTime,
    Contract,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum EmploymentStatus {
    Active,
    Inactive,
}

/// Link between an employer and an employee, created when a linking
/// token is redeemed. Removal soft-terminates; rows are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Employment {
    pub employer_id: String,
    pub employee_id: String,
    pub kind: EmploymentKind,
    /// Part-time only; `None` for full-time and contract.
    pub hours_per_day: Option<f64>,
    /// Part-time only.
    pub days_per_month: Option<f64>,
    pub status: EmploymentStatus,
    pub created_at: DateTime<Utc>,
}

impl Employment {
    pub fn is_active(&self) -> bool {
        self.status == EmploymentStatus::Active
    }
}
