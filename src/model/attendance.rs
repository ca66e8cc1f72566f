use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AttendanceStatus {
    /// Derived at read time only (no row for a past date); never stored.
    Absent,
    PresentPending,
    PresentComplete,
    Leave,
    SickLeave,
}

/// Daily attendance row, keyed by (employer, employee, date).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub employer_id: String,
    pub employee_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub login_time: Option<DateTime<Utc>>,
    pub logout_time: Option<DateTime<Utc>>,
    /// `logout_time - login_time`, in hours with fractional minutes.
    pub total_hours: Option<f64>,
}
