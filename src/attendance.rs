//! Attendance tracker: the state machine for one (employer, employee,
//! date) cell. `absent` is a derived reading for past dates with no row
//! and is never materialized, so nothing has to backfill every date for
//! every employee.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::error::{LedgerError, Result};
use crate::model::{AttendanceRecord, AttendanceStatus};

/// Backfilled days synthesize a login at this wall-clock hour.
const BACKFILL_LOGIN_HOUR: i64 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceTransition {
    /// First mark of the day: absent -> present_pending.
    LoggedIn,
    /// Second mark of the day: present_pending -> present_complete.
    LoggedOut,
    /// Explicit-date token wrote a present_complete day directly.
    Backfilled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveKind {
    Leave,
    SickLeave,
}

#[derive(Debug, Clone)]
pub struct MarkOutcome {
    pub record: AttendanceRecord,
    pub transition: AttendanceTransition,
}

/// Read-time status for a date. A missing row only means `Absent` once
/// the date has passed; for today and future dates there is no status
/// yet.
pub fn derived_status(
    existing: Option<&AttendanceRecord>,
    date: NaiveDate,
    today: NaiveDate,
) -> Option<AttendanceStatus> {
    match existing {
        Some(record) => Some(record.status),
        None if date < today => Some(AttendanceStatus::Absent),
        None => None,
    }
}

/// Applies one token-driven attendance mark.
///
/// Employee-submitted leave states always win over token marks: a mark
/// against a `leave`/`sick_leave` day is rejected, and a day that is
/// already `present_complete` fails with `AlreadyComplete`.
pub fn mark(
    existing: Option<AttendanceRecord>,
    employer_id: &str,
    employee_id: &str,
    date: NaiveDate,
    now: DateTime<Utc>,
    backfill: bool,
    standard_hours: f64,
) -> Result<MarkOutcome> {
    match existing {
        Some(record) => match record.status {
            AttendanceStatus::PresentComplete => Err(LedgerError::AlreadyComplete(date)),
            AttendanceStatus::Leave | AttendanceStatus::SickLeave => {
                Err(LedgerError::ConsistencyViolation(format!(
                    "{date} is already marked {} for {employee_id}",
                    record.status
                )))
            }
            AttendanceStatus::PresentPending => {
                let login = record.login_time.ok_or_else(|| {
                    LedgerError::ConsistencyViolation(format!(
                        "present_pending row for {date} has no login time"
                    ))
                })?;
                // A dated token closing a half-open old day gets its
                // logout synthesized on that day; stamping redemption
                // time would span days.
                let (logout, total_hours, transition) = if backfill {
                    let logout = login + Duration::seconds((standard_hours * 3600.0) as i64);
                    (logout, standard_hours, AttendanceTransition::Backfilled)
                } else {
                    let worked = (now - login).num_seconds() as f64 / 3600.0;
                    (now, worked, AttendanceTransition::LoggedOut)
                };
                Ok(MarkOutcome {
                    record: AttendanceRecord {
                        status: AttendanceStatus::PresentComplete,
                        logout_time: Some(logout),
                        total_hours: Some(total_hours),
                        ..record
                    },
                    transition,
                })
            }
            // Absent is derived, never stored.
            AttendanceStatus::Absent => Err(LedgerError::ConsistencyViolation(format!(
                "stored absent row for {date}"
            ))),
        },
        None if backfill => {
            let login = date.and_time(NaiveTime::MIN).and_utc()
                + Duration::hours(BACKFILL_LOGIN_HOUR);
            let logout = login + Duration::seconds((standard_hours * 3600.0) as i64);
            Ok(MarkOutcome {
                record: AttendanceRecord {
                    employer_id: employer_id.to_string(),
                    employee_id: employee_id.to_string(),
                    date,
                    status: AttendanceStatus::PresentComplete,
                    login_time: Some(login),
                    logout_time: Some(logout),
                    total_hours: Some(standard_hours),
                },
                transition: AttendanceTransition::Backfilled,
            })
        }
        None => Ok(MarkOutcome {
            record: AttendanceRecord {
                employer_id: employer_id.to_string(),
                employee_id: employee_id.to_string(),
                date,
                status: AttendanceStatus::PresentPending,
                login_time: Some(now),
                logout_time: None,
                total_hours: None,
            },
            transition: AttendanceTransition::LoggedIn,
        }),
    }
}

/// Employee-submitted leave. Last write wins, including over an existing
/// present row for the same date.
pub fn record_leave(
    employer_id: &str,
    employee_id: &str,
    date: NaiveDate,
    kind: LeaveKind,
) -> AttendanceRecord {
    let status = match kind {
        LeaveKind::Leave => AttendanceStatus::Leave,
        LeaveKind::SickLeave => AttendanceStatus::SickLeave,
    };
    AttendanceRecord {
        employer_id: employer_id.to_string(),
        employee_id: employee_id.to_string(),
        date,
        status,
        login_time: None,
        logout_time: None,
        total_hours: None,
    }
}
