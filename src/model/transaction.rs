use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::LedgerError;

/// The six redeemable action kinds a transaction token can carry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TxKind {
    PayWages,
    SettleLoan,
    ForecloseLoan,
    GrantLoan,
    PayContractWages,
    MarkAttendance,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Completed,
}

/// Addressee of a transaction token: a concrete employee, or the
/// `universal` sentinel used by unaddressed attendance tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSubject {
    Employee(String),
    Universal,
}

pub const UNIVERSAL_SUBJECT: &str = "universal";

impl TokenSubject {
    pub fn parse(raw: &str) -> Self {
        if raw == UNIVERSAL_SUBJECT {
            TokenSubject::Universal
        } else {
            TokenSubject::Employee(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TokenSubject::Employee(id) => id,
            TokenSubject::Universal => UNIVERSAL_SUBJECT,
        }
    }

    /// Whether `employee_id` is allowed to redeem a token addressed to
    /// this subject.
    pub fn admits(&self, employee_id: &str) -> bool {
        match self {
            TokenSubject::Employee(id) => id == employee_id,
            TokenSubject::Universal => true,
        }
    }
}

/// Kind-specific transaction payload, validated against the token kind
/// at claim time rather than at point of use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TxMetadata {
    PayWages,
    SettleLoan,
    MarkAttendance,
    GrantLoan {
        principal: f64,
        interest_rate: f64,
        monthly_deduction: f64,
    },
    ForecloseLoan {
        loan_ids: Vec<String>,
    },
    PayContractWages {
        amount: f64,
        currency: String,
    },
}

impl TxMetadata {
    /// Checks that the payload shape matches `kind` and that every
    /// required field is usable.
    pub fn validate_for(&self, kind: TxKind) -> Result<(), LedgerError> {
        match (kind, self) {
            (TxKind::PayWages, TxMetadata::PayWages)
            | (TxKind::SettleLoan, TxMetadata::SettleLoan)
            | (TxKind::MarkAttendance, TxMetadata::MarkAttendance) => Ok(()),
            (
                TxKind::GrantLoan,
                TxMetadata::GrantLoan {
                    principal,
                    interest_rate,
                    monthly_deduction,
                },
            ) => {
                if *principal <= 0.0 {
                    return Err(LedgerError::InsufficientData("principal"));
                }
                if *interest_rate < 0.0 {
                    return Err(LedgerError::InsufficientData("interest_rate"));
                }
                if *monthly_deduction <= 0.0 {
                    return Err(LedgerError::InsufficientData("monthly_deduction"));
                }
                Ok(())
            }
            (TxKind::ForecloseLoan, TxMetadata::ForecloseLoan { loan_ids }) => {
                if loan_ids.is_empty() {
                    return Err(LedgerError::InsufficientData("loan_ids"));
                }
                Ok(())
            }
            (TxKind::PayContractWages, TxMetadata::PayContractWages { amount, currency }) => {
                if *amount <= 0.0 {
                    return Err(LedgerError::InsufficientData("amount"));
                }
                if currency.is_empty() {
                    return Err(LedgerError::InsufficientData("currency"));
                }
                Ok(())
            }
            _ => Err(LedgerError::InsufficientData("metadata kind mismatch")),
        }
    }
}

/// The redeemable unit: one issued token and its lifecycle.
///
/// Created `Pending` by the issuer; transitions to `Completed` exactly
/// once via the registry's conditional write; never reverts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub token: String,
    pub kind: TxKind,
    pub status: TxStatus,
    pub employer_id: String,
    pub subject: TokenSubject,
    pub metadata: TxMetadata,
    /// Explicit attendance date carried by six-field tokens (backfill).
    pub date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
