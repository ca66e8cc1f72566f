//! Codec for the two delimited-text token families exchanged out of band
//! (usually as QR codes): linking tokens that establish an employment and
//! transaction tokens that authorize one ledger action.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::model::{EmploymentKind, TokenSubject, TxKind};

const LINK_PREFIX: &str = "employer";
const TX_PREFIX: &str = "qr";
const DATE_FMT: &str = "%Y-%m-%d";

/// Optional part-time configuration carried URL-encoded in the fifth
/// linking-token field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartTimeConfig {
    pub working_hours_per_day: f64,
    pub working_days_per_month: f64,
}

/// Decoded linking token: `employer:<id>:<contact>[:<kind>[:<config>]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkToken {
    pub employer_id: String,
    pub contact: String,
    pub kind: EmploymentKind,
    pub config: Option<PartTimeConfig>,
}

/// Decoded transaction token:
/// `qr:<kind>:<employer>:<subject>:<millis>` or
/// `qr:<kind>:<employer>:<subject>:<date>:<millis>`.
#[derive(Debug, Clone, PartialEq)]
pub struct TxToken {
    pub kind: TxKind,
    pub employer_id: String,
    pub subject: TokenSubject,
    /// Explicit attendance date for the six-field (backfill) form.
    pub date: Option<NaiveDate>,
    pub issued_at_ms: i64,
}

pub fn decode_link(text: &str) -> Result<LinkToken> {
    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() < 3 || parts.len() > 5 || parts[0] != LINK_PREFIX {
        return Err(LedgerError::MalformedToken(text.to_string()));
    }
    if parts[1].is_empty() {
        return Err(LedgerError::MalformedToken(text.to_string()));
    }

    let kind = match parts.get(3) {
        Some(raw) => EmploymentKind::from_str(raw)
            .map_err(|_| LedgerError::MalformedToken(text.to_string()))?,
        None => EmploymentKind::FullTime,
    };

    // A broken config field degrades to "no config" rather than failing
    // the whole decode.
    let config = parts.get(4).and_then(|raw| parse_config(raw));

    Ok(LinkToken {
        employer_id: parts[1].to_string(),
        contact: parts[2].to_string(),
        kind,
        config,
    })
}

fn parse_config(raw: &str) -> Option<PartTimeConfig> {
    let decoded = urlencoding::decode(raw).ok()?;
    match serde_json::from_str(&decoded) {
        Ok(config) => Some(config),
        Err(err) => {
            tracing::warn!(error = %err, "ignoring unparseable link token config");
            None
        }
    }
}

pub fn encode_link(token: &LinkToken) -> String {
    let mut text = format!(
        "{}:{}:{}:{}",
        LINK_PREFIX, token.employer_id, token.contact, token.kind
    );
    if let Some(config) = &token.config {
        let json = serde_json::json!({
            "workingHoursPerDay": config.working_hours_per_day,
            "workingDaysPerMonth": config.working_days_per_month,
        })
        .to_string();
        text.push(':');
        text.push_str(&urlencoding::encode(&json));
    }
    text
}

pub fn decode_transaction(text: &str) -> Result<TxToken> {
    let parts: Vec<&str> = text.split(':').collect();
    if (parts.len() != 5 && parts.len() != 6) || parts[0] != TX_PREFIX {
        return Err(LedgerError::MalformedToken(text.to_string()));
    }

    let kind =
        TxKind::from_str(parts[1]).map_err(|_| LedgerError::MalformedToken(text.to_string()))?;
    if parts[2].is_empty() {
        return Err(LedgerError::MalformedToken(text.to_string()));
    }
    let subject = TokenSubject::parse(parts[3]);

    let (date, ms_raw) = if parts.len() == 6 {
        let date = NaiveDate::parse_from_str(parts[4], DATE_FMT)
            .map_err(|_| LedgerError::MalformedToken(text.to_string()))?;
        (Some(date), parts[5])
    } else {
        (None, parts[4])
    };

    let issued_at_ms: i64 = ms_raw
        .parse()
        .map_err(|_| LedgerError::MalformedToken(text.to_string()))?;

    Ok(TxToken {
        kind,
        employer_id: parts[2].to_string(),
        subject,
        date,
        issued_at_ms,
    })
}

pub fn encode_transaction(token: &TxToken) -> String {
    match token.date {
        Some(date) => format!(
            "{}:{}:{}:{}:{}:{}",
            TX_PREFIX,
            token.kind,
            token.employer_id,
            token.subject.as_str(),
            date.format(DATE_FMT),
            token.issued_at_ms
        ),
        None => format!(
            "{}:{}:{}:{}:{}",
            TX_PREFIX,
            token.kind,
            token.employer_id,
            token.subject.as_str(),
            token.issued_at_ms
        ),
    }
}
