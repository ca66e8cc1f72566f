//! QR-token transaction protocol and the payroll ledger engine it
//! drives.
//!
//! An employer issues a short-lived, single-use textual token encoding
//! an intended action (pay wages, grant or foreclose a loan, mark
//! attendance, pay a contract invoice). An employee redeems it exactly
//! once; the claim is a conditional status write, so concurrent scans
//! of the same code produce one winner and `AlreadyRedeemed` for the
//! rest. Every authorized mutation lands together with its confirmation
//! statement in a single store commit.
//!
//! Hosts wire it up like this: pick a [`store::LedgerStore`] (MySQL or
//! in-memory), hand it to a [`orchestrator::LedgerOrchestrator`]
//! together with a [`notify::ChangeNotifier`], issue tokens through
//! [`registry::TransactionRegistry`] and redeem them through
//! `redeem_and_apply`.

pub mod attendance;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod notify;
pub mod orchestrator;
pub mod payroll;
pub mod registry;
pub mod store;
pub mod token;

pub use config::Config;
pub use error::{LedgerError, Result};
pub use notify::{ChangeEvent, ChangeNotifier, EntityKind};
pub use orchestrator::LedgerOrchestrator;
pub use registry::TransactionRegistry;
