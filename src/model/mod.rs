pub mod attendance;
pub mod bonus;
pub mod employment;
pub mod loan;
pub mod statement;
pub mod transaction;
pub mod wage;

pub use attendance::{AttendanceRecord, AttendanceStatus};
pub use bonus::{BonusCategory, BonusEntry};
pub use employment::{Employment, EmploymentKind, EmploymentStatus};
pub use loan::{Loan, LoanStatus};
pub use statement::Statement;
pub use transaction::{
    TokenSubject, Transaction, TxKind, TxMetadata, TxStatus, UNIVERSAL_SUBJECT,
};
pub use wage::WageRecord;
