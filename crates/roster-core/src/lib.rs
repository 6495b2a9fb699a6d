//! Data pipeline behind the roster endpoint.
//!
//! ```text
//! accounts.csv → RowParser (RawRecord stream) → Normalizer → Roster
//! ```
//!
//! The parser streams all-text rows; the normalizer turns each row into a
//! typed [`Record`] by coercing numeric-looking fields and rewriting the phone
//! field to E.164 when the number is valid for its country.

pub mod error;
pub mod normalizer;
pub mod parser;
pub mod phone;
pub mod record;

pub use error::{Result, SourceError};
pub use normalizer::{Normalizer, coerce_numeric};
pub use parser::{RowParser, RowStream};
pub use phone::{PhoneOutcome, format_e164};
pub use record::{FieldValue, RawRecord, Record, Roster};
