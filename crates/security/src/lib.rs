//! Security module for CareGaps — input screening, PHI masking, and audit logging.
//!
//! Provides:
//! - **Input guard**: Length and injection-pattern checks on user text
//! - **PHI masking**: Field-level redaction of function results
//! - **Audit logging**: Structured records from the event bus

pub mod audit;
pub mod guard;
pub mod masking;

pub use audit::{AuditLogger, AuditSink, TracingSink};
pub use guard::{InputGuard, Rejection, DEFAULT_MAX_INPUT_CHARS};
pub use masking::{FieldCategory, PhiMasker};
