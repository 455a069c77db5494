//! Registration number backfill for Homecare Engine
//!
//! Every appointment series carries a human-facing registration number of the
//! form `{SERVICE_CODE}-{000001}`. Initial visits own the number; follow-up
//! visits share the number of the initial visit they reference.
//!
//! The allocator rebuilds all numbers in a single transaction:
//!
//! 1. **Quarantine**: every row gets a `temp-{id}` placeholder so reassignment
//!    never trips the unique index halfway through.
//! 2. **Assign**: initial visits, oldest first, get the next sequence of their
//!    service code. Each write runs in its own savepoint; a uniqueness conflict
//!    moves on to the next sequence, up to a fixed attempt budget.
//! 3. **Propagate**: follow-ups take the number of their initial visit.
//!
//! Initial visits without a resolvable service are skipped and keep their
//! placeholder. Any fatal error rolls back the whole run.
//!
//! # Example
//!
//! ```rust
//! use registration_numbering::{
//!     Appointment, InMemoryAppointmentRepository, RegistrationNumberAllocator, Service,
//! };
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), registration_numbering::NumberingError> {
//! let physio = Service::new("Fisioterapi Home", "FH");
//! let first = Appointment::initial_visit(Some(physio.id), chrono::Utc::now());
//! let repository = Arc::new(InMemoryAppointmentRepository::with_data(
//!     vec![physio],
//!     vec![first.clone()],
//! ));
//!
//! let allocator = RegistrationNumberAllocator::new(repository.clone());
//! let summary = allocator.plan().await?;
//! assert_eq!(summary.initial_visits, 1);
//!
//! allocator.execute(true).await?;
//! let stored = repository.get_appointment(first.id).await;
//! assert_eq!(stored.and_then(|a| a.registration_number).as_deref(), Some("FH-000001"));
//! # Ok(())
//! # }
//! ```

pub mod allocator;
pub mod config;
pub mod error;
pub mod models;
pub mod number;
pub mod report;
pub mod repository;
pub mod service;

pub use allocator::*;
pub use config::*;
pub use error::*;
pub use models::*;
pub use number::*;
pub use report::{ExecutionResult, ReportSummary, VerificationReport, UNKNOWN_SERVICE};
pub use repository::{
    AppointmentRepository, InMemoryAppointmentRepository, PostgresAppointmentRepository,
    RenumberingTransaction,
};
pub use service::*;
