//! PostgreSQL connection layer for Homecare Engine
//!
//! Wraps a sqlx connection pool configured from the environment. Domain
//! crates take the inner [`sqlx::PgPool`] and own their queries.
//!
//! # Example
//!
//! ```no_run
//! use database_layer::{DatabaseConfig, DatabasePool};
//!
//! # async fn run() -> Result<(), database_layer::DatabaseError> {
//! let config = DatabaseConfig::from_env()?;
//! let db = DatabasePool::connect(&config).await?;
//! assert!(db.is_healthy().await);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;

pub use config::*;
pub use connection::*;
pub use error::*;
