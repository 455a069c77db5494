//! Operations CLI for Homecare Engine maintenance
//!
//! Jobs that operators run against the scheduling database by hand. Reports go
//! to stdout; logs go to stderr so `--json` output can be piped.
//!
//! # Example Usage
//!
//! ```bash
//! # What would a renumbering run touch?
//! homecare registration-numbers plan
//!
//! # Rebuild all registration numbers (prompts unless --yes is given)
//! homecare registration-numbers execute --max-attempts 10
//!
//! # Non-zero exit when numbers are duplicated, missing or out of sync
//! homecare registration-numbers verify --json
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod render;

pub use cli::*;
pub use commands::*;
