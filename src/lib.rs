//! # rdo - personal task tracker
//!
//! A command-line task tracker driven by a small attribute language:
//!
//! ```bash
//! rdo add Buy milk project:home +errand due:tomorrow
//! rdo add Water plants recur:7d
//! rdo mod 01HQ +urgent pri:high
//! rdo done --parent 01HQ
//! ```
//!
//! ## Layout
//!
//! - [`parser`] turns command tokens into an attribute set, resolving dates
//!   through [`dates`] and recurrence rules through [`recurrence`].
//! - [`lifecycle`] applies attribute sets to tasks, runs the
//!   open/frozen/completed/deleted state machine, cascades over children and
//!   spawns the next instance of recurring templates.
//! - [`store`] is the storage contract; [`db`] implements it over one JSON
//!   file.
//! - [`config`], [`report`] and [`cmd`] back the `rdo` binary.
//!
//! The library logs through `tracing` and never installs a subscriber.

pub mod cli;
pub mod cmd;
pub mod config;
pub mod dates;
pub mod db;
pub mod error;
pub mod fields;
pub mod lifecycle;
pub mod parser;
pub mod recurrence;
pub mod report;
pub mod store;
pub mod task;
