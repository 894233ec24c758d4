//! Logging facilities for Strata.
//!
//! Strata uses the `tracing` crate for instrumentation. The library never
//! installs a subscriber; to see logs, install one in the host application:
//!
//! ```ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! The [`targets`] module lists the target names used throughout the
//! workspace so hosts can filter by subsystem, e.g.
//! `RUST_LOG=strata::model=debug`.

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "strata_core::signal";
    /// Column/ranking model target.
    pub const MODEL: &str = "strata::model";
    /// Grouping/sorting engine target.
    pub const SORTING: &str = "strata::model::sorting";
    /// Dump/restore codec target.
    pub const DUMP: &str = "strata::model::dump";
}
