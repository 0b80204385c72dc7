//! Fixpoint text-transformation stage runner.
//!
//! A stage applies one string transformation to an input, optionally
//! repeating it until the output stops changing (a fixpoint), and optionally
//! emitting intermediate and/or final results to an output sink. The
//! architecture keeps the seams explicit:
//!
//! - **[`stage`]**: the execution loop and emission policy. Pure control
//!   flow over injected collaborators, fully testable in isolation.
//! - **[`transform`]**: the transformation capability (trait + the regex
//!   substitution implementation).
//! - **[`sink`]**: the output destination (trait + writer-backed
//!   implementation). Tests substitute a recorder.
//! - **[`config`]**: the immutable per-stage configuration and its TOML
//!   load/store.
//!
//! The CLI (`restage`) wires stdin, a regex transform, and stdout together.

pub mod config;
pub mod exit_codes;
pub mod logging;
pub mod sink;
pub mod stage;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod transform;
