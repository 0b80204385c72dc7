//! Stable exit codes for restage CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed due to invalid config/pattern/input or other errors.
pub const INVALID: i32 = 1;
/// `restage run` hit the configured `max_iterations` before a fixpoint.
pub const LIMIT: i32 = 2;
