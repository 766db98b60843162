//! This module contains constants used throughout the code, that may
//! eventually be turned into configurable options.

/// Print per-query seed-selection summaries to stderr.
pub const PRINT: bool = false;
