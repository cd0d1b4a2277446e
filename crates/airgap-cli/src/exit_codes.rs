//! Process exit codes
//!
//! Non-zero values identify the failing stage of a run; 64 follows sysexits.h.

/// Run completed
pub const SUCCESS: i32 = 0;

/// Release manifest could not be loaded or parsed
pub const MANIFEST_ERROR: i32 = 2;

/// A category pipeline failed
pub const SYNC_ERROR: i32 = 3;

/// Registry login or credential resolution failed
pub const AUTH_ERROR: i32 = 4;

/// Local file could not be read or written
pub const IO_ERROR: i32 = 5;

/// Invalid arguments or options
pub const USAGE_ERROR: i32 = 64;
