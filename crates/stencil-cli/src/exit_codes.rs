//! Standard exit codes for CLI operations

#![allow(dead_code)]

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Resolution error - module constraints could not be satisfied
pub const RESOLVE_ERROR: i32 = 2;

/// Template error - template parsing or rendering failed
pub const TEMPLATE_ERROR: i32 = 3;

/// Manifest error - invalid service or module manifest
pub const MANIFEST_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;
