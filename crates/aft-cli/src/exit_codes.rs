//! Exit codes
//!
//! Follows Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Input error - unreadable values, secrets or config documents
pub const INPUT_ERROR: i32 = 2;

/// Template error - a template failed to render
pub const TEMPLATE_ERROR: i32 = 3;

/// Package error - missing or invalid package
pub const PACKAGE_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// External tool error - docker, sops, mkcert or age-keygen failed
pub const TOOL_ERROR: i32 = 6;

/// Usage error - invalid arguments or options (sysexits.h EX_USAGE)
pub const USAGE_ERROR: i32 = 64;
