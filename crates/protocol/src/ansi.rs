//! ANSI colour escapes used in menu output.

/// Restore default attributes.
pub const RESET: &str = "\x1B[0m";

/// Yellow foreground, used for command names in help listings.
pub const YELLOW: &str = "\x1B[0;33m";
