//! Register - Reserved operand words for node programs
//!
//! ## Registers
//!
//! ```text
//! ACC    accumulator (read/write)
//! NIL    reads 0, writes are discarded
//! INPUT  next puzzle input (read only)
//! OUTPUT puzzle output stream (write only)
//! ```
//!
//! Channels are addressed as `CH<n>` with `n >= 1` and are not registers:
//! they live in the shared channel space owned by the scheduler.

use std::fmt;

/// A reserved register word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Accumulator
    Acc,
    /// Null register
    Nil,
    /// Puzzle input stream (read only)
    Input,
    /// Puzzle output stream (write only)
    Output,
}

impl Register {
    /// Parse a lowercase token
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "acc" => Some(Self::Acc),
            "nil" => Some(Self::Nil),
            "input" => Some(Self::Input),
            "output" => Some(Self::Output),
            _ => None,
        }
    }

    /// Source-level name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Acc => "ACC",
            Self::Nil => "NIL",
            Self::Input => "INPUT",
            Self::Output => "OUTPUT",
        }
    }

    /// Can this register be read as a value?
    pub const fn is_readable(&self) -> bool {
        !matches!(self, Self::Output)
    }

    /// Can this register be written?
    pub const fn is_writable(&self) -> bool {
        !matches!(self, Self::Input)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Parse a channel token (`ch<n>`, n >= 1)
pub fn parse_channel(token: &str) -> Option<u32> {
    let digits = token.strip_prefix("ch")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match digits.parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(id) => Some(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_parse() {
        assert_eq!(Register::parse("acc"), Some(Register::Acc));
        assert_eq!(Register::parse("nil"), Some(Register::Nil));
        assert_eq!(Register::parse("input"), Some(Register::Input));
        assert_eq!(Register::parse("output"), Some(Register::Output));
        assert_eq!(Register::parse("ACC"), None);
        assert_eq!(Register::parse("r0"), None);
    }

    #[test]
    fn test_register_access_rules() {
        assert!(!Register::Input.is_writable());
        assert!(!Register::Output.is_readable());
        assert!(Register::Acc.is_readable() && Register::Acc.is_writable());
        assert!(Register::Nil.is_readable() && Register::Nil.is_writable());
    }

    #[test]
    fn test_channel_tokens() {
        assert_eq!(parse_channel("ch1"), Some(1));
        assert_eq!(parse_channel("ch42"), Some(42));
        assert_eq!(parse_channel("ch0"), None);
        assert_eq!(parse_channel("ch"), None);
        assert_eq!(parse_channel("ch-1"), None);
        assert_eq!(parse_channel("ch+1"), None);
        assert_eq!(parse_channel("chx"), None);
        assert_eq!(parse_channel("acc"), None);
    }
}
