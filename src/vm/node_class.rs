//! Node classes - capacity tiers a player can place in a layout
//!
//! ```text
//! name   code  lines  channels  cost
//! 4x1    a     4      1         1
//! 8x3    b     8      3         3
//! 9x3    c     9      3         4
//! 15x5   d     15     5         8
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Node capacity class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeClass {
    #[serde(rename = "4x1")]
    Tiny,
    #[serde(rename = "8x3")]
    Small,
    #[serde(rename = "9x3")]
    Standard,
    #[serde(rename = "15x5")]
    Large,
}

impl NodeClass {
    pub const ALL: [NodeClass; 4] = [Self::Tiny, Self::Small, Self::Standard, Self::Large];

    /// Display name (`<lines>x<channels>`)
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Tiny => "4x1",
            Self::Small => "8x3",
            Self::Standard => "9x3",
            Self::Large => "15x5",
        }
    }

    /// Maximum physical source lines
    pub const fn lines(&self) -> usize {
        match self {
            Self::Tiny => 4,
            Self::Small => 8,
            Self::Standard => 9,
            Self::Large => 15,
        }
    }

    /// Maximum concurrent channel broadcasts
    pub const fn channels(&self) -> usize {
        match self {
            Self::Tiny => 1,
            Self::Small | Self::Standard => 3,
            Self::Large => 5,
        }
    }

    /// Cost counted in the score
    pub const fn cost(&self) -> u32 {
        match self {
            Self::Tiny => 1,
            Self::Small => 3,
            Self::Standard => 4,
            Self::Large => 8,
        }
    }

    /// Layout codec letter
    pub const fn code(&self) -> char {
        match self {
            Self::Tiny => 'a',
            Self::Small => 'b',
            Self::Standard => 'c',
            Self::Large => 'd',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_match_capacity() {
        for class in NodeClass::ALL {
            let expected = format!("{}x{}", class.lines(), class.channels());
            assert_eq!(class.name(), expected);
            assert_eq!(NodeClass::parse(class.name()), Some(class));
            assert_eq!(NodeClass::from_code(class.code()), Some(class));
        }
        assert_eq!(NodeClass::parse("8X3"), Some(NodeClass::Small));
        assert_eq!(NodeClass::parse("2x2"), None);
    }

    #[test]
    fn test_serde_uses_names() {
        let json = serde_json::to_string(&NodeClass::Large).unwrap();
        assert_eq!(json, "\"15x5\"");
        let restored: NodeClass = serde_json::from_str("\"9x3\"").unwrap();
        assert_eq!(restored, NodeClass::Standard);
    }
}
