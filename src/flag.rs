//! Membership flag stored against each network prefix.

use std::fmt;

/// Flag represents whether a network is on the blocklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Flag {
    /// Not listed (the match-all default)
    #[default]
    Unlisted = 0,
    /// Listed in the dataset
    Listed = 1,
}

impl Flag {
    /// Convert from a u8 value.
    ///
    /// Returns `None` for values outside the two known states.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Flag::Unlisted),
            1 => Some(Flag::Listed),
            _ => None,
        }
    }

    /// Convert to a u8 value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether this flag marks a listed network.
    pub fn is_listed(self) -> bool {
        self == Flag::Listed
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Unlisted => "unlisted",
            Flag::Listed => "listed",
        }
    }
}

impl From<bool> for Flag {
    fn from(listed: bool) -> Self {
        if listed {
            Flag::Listed
        } else {
            Flag::Unlisted
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Flag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "0" | "unlisted" => Ok(Flag::Unlisted),
            "1" | "listed" => Ok(Flag::Listed),
            _ => Err(()),
        }
    }
}
