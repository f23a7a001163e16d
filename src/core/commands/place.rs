// src/core/commands/place.rs

//! Ordinal leaderboard places such as `1st`, `22nd` or `113th`.

use std::fmt;

/// A one-based leaderboard position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Place(u32);

impl Place {
    /// Returns `None` for rank zero.
    pub fn new(rank: u32) -> Option<Self> {
        (rank > 0).then_some(Self(rank))
    }

    pub fn rank(self) -> u32 {
        self.0
    }

    /// Zero-based index into a leaderboard.
    pub fn index(self) -> usize {
        (self.0 - 1) as usize
    }

    /// The ordinal suffix English uses for this number.
    pub fn suffix(self) -> &'static str {
        suffix_for(self.0)
    }

    /// Parses `<digits><suffix>`. The suffix must agree with the number, so
    /// `2nd` and `11th` are accepted while `2st` and `11st` are not.
    pub fn parse(s: &str) -> Option<Self> {
        let split = s.find(|c: char| !c.is_ascii_digit())?;
        let (digits, suffix) = s.split_at(split);
        if digits.is_empty() || !suffix.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        let rank: u32 = digits.parse().ok()?;
        let place = Self::new(rank)?;
        (place.suffix() == suffix).then_some(place)
    }
}

// Only 11, 12 and 13 themselves take "th"; 111 renders as "111st".
fn suffix_for(rank: u32) -> &'static str {
    match rank {
        11..=13 => "th",
        _ => match rank % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        },
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0, self.suffix())
    }
}
