use std::cmp::Ordering;
use std::fmt;

/// Tradeable instrument as discovered from the security list. Immutable
/// after discovery; the scales are the number of decimal places every
/// price/size for this instrument must carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub price_scale: u32,
    pub size_scale: u32,
}

impl Symbol {
    pub fn new(name: impl Into<String>, price_scale: u32, size_scale: u32) -> Self {
        Self {
            name: name.into(),
            price_scale,
            size_scale,
        }
    }
}

// Instruments are listed to the user ordered by name.
impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
