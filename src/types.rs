#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
/// A score paired with the maximum score possible
pub struct Grade {
    /// The actual grade received
    pub grade:  f64,
    /// The maximum grade possible
    pub out_of: f64,
}

impl Grade {
    /// Creates a new grade -
    /// * `grade` - The actual grade received
    /// * `out_of` - The maximum grade possible
    pub fn new(grade: f64, out_of: f64) -> Self {
        Self { grade, out_of }
    }
}

impl std::ops::Add for Grade {
    type Output = Grade;

    fn add(self, rhs: Grade) -> Grade {
        Grade::new(self.grade + rhs.grade, self.out_of + rhs.out_of)
    }
}

impl std::iter::Sum for Grade {
    fn sum<I: Iterator<Item = Grade>>(iter: I) -> Grade {
        iter.fold(Grade::default(), |acc, g| acc + g)
    }
}

impl Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}/{:.2}", self.grade, self.out_of)
    }
}
