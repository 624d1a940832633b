//! Score model
//!
//! Strongly typed tree (Score → Part → Measure → Note) plus the pitch,
//! instrument and retained-source types it is built from.

pub mod instrument;
pub mod pitch;
pub mod score;
pub mod source;

use num_rational::Rational64;

/// Exact durations and offsets, in quarter notes
pub type Rational = Rational64;

/// `a + b`, or `None` when the exact result does not fit in 64 bits
pub fn checked_sum(a: Rational, b: Rational) -> Option<Rational> {
    let (a_den, b_den) = (*a.denom(), *b.denom());
    let denom = (a_den / num_integer::gcd(a_den, b_den)).checked_mul(b_den)?;
    let left = a.numer().checked_mul(denom / a_den)?;
    let right = b.numer().checked_mul(denom / b_den)?;
    Some(Rational::new(left.checked_add(right)?, denom))
}

// Re-export commonly used types
pub use instrument::Instrument;
pub use pitch::{KeySignature, Mode, Pitch, Step, TimeSignature};
pub use score::{Measure, Note, Part, Score, Sound};
pub use source::{Baseline, ElementSpan, PartSource, SourceDocument};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_sum() {
        assert_eq!(
            checked_sum(Rational::new(1, 3), Rational::new(1, 6)),
            Some(Rational::new(1, 2))
        );
        assert_eq!(
            checked_sum(Rational::new(1, 2), Rational::new(-3, 4)),
            Some(Rational::new(-1, 4))
        );
        assert_eq!(
            checked_sum(Rational::from_integer(i64::MAX), Rational::from_integer(1)),
            None
        );
        assert_eq!(
            checked_sum(Rational::new(1, 4_000_000_001), Rational::new(1, 4_000_000_003)),
            None
        );
    }
}
