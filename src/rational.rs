//! Exact rational arithmetic for musical time.
//!
//! Every duration and every absolute timestamp in this crate is an arbitrary-precision
//! rational — never a float. Long scores with deeply nested tuplets can push denominators
//! past 64 bits, so the backing integer type is `BigInt`, not a fixed-width type.

use num_bigint::BigInt;
use num_rational::Ratio;
use num_traits::{One, Zero};

/// A fraction of a whole note, backed by arbitrary-precision integers.
pub type Rational = Ratio<BigInt>;

/// Build a `Rational` from two `i64`s, e.g. `r(1, 4)` for a quarter note.
pub fn r(numerator: i64, denominator: i64) -> Rational {
    Ratio::new(BigInt::from(numerator), BigInt::from(denominator))
}

pub fn zero() -> Rational {
    Rational::zero()
}

pub fn one() -> Rational {
    Rational::one()
}

/// Maps a named duration letter to its base fraction of a whole note.
///
/// `w`→1, `h`→1/2, `q`→1/4, `e`→1/8, `s`→1/16, `t`→1/32, `x`→1/64.
pub fn named_duration(name: &str) -> Option<Rational> {
    Some(match name {
        "w" => r(1, 1),
        "h" => r(1, 2),
        "q" => r(1, 4),
        "e" => r(1, 8),
        "s" => r(1, 16),
        "t" => r(1, 32),
        "x" => r(1, 64),
        _ => return None,
    })
}

/// `base * (2 - 2^-dots)`: each dot adds half of the previous increment.
///
/// A triple-dotted quarter note is `(1/4) * (2 - 2^-3) = 15/32`.
pub fn dotted_total(base: &Rational, dots: u8) -> Rational {
    let two = r(2, 1);
    let mut power_of_two_inv = one();
    for _ in 0..dots {
        power_of_two_inv = power_of_two_inv / r(2, 1);
    }
    base * (two - power_of_two_inv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_note_is_one_quarter() {
        assert_eq!(named_duration("q").unwrap(), r(1, 4));
    }

    #[test]
    fn triple_dotted_quarter_is_fifteen_thirty_seconds() {
        let base = named_duration("q").unwrap();
        assert_eq!(dotted_total(&base, 3), r(15, 32));
    }

    #[test]
    fn single_dot_adds_half() {
        let base = named_duration("h").unwrap();
        assert_eq!(dotted_total(&base, 1), r(3, 4));
    }

    #[test]
    fn no_dots_is_unchanged() {
        let base = named_duration("e").unwrap();
        assert_eq!(dotted_total(&base, 0), base);
    }

    #[test]
    fn unknown_name_is_none() {
        assert_eq!(named_duration("z"), None);
    }
}
