//! Rational time bases and timestamp rescaling

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A rational number `num / den`, used for time bases and frame rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Both terms strictly positive.
    pub fn is_positive(&self) -> bool {
        self.num > 0 && self.den > 0
    }

    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }

    pub fn invert(&self) -> Self {
        Self::new(self.den, self.num)
    }

    /// Closest rational to `value` with a denominator no larger than `max_den`.
    ///
    /// Used to turn a configured frame rate such as `29.97` into `2997/100`
    /// (or `30000/1001` when the input is the exact NTSC value).
    pub fn approximate(value: f64, max_den: i32) -> Option<Self> {
        if !value.is_finite() || value <= 0.0 || max_den <= 0 {
            return None;
        }

        // Continued-fraction convergents
        let (mut p0, mut q0, mut p1, mut q1) = (0i64, 1i64, 1i64, 0i64);
        let mut x = value;
        loop {
            let a = x.floor();
            if a > i32::MAX as f64 {
                break;
            }
            let a = a as i64;
            let p2 = a * p1 + p0;
            let q2 = a * q1 + q0;
            if q2 > max_den as i64 || p2 > i32::MAX as i64 {
                break;
            }
            (p0, q0, p1, q1) = (p1, q1, p2, q2);
            let frac = x - a as f64;
            if frac.abs() < 1e-9 || ((p1 as f64 / q1 as f64) - value).abs() < 1e-12 {
                break;
            }
            x = 1.0 / frac;
        }

        if q1 == 0 || p1 == 0 {
            return None;
        }
        Some(Self::new(p1 as i32, q1 as i32))
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl std::fmt::Display for Rational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Divide with rounding to nearest, ties away from zero.
fn div_round(num: i128, den: i128) -> i128 {
    debug_assert!(den != 0);
    let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
    if num >= 0 {
        (num + den / 2) / den
    } else {
        -((-num + den / 2) / den)
    }
}

/// Convert a timestamp from one time base to another.
///
/// Rounds to nearest (half away from zero). Rescaling into the same time base
/// returns the input unchanged.
pub fn rescale_ts(ts: i64, from: Rational, to: Rational) -> i64 {
    if from == to {
        return ts;
    }
    let num = ts as i128 * from.num as i128 * to.den as i128;
    let den = from.den as i128 * to.num as i128;
    if den == 0 {
        return ts;
    }
    div_round(num, den).clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Rescale an optional timestamp.
pub fn rescale_opt(ts: Option<i64>, from: Rational, to: Rational) -> Option<i64> {
    ts.map(|t| rescale_ts(t, from, to))
}

/// Compare two timestamps expressed in different time bases, exactly.
pub fn compare_ts(a: i64, tb_a: Rational, b: i64, tb_b: Rational) -> Ordering {
    let lhs = a as i128 * tb_a.num as i128 * tb_b.den as i128;
    let rhs = b as i128 * tb_b.num as i128 * tb_a.den as i128;
    lhs.cmp(&rhs)
}

/// Timestamp in seconds.
pub fn ts_to_secs(ts: i64, tb: Rational) -> f64 {
    ts as f64 * tb.as_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescale_identity() {
        let tb = Rational::new(1, 90000);
        for ts in [-7, 0, 1, 3003, i64::MAX / 2] {
            assert_eq!(rescale_ts(ts, tb, tb), ts);
        }
    }

    #[test]
    fn test_rescale_between_bases() {
        // 1 frame at 30fps in a 90kHz clock
        assert_eq!(rescale_ts(1, Rational::new(1, 30), Rational::new(1, 90000)), 3000);
        // 1024 samples at 44.1kHz in milliseconds
        assert_eq!(rescale_ts(1024, Rational::new(1, 44100), Rational::new(1, 1000)), 23);
        assert_eq!(
            rescale_ts(3003, Rational::new(1, 90000), Rational::new(1001, 30000)),
            1
        );
    }

    #[test]
    fn test_rescale_rounds_half_away_from_zero() {
        let from = Rational::new(1, 2);
        let to = Rational::new(1, 1);
        assert_eq!(rescale_ts(1, from, to), 1);
        assert_eq!(rescale_ts(-1, from, to), -1);
        assert_eq!(rescale_ts(3, from, to), 2);
        assert_eq!(rescale_ts(-3, from, to), -2);
    }

    #[test]
    fn test_compare_ts() {
        let ms = Rational::new(1, 1000);
        let k90 = Rational::new(1, 90000);
        assert_eq!(compare_ts(1, ms, 90, k90), Ordering::Equal);
        assert_eq!(compare_ts(1, ms, 91, k90), Ordering::Less);
        assert_eq!(compare_ts(2, ms, 91, k90), Ordering::Greater);
    }

    #[test]
    fn test_approximate_frame_rates() {
        assert_eq!(Rational::approximate(30.0, 1001), Some(Rational::new(30, 1)));
        assert_eq!(Rational::approximate(25.0, 1001), Some(Rational::new(25, 1)));
        let ntsc = Rational::approximate(30000.0 / 1001.0, 1001).unwrap();
        assert!(ntsc.den <= 1001);
        assert!((ntsc.as_f64() - 30000.0 / 1001.0).abs() < 1e-6);
        assert_eq!(Rational::approximate(12.5, 1001), Some(Rational::new(25, 2)));
        assert_eq!(Rational::approximate(0.0, 1001), None);
        assert_eq!(Rational::approximate(f64::NAN, 1001), None);
    }
}
