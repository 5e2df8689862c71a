//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

use crate::constants::PERCENT_SCALE;

/// Convert a count to f64 while allowing precision loss in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(0.0)
}

/// Convert i64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn i64_to_f64(value: i64) -> f64 {
    cast::<i64, f64>(value).unwrap_or(0.0)
}

/// Convert a finite f64 to i64, returning `None` for NaN, infinities and
/// values outside the i64 range.
#[must_use]
pub fn f64_to_i64(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    cast::<f64, i64>(value.trunc())
}

/// Convert a signed integer to u32, returning `None` when it does not fit.
#[must_use]
pub fn i64_to_u32(value: i64) -> Option<u32> {
    u32::try_from(value).ok()
}

/// Split 100% across `counts` in hundredths of a percent using
/// largest-remainder rounding, so the parts always sum to exactly 100.00.
///
/// Ties on the remainder go to the earlier slot. Returns all zeros when the
/// total is zero.
#[must_use]
pub fn largest_remainder_hundredths(counts: &[u32]) -> Vec<u64> {
    let total: u64 = counts.iter().map(|&c| u64::from(c)).sum();
    if total == 0 {
        return vec![0; counts.len()];
    }

    let mut shares: Vec<u64> = Vec::with_capacity(counts.len());
    let mut remainders: Vec<(u64, usize)> = Vec::with_capacity(counts.len());
    for (idx, &count) in counts.iter().enumerate() {
        let scaled = u64::from(count) * PERCENT_SCALE;
        shares.push(scaled / total);
        remainders.push((scaled % total, idx));
    }

    let assigned: u64 = shares.iter().sum();
    let mut leftover = PERCENT_SCALE.saturating_sub(assigned);
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for (remainder, idx) in remainders {
        if leftover == 0 {
            break;
        }
        if remainder == 0 {
            continue;
        }
        shares[idx] += 1;
        leftover -= 1;
    }
    shares
}

/// Express hundredths of a percent as a percentage value (`6667` -> `66.67`).
#[must_use]
pub fn hundredths_to_percent(hundredths: u64) -> f64 {
    u64_to_f64(hundredths) / 100.0
}
