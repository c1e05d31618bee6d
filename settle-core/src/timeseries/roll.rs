use chrono::NaiveDate;

use crate::SettleError;
use crate::timeseries::util::{forward_fill_limit, nan_as_null, null_runs, shift};

/// Outcome of a back-adjusting roll, with the geometry the engine settled on.
#[derive(Debug, Clone, PartialEq)]
pub struct RolledSeries {
    /// Adjusted values, same length as the inputs.
    pub values: Vec<Option<f64>>,
    /// Row before which the output was nulled because the next contract had no
    /// price at the roll anchor. `None` if every expiration was rolled.
    pub truncated_at: Option<usize>,
    /// Inclusive `(start, end)` windows that were spliced, latest first.
    pub windows: Vec<(usize, usize)>,
}

/// Back-adjust `front` by splicing in `next` at every expiration.
///
/// See [`roll_detailed`] for the algorithm; this returns only the values.
///
/// # Errors
/// Returns `Err(SettleError::InvalidArg)` if the series lengths differ or an
/// expiration index is out of range.
pub fn roll(
    front: &[Option<f64>],
    next: &[Option<f64>],
    expirations: &[usize],
    roll_offset: usize,
) -> Result<Vec<Option<f64>>, SettleError> {
    roll_detailed(front, next, expirations, roll_offset).map(|r| r.values)
}

/// Back-adjust `front` by splicing in `next` at every expiration.
///
/// - `front` and `next` are aligned on the same ascending date axis; `next`
///   must already be forward-filled.
/// - `expirations` are row indices where the front contract matures. If
///   `front` ends in a null run, its last index is added as an expiration.
/// - Expirations are walked latest first. The window defaults to
///   `[expiry - roll_offset, expiry]`; when a null run of `front` (widened by
///   `roll_offset + 1` rows on the left) covers the expiry, that run's window
///   is used instead and is not offered to earlier expirations.
/// - At the window start the roll value is `next[start] - front[start]`. The
///   window is overwritten with `next` and the roll value is subtracted from
///   every row from `start` on.
/// - If `next[start]` is null the roll has no anchor: every row before `start`
///   is nulled and earlier expirations are not processed.
///
/// A null `front[start]` leaves the roll value unknown, which nulls every row
/// from `start` on. `Some(NaN)` counts as null in both inputs.
///
/// # Errors
/// Returns `Err(SettleError::InvalidArg)` if the series lengths differ or an
/// expiration index is out of range.
pub fn roll_detailed(
    front: &[Option<f64>],
    next: &[Option<f64>],
    expirations: &[usize],
    roll_offset: usize,
) -> Result<RolledSeries, SettleError> {
    let n = front.len();
    if next.len() != n {
        return Err(SettleError::InvalidArg(format!(
            "front has {n} rows, next has {}",
            next.len()
        )));
    }
    if let Some(bad) = expirations.iter().find(|&&e| e >= n) {
        return Err(SettleError::InvalidArg(format!(
            "expiration {bad} out of range for {n} rows"
        )));
    }

    let front = nan_as_null(front);
    let next = nan_as_null(next);
    let runs = null_runs(&front);
    let mut expiries = expirations.to_vec();
    if let Some(&(_, end)) = runs.last()
        && end + 1 == n
    {
        expiries.push(end);
    }
    expiries.sort_unstable();
    expiries.dedup();

    let mut gaps: Vec<(usize, usize)> = runs
        .iter()
        .rev()
        .map(|&(s, e)| (s.saturating_sub(roll_offset + 1), e))
        .collect();

    let mut out = front.clone();
    let mut truncated_at = None;
    let mut windows = Vec::new();

    for &expiry in expiries.iter().rev() {
        let (start, end) = match gaps.iter().position(|&(s, e)| s <= expiry && expiry <= e) {
            Some(pos) => gaps.remove(pos),
            None => (expiry.saturating_sub(roll_offset), expiry),
        };
        let Some(anchor) = next[start] else {
            out[..start].fill(None);
            truncated_at = Some(start);
            break;
        };
        let roll_value = front[start].map(|f| anchor - f);
        out[start..=end].copy_from_slice(&next[start..=end]);
        for v in &mut out[start..] {
            *v = match (*v, roll_value) {
                (Some(x), Some(r)) => Some(x - r),
                _ => None,
            };
        }
        windows.push((start, end));
    }

    Ok(RolledSeries {
        values: out,
        truncated_at,
        windows,
    })
}

/// Days of `front` history carried over a missing quote when measuring the roll gap.
const ROLL_GAP_FILL_LIMIT: usize = 5;

/// Forward-accumulating roll: `front` plus the running sum of roll gaps.
///
/// A roll day is the first row, a row without maturity, or a row whose
/// `maturity` differs from the previous row's. On a roll day the gap
/// `front[i-1] - next[i-1]` is added to the running adjustment when both are
/// known; `front` is forward-filled over up to five missing rows for this.
/// `Some(NaN)` counts as missing.
///
/// # Errors
/// Returns `Err(SettleError::InvalidArg)` if the series lengths differ.
pub fn roll_cumulative(
    front: &[Option<f64>],
    next: &[Option<f64>],
    maturity: &[Option<NaiveDate>],
) -> Result<Vec<Option<f64>>, SettleError> {
    let n = front.len();
    if next.len() != n || maturity.len() != n {
        return Err(SettleError::InvalidArg(format!(
            "front has {n} rows, next has {}, maturity has {}",
            next.len(),
            maturity.len()
        )));
    }
    let front = nan_as_null(front);
    let next = nan_as_null(next);
    let prev_front = shift(&forward_fill_limit(&front, ROLL_GAP_FILL_LIMIT), 1);
    let prev_next = shift(&next, 1);
    let mut adjust = 0.0;
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let roll_day = i == 0 || maturity[i].is_none() || maturity[i] != maturity[i - 1];
        if roll_day && let (Some(f), Some(x)) = (prev_front[i], prev_next[i]) {
            adjust += f - x;
        }
        out.push(front[i].map(|f| f + adjust));
    }
    Ok(out)
}
