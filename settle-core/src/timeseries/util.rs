//! Null-aware helpers over `Option` series.

/// Carry the last non-null value forward over nulls.
#[must_use]
pub fn forward_fill<T: Copy>(values: &[Option<T>]) -> Vec<Option<T>> {
    let mut last = None;
    values
        .iter()
        .map(|v| {
            if v.is_some() {
                last = *v;
            }
            last
        })
        .collect()
}

/// Like [`forward_fill`], filling at most `limit` consecutive nulls.
#[must_use]
pub fn forward_fill_limit<T: Copy>(values: &[Option<T>], limit: usize) -> Vec<Option<T>> {
    let mut last = None;
    let mut gap = 0usize;
    values
        .iter()
        .map(|v| match v {
            Some(_) => {
                last = *v;
                gap = 0;
                *v
            }
            None => {
                gap += 1;
                if gap <= limit { last } else { None }
            }
        })
        .collect()
}

/// Carry the next non-null value backward over nulls.
#[must_use]
pub fn backward_fill<T: Copy>(values: &[Option<T>]) -> Vec<Option<T>> {
    let mut next = None;
    let mut out: Vec<Option<T>> = values
        .iter()
        .rev()
        .map(|v| {
            if v.is_some() {
                next = *v;
            }
            next
        })
        .collect();
    out.reverse();
    out
}

/// Maximal runs of consecutive nulls as inclusive `(start, end)` positions.
#[must_use]
pub fn null_runs<T>(values: &[Option<T>]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, v) in values.iter().enumerate() {
        match (v.is_none(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push((s, i - 1));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, values.len() - 1));
    }
    runs
}

/// Shift values down by `periods` rows; the first `periods` rows become null.
#[must_use]
pub fn shift<T: Copy>(values: &[Option<T>], periods: usize) -> Vec<Option<T>> {
    let n = values.len();
    let lead = periods.min(n);
    let mut out = vec![None; lead];
    out.extend_from_slice(&values[..n - lead]);
    out
}

/// Read `Some(NaN)` as a missing value.
#[must_use]
pub fn nan_as_null(values: &[Option<f64>]) -> Vec<Option<f64>> {
    values.iter().map(|v| v.filter(|x| !x.is_nan())).collect()
}
