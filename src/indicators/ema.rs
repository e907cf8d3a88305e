// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// Span-parameterised, seeded with the first observation (no SMA warm-up):
//   alpha  = 2 / (span + 1)
//   ema[0] = v[0]
//   ema[i] = alpha * v[i] + (1 - alpha) * ema[i-1]
//
// The output has the same length as the input, so it can be plotted against
// the bars it was computed from.
// =============================================================================

/// Smoothing factor for `span`. `None` for a zero span.
pub fn ema_alpha(span: usize) -> Option<f64> {
    (span > 0).then(|| 2.0 / (span as f64 + 1.0))
}

/// EMA over a fully defined series.
///
/// Returns an empty `Vec` when `span == 0`. Non-finite inputs are treated as
/// missing (see [`calculate_ema_partial`]) and come out as `NaN` only before
/// the first finite value.
pub fn calculate_ema(values: &[f64], span: usize) -> Vec<f64> {
    let partial: Vec<Option<f64>> = values
        .iter()
        .map(|v| v.is_finite().then_some(*v))
        .collect();

    calculate_ema_partial(&partial, span)
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect()
}

/// EMA over a series with undefined entries (e.g. SMA warm-up).
///
/// Outputs stay `None` until the first defined value, which seeds the EMA. A
/// later `None` repeats the previous EMA. Returns an empty `Vec` when
/// `span == 0`.
pub fn calculate_ema_partial(values: &[Option<f64>], span: usize) -> Vec<Option<f64>> {
    let Some(alpha) = ema_alpha(span) else {
        return Vec::new();
    };

    let mut prev: Option<f64> = None;
    values
        .iter()
        .map(|v| {
            prev = match (*v, prev) {
                (Some(x), Some(p)) => Some(alpha * x + (1.0 - alpha) * p),
                (Some(x), None) => Some(x),
                (None, p) => p,
            };
            prev
        })
        .collect()
}
