//! Quality ramp for repeated degrade passes

/// Qualities for `count` degrade passes starting at `base`
///
/// Pass `i` uses `base - (base / count / 2) * i`, truncated toward zero
/// as an integer quality argument is, then clamped to 1..=100. A `count`
/// of 0 is treated as 1.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn degrade_schedule(base: u8, count: u32) -> Vec<u8> {
    let count = count.max(1);
    let base = f64::from(base);
    let step = base / f64::from(count) / 2.0;

    (0..count)
        .map(|i| (base - step * f64::from(i)).trunc().clamp(1.0, 100.0) as u8)
        .collect()
}
