//! Numeric helpers shared by the pyramid builder and the matcher.

/// Scale ratio between consecutive pyramid levels, `2^(1 / levels_per_octave)`.
pub(crate) fn scale_step(levels_per_octave: usize) -> f32 {
    2.0f32.powf(1.0 / levels_per_octave.max(1) as f32)
}

/// Floors to `i32`, saturating at the integer range.
pub(crate) fn floor_i32(value: f32) -> i32 {
    let floored = value.floor();
    if floored.is_nan() {
        0
    } else {
        floored.clamp(i32::MIN as f32, i32::MAX as f32) as i32
    }
}

/// Rounds half away from zero to `isize`.
pub(crate) fn round_isize(value: f32) -> isize {
    value.round() as isize
}
