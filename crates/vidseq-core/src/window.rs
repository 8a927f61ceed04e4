//! Temporal window generation.
//!
//! A window is `n_frames` positions centred on a target frame. Positions that
//! fall outside `[0, len)` are resolved by a [`Padding`] policy; for windows
//! fully inside the sequence every policy yields the same contiguous run.

use crate::config::Padding;

/// Positions of the `n_frames` neighbours of `position` in a sequence of
/// `len` frames, ordered from earliest to latest offset.
///
/// Every returned value is a valid position. When a policy's own rule still
/// lands outside the sequence (only possible when `len < n_frames`), the value
/// is wrapped with `rem_euclid(len)`.
pub fn neighbor_indices(position: usize, len: usize, n_frames: usize, padding: Padding) -> Vec<usize> {
    assert!(len > 0, "cannot build a window over an empty sequence");
    assert!(position < len, "position {position} out of range for sequence of {len}");

    let half = (n_frames / 2) as i64;
    let pos = position as i64;
    let len = len as i64;
    let last = len - 1;

    (pos - half..pos - half + n_frames as i64)
        .map(|i| {
            let resolved = if (0..len).contains(&i) {
                i
            } else {
                match padding {
                    Padding::Replicate => i.clamp(0, last),
                    Padding::Reflect => reflect(i, last),
                    Padding::NewInfo if i < 0 => (pos + half) - i,
                    Padding::NewInfo => (pos - half) - (i - last),
                    Padding::Circular => i,
                }
            };
            resolved.rem_euclid(len) as usize
        })
        .collect()
}

/// Whether `position` is close enough to either end of its sequence that its
/// window needs padding.
pub fn is_boundary(position: usize, len: usize, half_window: usize) -> bool {
    position < half_window || position + half_window >= len
}

/// Mirror `i` into `[0, last]` without repeating the edge frame, folding
/// repeatedly so arbitrarily distant offsets still land in range.
fn reflect(i: i64, last: i64) -> i64 {
    if last == 0 {
        return 0;
    }
    let period = 2 * last;
    let m = i.rem_euclid(period);
    if m > last {
        period - m
    } else {
        m
    }
}
