/// Builds a `NonZero` integer from a literal, for channel counts and sample rates.
///
/// Panics (at compile time when used in a `const`) if the value is zero.
///
/// ```
/// use bgmloop::{nz, ChannelCount};
/// const STEREO: ChannelCount = nz!(2);
/// ```
#[macro_export]
macro_rules! nz {
    ($n:expr) => {
        match ::core::num::NonZero::new($n) {
            Some(n) => n,
            None => panic!("nz!: value must be non-zero"),
        }
    };
}

/// Linear interpolation between two gains.
///
/// The result is equivalent to
/// `first * (1 - numerator / denominator) + second * numerator / denominator`.
/// A zero `denominator` yields `second`.
#[inline]
pub fn lerp(first: f32, second: f32, numerator: u64, denominator: u64) -> f32 {
    if denominator == 0 {
        return second;
    }
    first + (second - first) * (numerator as f64 / denominator as f64) as f32
}
