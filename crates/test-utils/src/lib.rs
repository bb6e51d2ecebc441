//! Shared test utilities for the UKCP18 STAC workspace.
//!
//! - Synthetic UKCP18-like NetCDF granules ([`GranuleSpec`])
//! - Coordinate and grid generators
//! - Approximate-equality assertions for scalars and bounding boxes
//!
//! ```ignore
//! use test_utils::{assert_approx_eq, GranuleSpec};
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::*;
pub use generators::*;

/// Assert two floats differ by at most `epsilon`.
///
/// ```ignore
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Assert two `[min_x, min_y, max_x, max_y]` arrays agree component-wise.
#[macro_export]
macro_rules! assert_bbox_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: [f64; 4] = $left;
        let right: [f64; 4] = $right;
        for i in 0..4 {
            if (left[i] - right[i]).abs() > $epsilon {
                panic!(
                    "assertion failed: bbox component {} differs\n  left: `{:?}`,\n right: `{:?}`",
                    i, left, right
                );
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    fn test_assert_bbox_approx_eq() {
        assert_bbox_approx_eq!(UK_BBOX, [-10.0000001, 49.0, 2.0, 61.0], 1e-6);
    }

    #[test]
    #[should_panic(expected = "bbox component 3")]
    fn test_assert_bbox_approx_eq_fails() {
        assert_bbox_approx_eq!(UK_BBOX, [-10.0, 49.0, 2.0, 60.0], 1e-6);
    }
}
