//! Synthetic grid generators.

/// Creates a grid of near-surface temperatures in Kelvin (about 270K to 290K),
/// shifted by `step` so consecutive time steps differ.
pub fn create_temperature_grid(width: usize, height: usize, step: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let x_factor = col as f32 / width.max(1) as f32;
            let y_factor = row as f32 / height.max(1) as f32;
            data.push(270.0 + x_factor * 10.0 + y_factor * 10.0 + step as f32 * 0.25);
        }
    }
    data
}

/// Cell centres of `count` cells of width `step` starting at edge `start`.
pub fn cell_centres(start: f64, step: f64, count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| start + step * (i as f64 + 0.5))
        .collect()
}

/// `[lower, upper]` edges matching [`cell_centres`], flattened for a `(n, 2)` variable.
pub fn cell_bounds(start: f64, step: f64, count: usize) -> Vec<f64> {
    (0..count)
        .flat_map(|i| {
            let lo = start + step * i as f64;
            [lo, lo + step]
        })
        .collect()
}

/// Temporary output directory, removed when dropped.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("ukcp18-test-")
        .tempdir()
        .expect("Failed to create temporary test directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_grid_range() {
        let grid = create_temperature_grid(12, 12, 0);
        assert!(grid.iter().all(|v| (270.0..=290.0).contains(v)));
    }

    #[test]
    fn test_cell_centres_and_bounds() {
        assert_eq!(cell_centres(-10.0, 1.0, 2), vec![-9.5, -8.5]);
        assert_eq!(cell_bounds(-10.0, 1.0, 2), vec![-10.0, -9.0, -9.0, -8.0]);
    }
}
