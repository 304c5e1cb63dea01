//! Masonry grid placement and per-pin tile heights.

pub const DEFAULT_COLUMNS: usize = 4;

pub const MIN_PIN_HEIGHT: u32 = 280;
pub const MAX_PIN_HEIGHT: u32 = 450;

/// Number of grid columns for a viewport width in CSS pixels.
pub fn column_count(width: Option<u32>) -> usize {
    match width {
        None => DEFAULT_COLUMNS,
        Some(w) if w < 640 => 1,
        Some(w) if w < 768 => 2,
        Some(w) if w < 1024 => 3,
        Some(w) if w < 1280 => 4,
        Some(_) => 5,
    }
}

/// Deal items round-robin into `columns` columns: item `i` lands in column
/// `i % columns`.
pub fn assign_columns<T: Clone>(items: &[T], columns: usize) -> Vec<Vec<T>> {
    let columns = columns.max(1);
    let mut grid: Vec<Vec<T>> = vec![Vec::new(); columns];
    for (idx, item) in items.iter().enumerate() {
        grid[idx % columns].push(item.clone());
    }
    grid
}

/// Stable tile height for a pin id, between [`MIN_PIN_HEIGHT`] and
/// [`MAX_PIN_HEIGHT`].
pub fn pin_height(id: &str) -> u32 {
    let hash = id
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)));
    let normalized = i64::from(hash).abs() as f64 / i32::MAX as f64;
    let height = (normalized * 170.0).floor() as u32 + MIN_PIN_HEIGHT;
    height.clamp(MIN_PIN_HEIGHT, MAX_PIN_HEIGHT)
}
