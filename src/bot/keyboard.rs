//! Reply keyboard layout

/// Lay `items` out in rows of at most `max_columns` buttons
pub fn keyboard_layout<T: ToString>(items: &[T], max_columns: usize) -> Vec<Vec<String>> {
    let columns = max_columns.max(1);
    items
        .chunks(columns)
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect()
}
