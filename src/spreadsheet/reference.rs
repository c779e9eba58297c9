//! Conversions between A1-style cell references and 0-based indexes

/// Largest column index a worksheet may use (`XFD`)
pub const MAX_COLUMN: usize = 16_383;

/// Largest row index a worksheet may use (`1048576`)
pub const MAX_ROW: usize = 1_048_575;

/// Converts a column label (`A`, `AB`, ...) to a 0-based index
pub fn col_to_index(label: &str) -> Option<usize> {
    if label.is_empty() {
        return None;
    }
    let mut index = 0usize;
    for character in label.chars() {
        if !character.is_ascii_alphabetic() {
            return None;
        }
        let digit = (character.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
    }
    Some(index - 1)
}

/// Converts a 1-based row label (`1`, `42`) to a 0-based index
pub fn row_to_index(label: &str) -> Option<usize> {
    if label.is_empty() || !label.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    label.parse::<usize>().ok()?.checked_sub(1)
}

/// Converts an `A1` style reference to a 0-based `(row, col)` pair
pub fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let split = reference.find(|character: char| character.is_ascii_digit())?;
    let (col, row) = reference.split_at(split);
    Some((row_to_index(row)?, col_to_index(col)?))
}

/// Converts a 0-based column index to its label
pub fn index_to_col(col: usize) -> String {
    let mut col = col + 1;
    let mut label = Vec::<u8>::new();
    while col > 0 {
        col -= 1;
        label.push(b'A' + (col % 26) as u8);
        col /= 26;
    }
    label.iter().rev().map(|byte| *byte as char).collect()
}

/// Converts a 0-based `(row, col)` pair to an `A1` style reference
pub fn index_to_reference(row: usize, col: usize) -> String {
    format!("{}{}", index_to_col(col), row.saturating_add(1))
}
