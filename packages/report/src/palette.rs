//! Category colors.

/// Marker colors, assigned to categories in first-seen order.
pub const DEFAULT_PALETTE: &[&str] = &[
    "red",
    "blue",
    "purple",
    "orange",
    "pink",
    "darkred",
    "cadetblue",
    "deeppink",
    "green",
];

/// A category and the color assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryColor {
    /// Category label.
    pub category: String,
    /// CSS color name.
    pub color: String,
}

/// Pairs each category with a palette color, cycling through the palette
/// when there are more categories than colors.
///
/// An empty palette falls back to [`DEFAULT_PALETTE`].
#[must_use]
pub fn assign_colors(categories: &[String], palette: &[String]) -> Vec<CategoryColor> {
    let fallback: Vec<String>;
    let palette = if palette.is_empty() {
        fallback = DEFAULT_PALETTE.iter().map(ToString::to_string).collect();
        &fallback
    } else {
        palette
    };

    categories
        .iter()
        .enumerate()
        .map(|(i, category)| CategoryColor {
            category: category.clone(),
            color: palette[i % palette.len()].clone(),
        })
        .collect()
}
