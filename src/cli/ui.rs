use crate::core::units::format_units;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    Label,
    Value,
    Success,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::Label => style(text).bold(),
        StyleType::Value => style(text).cyan(),
        StyleType::Success => style(text).green().bold(),
        StyleType::Error => style(text).red(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Right-aligned fixed-point amount, dimmed when zero.
pub fn amount_cell(value: u128, decimals: u8) -> Cell {
    let cell = Cell::new(format_units(value, decimals)).set_alignment(CellAlignment::Right);
    if value == 0 {
        cell.fg(Color::DarkGrey)
    } else {
        cell
    }
}

/// An address, tagged with its label when it has one.
pub fn address_cell(address: &str, label: Option<&str>) -> Cell {
    match label {
        Some(label) => Cell::new(format!("{address} ({label})")).add_attribute(Attribute::Bold),
        None => Cell::new(address),
    }
}

/// Prints a `label: value` line.
pub fn print_field(label: &str, value: &str) {
    println!(
        "{} {}",
        style_text(&format!("{label}:"), StyleType::Label),
        style_text(value, StyleType::Value)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_cell_formats_units() {
        let cell = amount_cell(1_500_000_000_000_000_000, 18);
        assert_eq!(cell.content(), "1.5");
        assert_eq!(amount_cell(0, 18).content(), "0");
    }

    #[test]
    fn test_address_cell_label() {
        assert_eq!(address_cell("0xab", Some("deployer")).content(), "0xab (deployer)");
        assert_eq!(address_cell("0xab", None).content(), "0xab");
    }
}
