use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use super::styling::format_duration;

/// Table and cell creation helpers
pub fn create_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|h| Cell::new(h).fg(TableColor::Cyan)));
    table
}

pub fn state_cell(state: &str) -> Cell {
    let color = match state {
        "open" | "success" | "passed" => TableColor::Green,
        "merged" => TableColor::Magenta,
        "failed" | "canceled" => TableColor::Red,
        "closed" => TableColor::DarkGrey,
        _ => TableColor::Yellow,
    };
    Cell::new(state).fg(color)
}

pub fn duration_cell(seconds: u64) -> Cell {
    let text = format_duration(seconds);
    if seconds <= 600 {
        Cell::new(text).fg(TableColor::Green)
    } else if seconds <= 900 {
        Cell::new(text).fg(TableColor::Yellow)
    } else {
        Cell::new(text).fg(TableColor::Red)
    }
}

/// Truncates long free text for a table column.
pub fn truncate(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}…", head.trim_end())
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("привет мир", 6), "привет…");
    }

    #[test]
    fn table_has_headers() {
        let mut table = create_table(&["ID", "TITLE"]);
        table.add_row(vec![Cell::new("1"), state_cell("open")]);
        let rendered = table.to_string();
        assert!(rendered.contains("TITLE"));
        assert!(rendered.contains("open"));
    }
}
