use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use crossterm::style::Stylize;

use crate::api::DatabaseInfo;
use crate::view::{CellKind, RenderedCell, TableRender};

fn cell_for(rendered: &RenderedCell) -> Cell {
    let cell = Cell::new(&rendered.text);
    match rendered.kind {
        CellKind::Null => cell.fg(Color::DarkGrey).add_attribute(Attribute::Italic),
        CellKind::Number => cell.fg(Color::Cyan),
        CellKind::Date | CellKind::DateTime => cell.fg(Color::Magenta),
        CellKind::Boolean(true) => cell.fg(Color::Green),
        CellKind::Boolean(false) => cell.fg(Color::Red),
        CellKind::Url | CellKind::Email => cell.fg(Color::Blue).add_attribute(Attribute::Underlined),
        CellKind::LongText | CellKind::Text => cell,
    }
}

/// Build a comfy-table from the render model of one page
pub fn build_table(render: &TableRender) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(
        render
            .headers
            .iter()
            .map(|h| Cell::new(format!("{}{}", h.name, h.sort_marker())).add_attribute(Attribute::Bold)),
    );

    if let Some(placeholder) = &render.placeholder {
        table.add_row(vec![Cell::new(placeholder).add_attribute(Attribute::Italic)]);
        return table;
    }

    for row in &render.rows {
        table.add_row(row.iter().map(cell_for));
    }
    table
}

pub fn display_table(render: &TableRender) {
    println!("{}", build_table(render));
    if let Some(range) = &render.range_text {
        println!("\n{}", range.as_str().green());
    }
    if let Some(strip) = &render.strip {
        let pages: Vec<String> = strip
            .items
            .iter()
            .map(|item| match item {
                crate::view::PageItem::Page { number, current: true } => format!("[{}]", number),
                crate::view::PageItem::Page { number, .. } => number.to_string(),
                crate::view::PageItem::Ellipsis => "…".to_string(),
            })
            .collect();
        println!("Pages: {}", pages.join(" "));
    }
}

pub fn display_databases(databases: &[DatabaseInfo]) {
    if databases.is_empty() {
        println!("{}", "No databases uploaded.".yellow());
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        ["Id", "Name", "Tables", "Size", "Modified"]
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
    );
    for db in databases {
        table.add_row(vec![
            Cell::new(&db.filename),
            Cell::new(db.display_name()),
            Cell::new(db.table_count),
            Cell::new(format_file_size(db.file_size)),
            Cell::new(db.modified_time.as_deref().unwrap_or("")),
        ]);
    }

    println!("{table}");
    println!("\n{}", format!("{} databases", databases.len()).green());
}

pub fn display_tables(tables: &[String]) {
    if tables.is_empty() {
        println!("{}", "No tables found.".yellow());
        return;
    }
    for table in tables {
        println!("{table}");
    }
}

/// `1536` -> `1.5 KB`
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    let rounded = (size * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{HeaderCell, LoadPhase, SearchScope, SortOrder};

    fn render_with(rows: Vec<Vec<RenderedCell>>, placeholder: Option<String>) -> TableRender {
        TableRender {
            table: Some("Orders".to_string()),
            phase: LoadPhase::Loaded,
            headers: vec![HeaderCell {
                name: "Total".to_string(),
                declared_type: "REAL".to_string(),
                sort: Some(SortOrder::Desc),
            }],
            rows,
            placeholder,
            scope_options: vec!["Total".to_string()],
            search_scope: SearchScope::All,
            search_term: String::new(),
            strip: None,
            range_text: None,
        }
    }

    #[test]
    fn test_build_table_with_rows() {
        let cell = RenderedCell {
            kind: CellKind::Number,
            text: "1,234.50".to_string(),
            markup: String::new(),
            tooltip: None,
        };
        let output = build_table(&render_with(vec![vec![cell]], None)).to_string();
        assert!(output.contains("Total ▼"));
        assert!(output.contains("1,234.50"));
    }

    #[test]
    fn test_build_table_placeholder() {
        let output = build_table(&render_with(vec![], Some("No data found".to_string()))).to_string();
        assert!(output.contains("No data found"));
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5 MB");
    }
}
