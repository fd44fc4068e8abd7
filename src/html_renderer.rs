//! Standalone HTML snapshot of a rendered table page
//!
//! Cell bodies come straight from `RenderedCell::markup`, which is already
//! escaped. Everything else that reaches the document is escaped here.

use std::fmt::Write as _;

use crate::view::cell_formatter::escape_html;
use crate::view::{PageItem, SortOrder, TableRender};

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 1.5rem; color: #1f2937; }
table { border-collapse: collapse; width: 100%; font-size: 0.9rem; }
th, td { border: 1px solid #e5e7eb; padding: 0.4rem 0.6rem; text-align: left; }
th.sort-asc::after { content: " \25B2"; }
th.sort-desc::after { content: " \25BC"; }
.null-value { color: #9ca3af; font-style: italic; }
.number-value { font-variant-numeric: tabular-nums; }
.boolean-true { color: #059669; }
.boolean-false { color: #dc2626; }
.date-value, .datetime-value { color: #7c3aed; }
.no-data { text-align: center; color: #6b7280; padding: 2rem; }
.pagination span { margin-right: 0.4rem; }
.pagination .current { font-weight: bold; }
"#;

pub fn render_html(render: &TableRender) -> String {
    let title = render.table.as_deref().unwrap_or("Table");
    let mut html = String::new();

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>{}</style>\n</head>\n<body>\n<h1>{}</h1>\n",
        escape_html(title),
        STYLE,
        escape_html(title)
    );

    if !render.search_term.is_empty() {
        let _ = writeln!(
            html,
            "<p class=\"search\">Search: <strong>{}</strong> in {}</p>",
            escape_html(&render.search_term),
            escape_html(&render.search_scope.to_string())
        );
    }

    html.push_str("<table>\n<thead><tr>");
    for header in &render.headers {
        let class = match header.sort {
            Some(SortOrder::Asc) => "sortable sort-asc",
            Some(SortOrder::Desc) => "sortable sort-desc",
            None => "sortable",
        };
        let _ = write!(
            html,
            "<th class=\"{}\" title=\"{}\">{}</th>",
            class,
            escape_html(&header.declared_type),
            escape_html(&header.name)
        );
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    if let Some(placeholder) = &render.placeholder {
        let _ = writeln!(
            html,
            "<tr><td class=\"no-data\" colspan=\"{}\">{}</td></tr>",
            render.headers.len().max(1),
            escape_html(placeholder)
        );
    }
    for row in &render.rows {
        html.push_str("<tr>");
        for cell in row {
            match &cell.tooltip {
                Some(tooltip) => {
                    let _ = write!(html, "<td title=\"{}\">{}</td>", escape_html(tooltip), cell.markup);
                }
                None => {
                    let _ = write!(html, "<td>{}</td>", cell.markup);
                }
            }
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>\n");

    if let Some(range) = &render.range_text {
        let _ = writeln!(html, "<p class=\"stats\">{}</p>", escape_html(range));
    }
    if let Some(strip) = &render.strip {
        html.push_str("<div class=\"pagination\">");
        for item in &strip.items {
            match item {
                PageItem::Page { number, current: true } => {
                    let _ = write!(html, "<span class=\"current\">{}</span>", number);
                }
                PageItem::Page { number, .. } => {
                    let _ = write!(html, "<span>{}</span>", number);
                }
                PageItem::Ellipsis => html.push_str("<span>&hellip;</span>"),
            }
        }
        html.push_str("</div>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}
