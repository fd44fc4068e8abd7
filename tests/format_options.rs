use dbview::config::Config;
use dbview::html_renderer::render_html;
use dbview::view::{CellFormatter, CellKind, FormatOptions};
use serde_json::json;

fn formatter(options: FormatOptions) -> CellFormatter {
    CellFormatter::new(options)
}

#[test]
fn test_custom_locale_profile() {
    let formatter = formatter(FormatOptions {
        date_format: "%d.%m.%Y".to_string(),
        datetime_format: "%d.%m.%Y %H:%M".to_string(),
        ..FormatOptions::default()
    });

    let cell = formatter.format(Some(&json!("2024-01-15")), "DATE");
    assert_eq!(cell.text, "15.01.2024");

    let cell = formatter.format(Some(&json!("2024-01-15 13:45:00")), "DATETIME");
    assert_eq!(cell.kind, CellKind::DateTime);
    assert_eq!(cell.text, "15.01.2024 13:45");
}

#[test]
fn test_invalid_strftime_falls_back_to_iso() {
    let formatter = formatter(FormatOptions {
        date_format: "%Q".to_string(),
        datetime_format: "%Q".to_string(),
        ..FormatOptions::default()
    });

    assert_eq!(formatter.format(Some(&json!("03/09/2024")), "TEXT").text, "2024-03-09");
    assert_eq!(
        formatter.format(Some(&json!("2024-03-09T10:00:00")), "TEXT").text,
        "2024-03-09 10:00:00"
    );
}

#[test]
fn test_thresholds_come_from_options() {
    let formatter = formatter(FormatOptions {
        url_label_max: 10,
        text_truncate_at: 5,
        tooltip_threshold: 3,
        ..FormatOptions::default()
    });

    let cell = formatter.format(Some(&json!("https://example.com/path")), "TEXT");
    assert_eq!(cell.text, "https://ex...");

    let cell = formatter.format(Some(&json!("abcdefgh")), "TEXT");
    assert_eq!(cell.kind, CellKind::LongText);
    assert_eq!(cell.text, "abcde...");
    assert_eq!(cell.tooltip.as_deref(), Some("abcdefgh"));

    assert_eq!(formatter.format(Some(&json!("abc")), "TEXT").tooltip, None);
}

#[test]
fn test_format_section_in_config_file() {
    let config: Config = toml::from_str(
        r#"
[format]
date_format = "%Y/%m/%d"
text_truncate_at = 20
"#,
    )
    .unwrap();
    let formatter = config.view_controller().formatter().clone();
    assert_eq!(formatter.options().text_truncate_at, 20);
    assert_eq!(formatter.options().url_label_max, 50);
    assert_eq!(formatter.format(Some(&json!("2024-01-15")), "TEXT").text, "2024/01/15");
}

#[test]
fn test_rule_order_is_fixed() {
    assert_eq!(
        CellFormatter::rule_names(),
        vec!["null", "date", "number", "boolean", "url", "email", "long_text", "text"]
    );
}

#[test]
fn test_html_snapshot_of_empty_render() {
    let view = dbview::view::TableViewController::default();
    let html = render_html(&view.render());
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<title>Table</title>"));
}
