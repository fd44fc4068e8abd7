//! Cell type inference and safe rendering
//!
//! A raw cell value is classified by an ordered rule chain (first match
//! wins) and rendered as an HTML fragment plus a markup-free display string.
//! Every piece of data that ends up inside the fragment, text or attribute,
//! is HTML-escaped first.

use std::fmt::Write as _;
use std::sync::LazyLock;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Textual shapes that may hold a date. Matching is a prefix match; the full
/// value must still parse as a calendar date.
static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // YYYY-MM-DD
        Regex::new(r"^\d{4}-\d{2}-\d{2}").unwrap(),
        // MM/DD/YYYY
        Regex::new(r"^\d{2}/\d{2}/\d{4}").unwrap(),
        // MM-DD-YYYY
        Regex::new(r"^\d{2}-\d{2}-\d{4}").unwrap(),
        // ISO 8601 datetime
        Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}").unwrap(),
    ]
});

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

static MARKUP_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m-%d-%Y %H:%M:%S",
    "%m-%d-%Y %H:%M",
];

/// ISO forms with an offset but no seconds; `Z` is rewritten to `+00:00` first
const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M%:z", "%Y-%m-%d %H:%M%:z"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m-%d-%Y"];

/// Declared column types that allow numeric formatting
pub const NUMERIC_TYPES: &[&str] = &[
    "Number", "Integer", "Float", "Double", "Decimal", "Currency", "REAL", "INTEGER", "NUMERIC",
];

const BOOLEAN_TOKENS: &[&str] = &["true", "false", "1", "0", "yes", "no", "y", "n"];
const TRUTHY_TOKENS: &[&str] = &["true", "1", "yes", "y"];

pub const NULL_TOOLTIP: &str = "NULL value";

/// Display category a value was classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Null,
    Date,
    DateTime,
    Number,
    Boolean(bool),
    Url,
    Email,
    LongText,
    Text,
}

/// Output of the formatter for one cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCell {
    pub kind: CellKind,
    /// Display text without markup
    pub text: String,
    /// Safe HTML fragment
    pub markup: String,
    pub tooltip: Option<String>,
}

/// Locale profile and thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// strftime format for date-only values
    pub date_format: String,
    /// strftime format for values carrying a time component
    pub datetime_format: String,
    /// Maximum characters of a URL shown as link label
    pub url_label_max: usize,
    /// Plain text longer than this is truncated
    pub text_truncate_at: usize,
    /// Values longer than this carry their full text as tooltip
    pub tooltip_threshold: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            date_format: "%-m/%-d/%Y".to_string(),
            datetime_format: "%-m/%-d/%Y, %-I:%M:%S %p".to_string(),
            url_label_max: 50,
            text_truncate_at: 100,
            tooltip_threshold: 50,
        }
    }
}

struct Classified {
    kind: CellKind,
    text: String,
    markup: String,
}

type Rule = fn(&CellFormatter, &str, &str) -> Option<Classified>;

/// Classification order after the null check. Earlier rules win; a value
/// claimed by one rule is never looked at by a later one.
const RULES: &[(&str, Rule)] = &[
    ("date", CellFormatter::date_rule as Rule),
    ("number", CellFormatter::number_rule as Rule),
    ("boolean", CellFormatter::boolean_rule as Rule),
    ("url", CellFormatter::url_rule as Rule),
    ("email", CellFormatter::email_rule as Rule),
    ("long_text", CellFormatter::long_text_rule as Rule),
    ("text", CellFormatter::text_rule as Rule),
];

#[derive(Debug, Clone, Default)]
pub struct CellFormatter {
    options: FormatOptions,
}

impl CellFormatter {
    pub fn new(options: FormatOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FormatOptions {
        &self.options
    }

    /// Names of the classification rules in priority order
    pub fn rule_names() -> Vec<&'static str> {
        std::iter::once("null")
            .chain(RULES.iter().map(|(name, _)| *name))
            .collect()
    }

    /// Format a cell. `None` is a value missing from the row.
    pub fn format(&self, value: Option<&Value>, declared_type: &str) -> RenderedCell {
        let Some(text) = raw_text(value) else {
            return RenderedCell {
                kind: CellKind::Null,
                text: "NULL".to_string(),
                markup: r#"<span class="null-value">NULL</span>"#.to_string(),
                tooltip: Some(NULL_TOOLTIP.to_string()),
            };
        };

        let classified = RULES
            .iter()
            .find_map(|(_, rule)| rule(self, &text, declared_type))
            .unwrap_or_else(|| Classified {
                kind: CellKind::Text,
                markup: escape_html(&text),
                text: text.clone(),
            });

        let tooltip = (text.chars().count() > self.options.tooltip_threshold).then_some(text);

        RenderedCell {
            kind: classified.kind,
            text: classified.text,
            markup: classified.markup,
            tooltip,
        }
    }

    fn date_rule(&self, text: &str, _declared_type: &str) -> Option<Classified> {
        if !DATE_PATTERNS.iter().any(|pattern| pattern.is_match(text)) {
            return None;
        }

        let has_time = text.contains('T') || text.contains(':');
        let (kind, formatted, class) = match parse_calendar_value(text)? {
            ParsedDate::DateTime(dt) if has_time => (
                CellKind::DateTime,
                render_datetime(&dt, &self.options.datetime_format),
                "datetime-value",
            ),
            ParsedDate::DateTime(dt) => (
                CellKind::Date,
                render_date(&dt.date(), &self.options.date_format),
                "date-value",
            ),
            ParsedDate::Date(date) => (
                CellKind::Date,
                render_date(&date, &self.options.date_format),
                "date-value",
            ),
        };

        Some(Classified {
            kind,
            markup: format!(r#"<span class="{}">{}</span>"#, class, escape_html(&formatted)),
            text: formatted,
        })
    }

    fn number_rule(&self, text: &str, declared_type: &str) -> Option<Classified> {
        if !is_numeric_type(declared_type) {
            return None;
        }
        let number = text.trim().parse::<f64>().ok().filter(|n| n.is_finite())?;
        let formatted = format_number(number);
        Some(Classified {
            kind: CellKind::Number,
            markup: format!(r#"<span class="number-value">{}</span>"#, formatted),
            text: formatted,
        })
    }

    fn boolean_rule(&self, text: &str, _declared_type: &str) -> Option<Classified> {
        let lower = text.to_lowercase();
        if !BOOLEAN_TOKENS.contains(&lower.as_str()) {
            return None;
        }
        let truthy = TRUTHY_TOKENS.contains(&lower.as_str());
        let (class, icon, label) = if truthy {
            ("boolean-true", "&#10004;", "True")
        } else {
            ("boolean-false", "&#10008;", "False")
        };
        Some(Classified {
            kind: CellKind::Boolean(truthy),
            text: label.to_string(),
            markup: format!(
                r#"<span class="boolean-value {}"><span class="icon">{}</span> {}</span>"#,
                class, icon, label
            ),
        })
    }

    fn url_rule(&self, text: &str, _declared_type: &str) -> Option<Classified> {
        if !(text.starts_with("http://") || text.starts_with("https://")) {
            return None;
        }
        reqwest::Url::parse(text).ok()?;
        let label = truncate_chars(text, self.options.url_label_max);
        Some(Classified {
            kind: CellKind::Url,
            markup: format!(
                r#"<a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
                escape_html(text),
                escape_html(&label)
            ),
            text: label,
        })
    }

    fn email_rule(&self, text: &str, _declared_type: &str) -> Option<Classified> {
        if !EMAIL_PATTERN.is_match(text) {
            return None;
        }
        let escaped = escape_html(text);
        Some(Classified {
            kind: CellKind::Email,
            markup: format!(r#"<a href="mailto:{}">{}</a>"#, escaped, escaped),
            text: text.to_string(),
        })
    }

    fn long_text_rule(&self, text: &str, _declared_type: &str) -> Option<Classified> {
        let limit = self.options.text_truncate_at;
        if text.chars().count() <= limit {
            return None;
        }
        let truncated = truncate_chars(text, limit);
        Some(Classified {
            kind: CellKind::LongText,
            markup: format!(
                r#"<span class="truncated-text" title="{}">{}</span>"#,
                escape_html(text),
                escape_html(&truncated)
            ),
            text: truncated,
        })
    }

    fn text_rule(&self, text: &str, _declared_type: &str) -> Option<Classified> {
        Some(Classified {
            kind: CellKind::Text,
            markup: escape_html(text),
            text: text.to_string(),
        })
    }
}

enum ParsedDate {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

fn parse_calendar_value(text: &str) -> Option<ParsedDate> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(ParsedDate::DateTime(dt.with_timezone(&Local).naive_local()));
    }

    let zulu = match text.strip_suffix(['Z', 'z']) {
        Some(rest) => format!("{}+00:00", rest),
        None => text.to_string(),
    };
    if let Some(dt) = OFFSET_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&zulu, fmt).ok())
    {
        return Some(ParsedDate::DateTime(dt.with_timezone(&Local).naive_local()));
    }

    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(ParsedDate::DateTime)
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .map(ParsedDate::Date)
        })
}

fn render_date(date: &NaiveDate, fmt: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", date.format(fmt)).is_err() {
        out.clear();
        out.push_str(&date.format("%Y-%m-%d").to_string());
    }
    out
}

fn render_datetime(dt: &NaiveDateTime, fmt: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", dt.format(fmt)).is_err() {
        out.clear();
        out.push_str(&dt.format("%Y-%m-%d %H:%M:%S").to_string());
    }
    out
}

pub fn is_numeric_type(declared_type: &str) -> bool {
    NUMERIC_TYPES.contains(&declared_type)
}

/// Integers get grouping separators; fractions keep 2 to 6 digits
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        return group_integer_part(&format!("{:.0}", value));
    }

    let fixed = format!("{:.6}", value);
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let mut frac = frac_part.trim_end_matches('0').to_string();
    while frac.len() < 2 {
        frac.push('0');
    }
    format!("{}.{}", group_integer_part(int_part), frac)
}

fn group_integer_part(int_part: &str) -> String {
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int_part),
    };
    let mut out = String::with_capacity(int_part.len() + digits.len() / 3);
    out.push_str(sign);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Text form of a raw cell value; `None` for null, missing and empty values
pub fn raw_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Remove anything that looks like a markup tag
pub fn strip_markup(text: &str) -> String {
    MARKUP_TAG.replace_all(text, "").into_owned()
}

/// First `limit` characters plus `...` when the text is longer
pub fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let mut out: String = text.chars().take(limit).collect();
        out.push_str("...");
        out
    } else {
        text.to_string()
    }
}
