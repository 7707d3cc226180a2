//! Terminal rendering for client results
//!
//! Records print as a table, pretty JSON, or `Header: value` lines. Notices
//! (created, removed, drift summary) are human text and are left out under
//! `--format json`, so stdout stays a single JSON document.

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::json;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Bordered table
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
    /// `Header: value` lines
    Plain,
}

/// A result that renders as one table row
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// Why a client command produced no record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    NotFound,
    NotAuthorized,
}

impl Refusal {
    fn message(self) -> &'static str {
        match self {
            Refusal::NotFound => "No such client",
            Refusal::NotAuthorized => "Not authorized",
        }
    }

    fn code(self) -> &'static str {
        match self {
            Refusal::NotFound => "not_found",
            Refusal::NotAuthorized => "not_authorized",
        }
    }
}

/// Tone of a human-readable notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Done,
    Caution,
}

fn plain_lines<T: TableDisplay>(item: &T) -> String {
    T::headers()
        .iter()
        .zip(item.row())
        .map(|(header, value)| format!("{}: {}", header, value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render several records; JSON is an array
pub fn render_records<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }
            table.to_string()
        }
        OutputFormat::Json => serde_json::to_string_pretty(items).unwrap_or_default(),
        OutputFormat::Plain => items.iter().map(plain_lines).collect::<Vec<_>>().join("\n---\n"),
    }
}

/// Render one record; JSON is an object
pub fn render_record<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(item).unwrap_or_default(),
        _ => render_records(std::slice::from_ref(item), format),
    }
}

/// Render a refusal, naming the client when there is one
pub fn render_refusal(refusal: Refusal, client: Option<&str>, format: OutputFormat) -> String {
    match (format, client) {
        (OutputFormat::Json, _) => json!({ "error": refusal.code(), "client": client }).to_string(),
        (_, Some(name)) => format!("{}: {}", refusal.message(), name),
        (_, None) => refusal.message().to_string(),
    }
}

pub fn print_record<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) {
    println!("{}", render_record(item, format));
}

/// Print records, or `empty` when there are none (JSON prints `[]`)
pub fn print_records<T: Serialize + TableDisplay>(items: &[T], empty: &str, format: OutputFormat) {
    if items.is_empty() && format != OutputFormat::Json {
        println!("{}", empty);
    } else {
        println!("{}", render_records(items, format));
    }
}

pub fn print_refusal(refusal: Refusal, client: Option<&str>, format: OutputFormat) {
    println!("{}", render_refusal(refusal, client, format));
}

pub fn print_notice(notice: Notice, message: &str, format: OutputFormat) {
    if format == OutputFormat::Json {
        return;
    }
    match notice {
        Notice::Done => println!("✅ {}", message),
        Notice::Caution => println!("⚠️  {}", message),
    }
}

/// Raw client config text, as it would be imported into a WireGuard app
pub fn print_config_text(contents: &str) {
    if contents.ends_with('\n') {
        print!("{}", contents);
    } else {
        println!("{}", contents);
    }
}

pub fn print_pong(format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", json!({ "status": "pong" })),
        _ => println!("pong"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Peer {
        name: String,
        address: String,
    }

    impl TableDisplay for Peer {
        fn headers() -> Vec<&'static str> {
            vec!["Name", "Address"]
        }

        fn row(&self) -> Vec<String> {
            vec![self.name.clone(), self.address.clone()]
        }
    }

    fn peer(name: &str, address: &str) -> Peer {
        Peer {
            name: name.to_string(),
            address: address.to_string(),
        }
    }

    #[test]
    fn test_single_record_json_is_object() {
        let out = render_record(&peer("alice", "10.8.1.2/32"), OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["address"], "10.8.1.2/32");
    }

    #[test]
    fn test_plain_records_are_separated() {
        let out = render_records(
            &[peer("alice", "10.8.1.2/32"), peer("bob", "10.8.1.3/32")],
            OutputFormat::Plain,
        );
        assert_eq!(
            out,
            "Name: alice\nAddress: 10.8.1.2/32\n---\nName: bob\nAddress: 10.8.1.3/32"
        );
    }

    #[test]
    fn test_table_has_headers_and_rows() {
        let out = render_record(&peer("alice", "10.8.1.2/32"), OutputFormat::Table);
        assert!(out.contains("Address"));
        assert!(out.contains("10.8.1.2/32"));
    }

    #[test]
    fn test_refusals() {
        assert_eq!(
            render_refusal(Refusal::NotFound, Some("carol"), OutputFormat::Table),
            "No such client: carol"
        );
        assert_eq!(
            render_refusal(Refusal::NotAuthorized, None, OutputFormat::Plain),
            "Not authorized"
        );

        let value: serde_json::Value = serde_json::from_str(&render_refusal(
            Refusal::NotFound,
            Some("carol"),
            OutputFormat::Json,
        ))
        .unwrap();
        assert_eq!(value["error"], "not_found");
        assert_eq!(value["client"], "carol");
    }
}
