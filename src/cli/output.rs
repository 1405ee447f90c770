//! CLI Output Formatting.
//!
//! Renders command results as styled text, JSON or bare values. Rendering
//! returns strings; [`OutputFormatter::emit`] writes them to the terminal.

use console::{style, Term};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMAT
// ═══════════════════════════════════════════════════════════════════════════════

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
    /// Pretty JSON format
    JsonPretty,
    /// Minimal format (values only)
    Minimal,
}

impl OutputFormat {
    /// Whether the format is machine-readable JSON
    pub fn is_json(&self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::JsonPretty)
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Ok(OutputFormat::JsonPretty),
            "minimal" | "min" => Ok(OutputFormat::Minimal),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMATTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Output formatter for CLI
#[derive(Debug, Clone)]
pub struct OutputFormatter {
    format: OutputFormat,
    color: bool,
    term: Term,
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::default())
    }
}

impl OutputFormatter {
    /// Create new formatter writing to stdout
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            color: true,
            term: Term::stdout(),
        }
    }

    /// Disable color
    pub fn without_color(mut self) -> Self {
        self.color = false;
        self
    }

    /// Get format
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Write rendered output to the terminal
    pub fn emit(&self, rendered: &str) {
        for line in rendered.lines() {
            let _ = self.term.write_line(line);
        }
    }

    /// Success line, or a status object in JSON formats
    pub fn render_success(&self, message: &str) -> String {
        self.render_status("success", message, "✓")
    }

    /// Warning line
    pub fn render_warning(&self, message: &str) -> String {
        self.render_status("warning", message, "⚠")
    }

    fn render_status(&self, status: &str, message: &str, mark: &str) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.render_json(&serde_json::json!({
                "status": status,
                "message": message
            })),
            OutputFormat::Minimal => message.to_string(),
            OutputFormat::Text => {
                if !self.color {
                    return format!("{}: {}", status.to_uppercase(), message);
                }
                let mark = match status {
                    "success" => style(mark).green().to_string(),
                    _ => style(mark).yellow().to_string(),
                };
                format!("{} {}", mark, message)
            }
        }
    }

    /// Titled record of fields
    pub fn render_record<T: Serialize>(&self, title: &str, data: &T) -> String {
        let value = serde_json::to_value(data).unwrap_or(serde_json::Value::Null);
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.render_json(&value),
            OutputFormat::Minimal => {
                let mut out = Vec::new();
                collect_minimal(&value, &mut out);
                out.join("\n")
            }
            OutputFormat::Text => {
                let mut out = vec![self.heading(title)];
                self.collect_text(&value, 1, &mut out);
                out.join("\n")
            }
        }
    }

    /// Table of rows
    pub fn render_table(&self, headers: &[&str], rows: &[Vec<String>]) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => {
                let data: Vec<BTreeMap<&str, &str>> = rows
                    .iter()
                    .map(|row| {
                        headers
                            .iter()
                            .zip(row.iter())
                            .map(|(h, v)| (*h, v.as_str()))
                            .collect()
                    })
                    .collect();
                self.render_json(&data)
            }
            OutputFormat::Minimal => rows
                .iter()
                .map(|row| row.join(" "))
                .collect::<Vec<_>>()
                .join("\n"),
            OutputFormat::Text => self.table_text(headers, rows),
        }
    }

    fn render_json<T: Serialize>(&self, data: &T) -> String {
        let output = if matches!(self.format, OutputFormat::JsonPretty) {
            serde_json::to_string_pretty(data)
        } else {
            serde_json::to_string(data)
        };
        output.unwrap_or_default()
    }

    fn heading(&self, title: &str) -> String {
        if self.color {
            style(title).bold().underlined().to_string()
        } else {
            title.to_string()
        }
    }

    fn key(&self, key: &str) -> String {
        if self.color {
            style(key).bold().to_string()
        } else {
            key.to_string()
        }
    }

    fn collect_text(&self, json: &serde_json::Value, indent: usize, out: &mut Vec<String>) {
        let prefix = "  ".repeat(indent);

        match json {
            serde_json::Value::Object(map) => {
                for (key, value) in map {
                    match value {
                        serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                            out.push(format!("{}{}:", prefix, self.key(key)));
                            self.collect_text(value, indent + 1, out);
                        }
                        _ => out.push(format!("{}{}: {}", prefix, self.key(key), format_value(value))),
                    }
                }
            }
            serde_json::Value::Array(arr) => {
                for (i, item) in arr.iter().enumerate() {
                    out.push(format!("{}[{}]:", prefix, i));
                    self.collect_text(item, indent + 1, out);
                }
            }
            _ => out.push(format!("{}{}", prefix, format_value(json))),
        }
    }

    fn table_text(&self, headers: &[&str], rows: &[Vec<String>]) -> String {
        if headers.is_empty() {
            return String::new();
        }

        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }

        let pad = |i: usize, cell: &str| {
            let width = widths.get(i).copied().unwrap_or(0);
            format!("{:width$}", cell, width = width)
        };

        let header_line = headers
            .iter()
            .enumerate()
            .map(|(i, h)| pad(i, h))
            .collect::<Vec<_>>()
            .join(" | ");

        let mut out = vec![self.key(&header_line)];
        out.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        for row in rows {
            out.push(
                row.iter()
                    .enumerate()
                    .map(|(i, cell)| pad(i, cell))
                    .collect::<Vec<_>>()
                    .join(" | "),
            );
        }
        out.join("\n")
    }
}

fn collect_minimal(json: &serde_json::Value, out: &mut Vec<String>) {
    match json {
        serde_json::Value::Object(map) => map.values().for_each(|v| collect_minimal(v, out)),
        serde_json::Value::Array(arr) => arr.iter().for_each(|v| collect_minimal(v, out)),
        _ => out.push(format_value(json)),
    }
}

/// Format a JSON value for text output
fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "-".into(),
        serde_json::Value::String(s) => s.clone(),
        _ => value.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        owner: String,
        amount: u64,
    }

    fn sample() -> Sample {
        Sample {
            owner: "alice".into(),
            amount: 990,
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("json-pretty".parse::<OutputFormat>().unwrap(), OutputFormat::JsonPretty);
        assert_eq!("min".parse::<OutputFormat>().unwrap(), OutputFormat::Minimal);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_record_json() {
        let out = OutputFormatter::new(OutputFormat::Json).render_record("Position", &sample());
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["amount"], 990);
    }

    #[test]
    fn test_record_text_plain() {
        let out = OutputFormatter::new(OutputFormat::Text)
            .without_color()
            .render_record("Position", &sample());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Position");
        assert!(lines.contains(&"  owner: alice"));
        assert!(lines.contains(&"  amount: 990"));
    }

    #[test]
    fn test_record_minimal() {
        let out = OutputFormatter::new(OutputFormat::Minimal).render_record("Position", &sample());
        let mut lines: Vec<&str> = out.lines().collect();
        lines.sort_unstable();
        assert_eq!(lines, vec!["990", "alice"]);
    }

    #[test]
    fn test_table_text_alignment() {
        let out = OutputFormatter::new(OutputFormat::Text)
            .without_color()
            .render_table(&["type", "amount"], &[vec!["staked".into(), "1".into()]]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "type   | amount");
        assert_eq!(lines[1], "-------+-------");
        assert_eq!(lines[2], "staked | 1     ");
    }

    #[test]
    fn test_status_json() {
        let out = OutputFormatter::new(OutputFormat::Json).render_success("done");
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["message"], "done");
    }
}
