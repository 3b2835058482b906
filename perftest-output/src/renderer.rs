//! Structured and human-readable renderers

use perftest_config::ResultsFormat;
use perftest_core::ResultRecord;
use serde_json::{Map, Value};

use crate::errors::{OutputError, OutputResult};
use crate::python_json;

/// Converts records into ready-to-write text
pub trait Renderer: Send + Sync {
    fn format(&self) -> ResultsFormat;

    /// `to_stdout` selects the standard output variant of the format
    fn generate(&self, records: &[ResultRecord], to_stdout: bool) -> OutputResult<String>;
}

pub fn renderer_for(format: ResultsFormat) -> Box<dyn Renderer> {
    match format {
        ResultsFormat::Json => Box::new(JsonRenderer),
        ResultsFormat::Human => Box::new(HumanRenderer),
    }
}

/// List of flat records; a trailing newline is added only on stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn format(&self) -> ResultsFormat {
        ResultsFormat::Json
    }

    fn generate(&self, records: &[ResultRecord], to_stdout: bool) -> OutputResult<String> {
        let mut output = python_json::to_string(records)
            .map_err(|e| OutputError::serialization("json", e.to_string()))?;
        if to_stdout {
            output.push('\n');
        }
        Ok(output)
    }
}

/// One `LEVEL: source.test[.key]: message` line per record
#[derive(Debug, Clone, Copy, Default)]
pub struct HumanRenderer;

pub const NO_ISSUES: &str = "No issues found.\n";

impl Renderer for HumanRenderer {
    fn format(&self) -> ResultsFormat {
        ResultsFormat::Human
    }

    fn generate(&self, records: &[ResultRecord], _to_stdout: bool) -> OutputResult<String> {
        if records.is_empty() {
            return Ok(NO_ISSUES.to_string());
        }

        let mut output = String::new();
        for record in records {
            output.push_str(&format!(
                "{}: {}.{}",
                record.result, record.source, record.test
            ));
            if let Some(key) = record.kw.get("key") {
                output.push('.');
                output.push_str(&display_value(key));
            }
            if let Some(msg) = record.kw.get("msg").and_then(Value::as_str) {
                output.push_str(": ");
                output.push_str(&format_message(msg, &record.kw));
            } else if let Some(detail) = record.kw.get("exception").or_else(|| record.kw.get("error")) {
                output.push_str(": ");
                output.push_str(&display_value(detail));
            }
            output.push('\n');
        }
        Ok(output)
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Fill `{name}` placeholders from `kw`; `{{` and `}}` are literal braces.
///
/// Unknown names are left in place.
pub fn format_message(template: &str, kw: &Map<String, Value>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        output.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") || tail.starts_with("}}") {
            output.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('{') {
            if let Some(end) = tail.find('}') {
                let name = &tail[1..end];
                match kw.get(name) {
                    Some(value) => output.push_str(&display_value(value)),
                    None => output.push_str(&tail[..=end]),
                }
                rest = &tail[end + 1..];
                continue;
            }
        }
        output.push_str(&tail[..1]);
        rest = &tail[1..];
    }
    output.push_str(rest);
    output
}
