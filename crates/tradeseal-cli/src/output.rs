//! Output formatting for human-readable and JSON modes.
//!
//! Human mode uses colored terminal output.
//! JSON mode outputs pure JSON with no ANSI escapes.

use colored::Colorize;
use serde::Serialize;

/// Prints a success message.
pub fn print_success(msg: &str, json_mode: bool) {
    if json_mode {
        let obj = serde_json::json!({ "status": "ok", "message": msg });
        println!("{obj}");
    } else {
        println!("{} {}", "✓".green().bold(), msg);
    }
}

/// Prints labelled fields: one line each in human mode, one object in
/// JSON mode (keyed by `key`).
pub fn print_fields(fields: &[(&str, &str, String)], json_mode: bool) {
    if json_mode {
        let obj: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .map(|(key, _, value)| ((*key).to_owned(), serde_json::Value::String(value.clone())))
            .collect();
        println!("{}", serde_json::Value::Object(obj));
        return;
    }
    let width = fields.iter().map(|(_, label, _)| label.len()).max().unwrap_or(0);
    for (_, label, value) in fields {
        println!("{:<width$}  {}", label.bold(), value);
    }
}

/// Prints a serializable value as compact JSON or pretty JSON.
pub fn print_value<T: Serialize>(value: &T, json_mode: bool) {
    let rendered = if json_mode {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    match rendered {
        Ok(s) => println!("{s}"),
        Err(e) => print_error(&format!("json serialization failed: {e}"), json_mode),
    }
}

/// Prints an error message.
pub fn print_error(msg: &str, json_mode: bool) {
    if json_mode {
        let obj = serde_json::json!({ "error": msg });
        eprintln!("{obj}");
    } else {
        eprintln!("{} {}", "error:".red().bold(), msg);
    }
}
