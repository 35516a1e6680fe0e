//! Output formatting for CLI results

use serde::Serialize;
use tabled::Tabled;

use crate::cli::OutputFormat;
use crate::error::Result;

pub mod formatters;
pub mod json;
pub mod table;

/// Trait for types that can be formatted for output
pub trait Formattable {
    /// Format the data according to the specified format
    fn format(&self, format: OutputFormat) -> Result<String>;

    /// Format and print to stdout
    fn print(&self, format: OutputFormat) -> Result<()> {
        println!("{}", self.format(format)?);
        Ok(())
    }
}

/// Lists of display rows render as a table, or as JSON with metadata
impl<T: Tabled + Serialize> Formattable for Vec<T> {
    fn format(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => Ok(json::format_json(self)?),
            OutputFormat::Table | OutputFormat::Pretty => Ok(table::format_table(self)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Tabled, Serialize)]
    struct Row {
        #[tabled(rename = "SLUG")]
        slug: String,
    }

    #[test]
    fn test_vec_formats_as_table() {
        let rows = vec![Row {
            slug: "hello-world".to_string(),
        }];
        let out = rows.format(OutputFormat::Table).unwrap();
        assert!(out.contains("SLUG"));
        assert!(out.contains("hello-world"));
    }

    #[test]
    fn test_vec_formats_as_json_with_meta() {
        let rows = vec![Row {
            slug: "hello-world".to_string(),
        }];
        let out = rows.format(OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["data"][0]["slug"], "hello-world");
        assert!(parsed["meta"]["version"].is_string());
    }

    #[test]
    fn test_empty_vec_table() {
        let rows: Vec<Row> = vec![];
        assert_eq!(rows.format(OutputFormat::Pretty).unwrap(), "No results found.");
    }
}
