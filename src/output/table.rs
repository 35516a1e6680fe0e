//! Table output formatting

use tabled::{
    Table, Tabled,
    builder::Builder,
    settings::{Alignment, Modify, Style, object::Columns, object::Rows},
};

/// Format rows as a rounded table with a centered header
pub fn format_table<T: Tabled>(data: &[T]) -> String {
    if data.is_empty() {
        return "No results found.".to_string();
    }

    let mut table = Table::new(data);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    table.to_string()
}

/// Two-column key/value block for single-record views
pub fn format_details(fields: &[(&str, String)]) -> String {
    let mut builder = Builder::default();
    for (key, value) in fields {
        builder.push_record([key.to_string(), value.clone()]);
    }

    let mut table = builder.build();
    table
        .with(Style::blank())
        .with(Modify::new(Columns::first()).with(Alignment::right()));

    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Tabled)]
    struct NotificationRow {
        #[tabled(rename = "ID")]
        id: u64,
        #[tabled(rename = "TITLE")]
        title: String,
    }

    #[test]
    fn test_format_table_empty() {
        let rows: Vec<NotificationRow> = vec![];
        assert_eq!(format_table(&rows), "No results found.");
    }

    #[test]
    fn test_format_table_rows_and_style() {
        let rows = vec![
            NotificationRow {
                id: 7,
                title: "New comment".to_string(),
            },
            NotificationRow {
                id: 8,
                title: "New follower".to_string(),
            },
        ];

        let result = format_table(&rows);

        assert!(result.contains("ID"));
        assert!(result.contains("New comment"));
        assert!(result.contains("New follower"));
        assert!(result.contains("╭"));
        assert!(result.contains("╰"));
    }

    #[test]
    fn test_format_details() {
        let result = format_details(&[
            ("Title", "Getting started".to_string()),
            ("Views", "42".to_string()),
        ]);
        assert!(result.contains("Getting started"));
        assert!(result.contains("Views"));
        assert!(!result.contains("╭"));
    }
}
