//! Table and JSON rendering for resolved credentials.
//!
//! Credential values never reach the terminal: rows carry the key, where it
//! applies and where it came from.

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use kiln_protocol::Credential;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialRow {
    pub key: String,
    pub scope: String,
    pub origin: String,
    pub read_only: bool,
}

impl CredentialRow {
    pub fn from_credential<T: Credential>(item: &T) -> Self {
        Self {
            key: item.key().to_string(),
            scope: item.scope().to_string(),
            origin: item.origin().to_string(),
            read_only: item.read_only(),
        }
    }
}

pub fn credential_rows<T: Credential>(items: &[T]) -> Vec<CredentialRow> {
    items.iter().map(CredentialRow::from_credential).collect()
}

/// Print a table with headers and rows
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }

    println!("{}", table);
}

pub fn print_credentials(rows: &[CredentialRow]) {
    print_table(
        &["KEY", "SCOPE", "ORIGIN", "READ-ONLY"],
        rows.iter()
            .map(|row| {
                vec![
                    row.key.clone(),
                    row.scope.clone(),
                    row.origin.clone(),
                    if row.read_only { "yes" } else { "no" }.to_string(),
                ]
            })
            .collect(),
    );
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
