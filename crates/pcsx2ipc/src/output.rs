use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use pcsx2ipc_frame::SizeClass;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ValueOutput {
    address: String,
    size: u32,
    value: u64,
    hex: String,
}

/// Print memory read results, one `(address, value)` per row.
pub fn print_values(values: &[(u32, u64)], size: SizeClass, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for &(address, value) in values {
                print_json(&ValueOutput {
                    address: format!("{address:#010x}"),
                    size: size.bits(),
                    value,
                    hex: format_hex(value, size),
                });
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ADDRESS", "SIZE", "VALUE", "HEX"]);
            for &(address, value) in values {
                table.add_row(vec![
                    format!("{address:#010x}"),
                    format!("{}-bit", size.bits()),
                    value.to_string(),
                    format_hex(value, size),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for &(address, value) in values {
                println!(
                    "{address:#010x} ({}-bit) = {value} ({})",
                    size.bits(),
                    format_hex(value, size)
                );
            }
        }
        OutputFormat::Raw => {
            for &(_, value) in values {
                println!("{value}");
            }
        }
    }
}

/// Print labelled fields. JSON output serializes `json` instead.
pub fn print_fields<T: Serialize>(json: &T, fields: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(json),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (name, value) in fields {
                table.add_row(vec![name.to_string(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let width = fields.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
            for (name, value) in fields {
                println!("  {:<width$}  {}", format!("{name}:"), value, width = width + 1);
            }
        }
        OutputFormat::Raw => {
            for (_, value) in fields {
                println!("{value}");
            }
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Zero-padded hex for the full width of `size`.
pub fn format_hex(value: u64, size: SizeClass) -> String {
    format!("{:#0width$x}", value, width = size.bytes() * 2 + 2)
}
