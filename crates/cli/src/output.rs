//! Output formatting utilities

use crate::client::Quantity;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// Parse a format name from the config file
    pub fn from_name(name: &str) -> Option<Self> {
        Self::from_str(name, true).ok()
    }
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2}Gi", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{}Mi", bytes / MB)
    } else if bytes >= KB {
        format!("{}Ki", bytes / KB)
    } else {
        format!("{}B", bytes)
    }
}

/// Format a CPU quantity in cores as millicores
pub fn format_cpu(quantity: Option<&Quantity>) -> String {
    match quantity {
        Some(q) => format!("{}m", (cpu_cores(q) * 1000.0).round() as u64),
        None => "<none>".dimmed().to_string(),
    }
}

/// Format a memory quantity with binary or decimal suffix
pub fn format_memory(quantity: Option<&Quantity>) -> String {
    match quantity.and_then(memory_bytes) {
        Some(bytes) => format_bytes(bytes),
        None => "<none>".dimmed().to_string(),
    }
}

/// Memory quantity in bytes; `None` for unknown units
pub fn memory_bytes(quantity: &Quantity) -> Option<u64> {
    let multiplier: f64 = match quantity.unit.as_str() {
        "" => 1.0,
        "Ki" => 1024.0,
        "Mi" => 1024.0 * 1024.0,
        "Gi" => 1024.0 * 1024.0 * 1024.0,
        "k" | "K" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        _ => return None,
    };
    Some((quantity.value * multiplier).round() as u64)
}

/// CPU quantity in cores
pub fn cpu_cores(quantity: &Quantity) -> f64 {
    match quantity.unit.as_str() {
        "m" => quantity.value / 1000.0,
        "n" => quantity.value / 1_000_000_000.0,
        _ => quantity.value,
    }
}

/// Format an observation window length
pub fn format_window(seconds: i64) -> String {
    if seconds >= 60 {
        format!("{}m{}s", seconds / 60, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(value: f64, unit: &str) -> Quantity {
        Quantity {
            value,
            unit: unit.to_string(),
        }
    }

    #[test]
    fn test_format_cpu() {
        assert_eq!(format_cpu(Some(&q(0.25, ""))), "250m");
        assert_eq!(format_cpu(Some(&q(1.5, ""))), "1500m");
        assert_eq!(format_cpu(Some(&q(120.0, "m"))), "120m");
    }

    #[test]
    fn test_format_memory() {
        assert_eq!(format_memory(Some(&q(200.0, "Mi"))), "200Mi");
        assert_eq!(format_memory(Some(&q(2.0, "Gi"))), "2.00Gi");
        assert_eq!(format_memory(Some(&q(512.0, ""))), "512B");
        assert_eq!(memory_bytes(&q(1.0, "Ti")), None);
    }

    #[test]
    fn test_format_window() {
        assert_eq!(format_window(0), "0s");
        assert_eq!(format_window(75), "1m15s");
    }

    #[test]
    fn test_format_from_config_name() {
        assert_eq!(OutputFormat::from_name("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_name("yaml"), None);
    }
}
