//! Resource usage commands

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use crate::client::{ApiClient, MetricsItem, StatusError};
use crate::output::{
    cpu_cores, format_cpu, format_memory, format_window, memory_bytes, print_json, print_warning,
    OutputFormat,
};

/// Column to sort listings by
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortBy {
    Cpu,
    Memory,
}

/// Row for node usage table
#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Window")]
    window: String,
}

impl From<&MetricsItem> for NodeRow {
    fn from(item: &MetricsItem) -> Self {
        Self {
            name: item.metadata.name.clone(),
            cpu: format_cpu(item.sample("cpu")),
            memory: format_memory(item.sample("memory")),
            window: window(item),
        }
    }
}

/// Row for pod usage table
#[derive(Tabled)]
struct PodRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Window")]
    window: String,
}

impl From<&MetricsItem> for PodRow {
    fn from(item: &MetricsItem) -> Self {
        Self {
            namespace: item.metadata.namespace.clone().unwrap_or_default(),
            name: item.metadata.name.clone(),
            cpu: format_cpu(item.sample("cpu")),
            memory: format_memory(item.sample("memory")),
            window: window(item),
        }
    }
}

fn window(item: &MetricsItem) -> String {
    format_window((item.window.end - item.window.start).num_seconds())
}

/// Sort descending; entities without samples go last
fn sort_items(items: &mut [MetricsItem], sort_by: Option<SortBy>) {
    let Some(sort_by) = sort_by else {
        return;
    };

    let key = |item: &MetricsItem| -> f64 {
        let value = match sort_by {
            SortBy::Cpu => item.sample("cpu").map(cpu_cores),
            SortBy::Memory => item
                .sample("memory")
                .and_then(memory_bytes)
                .map(|b| b as f64),
        };
        value.unwrap_or(-1.0)
    };

    items.sort_by(|a, b| key(b).total_cmp(&key(a)));
}

fn print_rows<R: Tabled>(rows: Vec<R>, empty: &str) {
    if rows.is_empty() {
        print_warning(empty);
        return;
    }

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Report a missing entity without a stack of context
fn not_found(err: anyhow::Error) -> Result<()> {
    match err.downcast_ref::<StatusError>() {
        Some(status) if status.is_not_found() => {
            print_warning(&status.message);
            std::process::exit(1);
        }
        _ => Err(err),
    }
}

/// Show usage for all nodes
pub async fn top_nodes(
    client: &ApiClient,
    version: &str,
    selector: Option<&str>,
    sort_by: Option<SortBy>,
    format: OutputFormat,
) -> Result<()> {
    let mut list = client.list_node_metrics(version, selector).await?;
    sort_items(&mut list.items, sort_by);

    match format {
        OutputFormat::Json => print_json(&list)?,
        OutputFormat::Table => {
            let rows: Vec<NodeRow> = list.items.iter().map(NodeRow::from).collect();
            print_rows(rows, "No node metrics found");
        }
    }

    Ok(())
}

/// Show usage for pods in one namespace, or all when `namespace` is `None`
pub async fn top_pods(
    client: &ApiClient,
    version: &str,
    namespace: Option<&str>,
    selector: Option<&str>,
    sort_by: Option<SortBy>,
    format: OutputFormat,
) -> Result<()> {
    let mut list = client
        .list_pod_metrics(version, namespace, selector)
        .await?;
    sort_items(&mut list.items, sort_by);

    match format {
        OutputFormat::Json => print_json(&list)?,
        OutputFormat::Table => {
            let rows: Vec<PodRow> = list.items.iter().map(PodRow::from).collect();
            let empty = match namespace {
                Some(ns) => format!("No pod metrics found in namespace {}", ns),
                None => "No pod metrics found".to_string(),
            };
            print_rows(rows, &empty);
        }
    }

    Ok(())
}

/// Show usage for a single node
pub async fn show_node(
    client: &ApiClient,
    version: &str,
    name: &str,
    format: OutputFormat,
) -> Result<()> {
    match client.node_metrics(version, name).await {
        Ok(item) => print_item(&item, format),
        Err(e) => not_found(e),
    }
}

/// Show usage for a single pod
pub async fn show_pod(
    client: &ApiClient,
    version: &str,
    namespace: &str,
    name: &str,
    format: OutputFormat,
) -> Result<()> {
    match client.pod_metrics(version, namespace, name).await {
        Ok(item) => print_item(&item, format),
        Err(e) => not_found(e),
    }
}

fn print_item(item: &MetricsItem, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(item);
    }

    println!("{}", item.kind.bold());
    println!("{}", "=".repeat(50));
    if let Some(namespace) = &item.metadata.namespace {
        println!("Namespace: {}", namespace.cyan());
    }
    println!("Name:      {}", item.metadata.name.cyan());
    println!(
        "Window:    {} .. {}",
        item.window.start.format("%Y-%m-%d %H:%M:%S"),
        item.window.end.format("%Y-%m-%d %H:%M:%S")
    );
    println!();

    if item.samples.is_empty() {
        print_warning("No samples collected yet");
        return Ok(());
    }

    println!("{}", "Samples".bold());
    println!("{}", "-".repeat(50));
    for sample in &item.samples {
        let value = match sample.name.as_str() {
            "cpu" => format_cpu(Some(&sample.quantity)),
            "memory" => format_memory(Some(&sample.quantity)),
            _ => format!("{}{}", sample.quantity.value, sample.quantity.unit),
        };
        println!("{:<10} {}", sample.name, value);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ObjectMeta, Quantity, Sample, Window};
    use chrono::Utc;

    fn item(name: &str, cpu: Option<f64>) -> MetricsItem {
        let now = Utc::now();
        MetricsItem {
            kind: "NodeMetrics".to_string(),
            metadata: ObjectMeta {
                name: name.to_string(),
                namespace: None,
            },
            window: Window {
                start: now,
                end: now,
            },
            samples: cpu
                .map(|value| Sample {
                    name: "cpu".to_string(),
                    quantity: Quantity {
                        value,
                        unit: String::new(),
                    },
                    timestamp: now,
                })
                .into_iter()
                .collect(),
        }
    }

    fn names(items: &[MetricsItem]) -> Vec<&str> {
        items.iter().map(|i| i.metadata.name.as_str()).collect()
    }

    #[test]
    fn test_sort_by_cpu_puts_cold_entities_last() {
        let mut items = vec![
            item("low", Some(0.1)),
            item("cold", None),
            item("high", Some(2.0)),
        ];

        sort_items(&mut items, Some(SortBy::Cpu));
        assert_eq!(names(&items), vec!["high", "low", "cold"]);
    }

    #[test]
    fn test_no_sort_keeps_server_order() {
        let mut items = vec![item("b", Some(0.1)), item("a", Some(2.0))];

        sort_items(&mut items, None);
        assert_eq!(names(&items), vec!["b", "a"]);
    }

    #[test]
    fn test_node_row_for_cold_node() {
        let row = NodeRow::from(&item("cold", None));
        assert_eq!(row.name, "cold");
        assert!(row.cpu.contains("<none>"));
        assert_eq!(row.window, "0s");
    }
}
