//! Text and JSON rendering of a [`CheckReport`].

use std::fmt::Display;
use std::io;
use std::io::Write;

use crossterm::style::style;
use crossterm::style::Color;
use crossterm::style::Stylize;

use crate::report::AvailableNode;
use crate::report::CheckReport;
use crate::report::NodeReport;

const SEPARATOR: &str = "--------------------------------------------------------";
const NO_IP: &str = "<none>";

/// Availability figures and headings.
const PRIMARY: Color = Color::Yellow;
/// Pods, node addresses and utilization.
const ACCENT: Color = Color::Green;

struct Painter {
    colored: bool,
}

impl Painter {
    fn paint<D: Display>(&self, value: D, color: Color) -> String {
        if self.colored {
            style(value).with(color).to_string()
        } else {
            value.to_string()
        }
    }
}

/// Write the human readable report.
pub fn render_text<W: Write>(report: &CheckReport, out: &mut W, colored: bool) -> io::Result<()> {
    let painter = Painter { colored };

    writeln!(
        out,
        "Retrieving resource information for nodes with label: {}",
        report.label_selector
    )?;
    writeln!(out, "{SEPARATOR}")?;

    if report.nodes.is_empty() {
        writeln!(out, "No nodes found with label '{}'.", report.label_selector)?;
    }
    for node in &report.nodes {
        render_node(node, &report.resource_keyword, out, &painter)?;
    }

    writeln!(out)?;
    writeln!(out, "{}", painter.paint("Summary across all nodes:", PRIMARY))?;
    writeln!(out, "{SEPARATOR}")?;
    for totals in &report.summary {
        writeln!(out, "Resource: {}", totals.resource_name)?;
        writeln!(
            out,
            "  Total: {}  Available (Excluding Complete): {}, Utilization: {}",
            totals.total,
            painter.paint(totals.available_active, PRIMARY),
            painter.paint(percent(totals.utilization_active()), ACCENT)
        )?;
        writeln!(
            out,
            "  Available (Including Complete): {}, Utilization: {}",
            painter.paint(totals.available_all, PRIMARY),
            painter.paint(percent(totals.utilization_all()), ACCENT)
        )?;
        writeln!(out, "{SEPARATOR}")?;
    }

    render_available(&report.available_active, "Excluding Complete", out, &painter)?;
    render_available(&report.available_all, "Including Complete", out, &painter)?;

    match report.matched_resource_count() {
        0 => writeln!(
            out,
            "No resources matching '{}' found on nodes with label '{}'.",
            report.resource_keyword, report.label_selector
        ),
        count => writeln!(out, "Matched resources: {}", painter.paint(count, PRIMARY)),
    }
}

fn render_node<W: Write>(
    node: &NodeReport,
    keyword: &str,
    out: &mut W,
    painter: &Painter,
) -> io::Result<()> {
    if node.resources.is_empty() {
        return writeln!(
            out,
            "No resources found matching keyword '{keyword}' on node {}.",
            node.name
        );
    }

    writeln!(out)?;
    writeln!(
        out,
        "Node: {} ({})",
        node.internal_ip.as_deref().unwrap_or(NO_IP),
        node.name
    )?;
    for usage in &node.resources {
        writeln!(out, "  Resource: {}", usage.resource_name)?;
        writeln!(
            out,
            "    Available: {}, {} (Include Complete Tasks)",
            painter.paint(usage.available_active(), PRIMARY),
            painter.paint(usage.available_all(), PRIMARY)
        )?;
        writeln!(
            out,
            "    Total: {}   Used (Active): {}   Used (All): {}",
            usage.total, usage.used_active, usage.used_all
        )?;
        if usage.pods.is_empty() {
            writeln!(out, "    No Pods are using {}.", usage.resource_name)?;
        } else {
            writeln!(out, "    Pods using {}:", usage.resource_name)?;
            for pod in &usage.pods {
                let line = format!(
                    "{}/{} requests {}: {}",
                    pod.namespace, pod.name, usage.resource_name, pod.request
                );
                writeln!(out, "      {}", painter.paint(line, ACCENT))?;
            }
        }
    }
    writeln!(out, "{SEPARATOR}")
}

fn render_available<W: Write>(
    nodes: &[AvailableNode],
    view: &str,
    out: &mut W,
    painter: &Painter,
) -> io::Result<()> {
    writeln!(out)?;
    if nodes.is_empty() {
        return writeln!(out, "No nodes with available resources ({view}).");
    }

    writeln!(
        out,
        "Nodes with Available Resources ({view}): {}",
        painter.paint(nodes.len(), PRIMARY)
    )?;
    writeln!(out, "{SEPARATOR}")?;
    for node in nodes {
        writeln!(
            out,
            "Node: {} ({}) - Available {} ({view}): {}",
            painter.paint(node.internal_ip.as_deref().unwrap_or(NO_IP), ACCENT),
            node.node_name,
            node.resource_name,
            painter.paint(node.available, PRIMARY)
        )?;
    }
    writeln!(out, "{SEPARATOR}")
}

fn percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

/// Write the report as pretty printed JSON.
pub fn render_json<W: Write>(report: &CheckReport, out: &mut W) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, &report.to_api())?;
    writeln!(out)
}
