//! Wires the command line to a cluster source, the checker and a renderer.

use std::io::IsTerminal;
use std::io::Write;

use anyhow::Context;
use anyhow::Result;
use tracing::info;

use crate::config::Backend;
use crate::config::Cli;
use crate::config::ColorMode;
use crate::config::OutputFormat;
use crate::k8s::ClusterSource;
use crate::k8s::KubeApiSource;
use crate::k8s::KubectlSource;
use crate::query::Query;
use crate::render;
use crate::report::CheckReport;
use crate::report::ResourceChecker;

/// Run one check as described by `cli` and print the report to stdout.
pub async fn run(cli: &Cli, query: &Query) -> Result<()> {
    let cluster = &cli.cluster;
    let report = match cluster.backend {
        Backend::Api => {
            let source = KubeApiSource::connect(cluster.kubeconfig.clone(), cluster.context.clone())
                .await
                .map_err(|e| anyhow::anyhow!("{e:?}"))?;
            check(source, query).await?
        }
        Backend::Kubectl => {
            let source = KubectlSource::new(
                cluster.kubectl.clone(),
                cluster.kubeconfig.clone(),
                cluster.context.clone(),
            );
            check(source, query).await?
        }
    };
    info!(
        matched = report.matched_resource_count(),
        "resource check finished"
    );

    let colored = use_color(cli.color);
    let mut stdout = std::io::stdout().lock();
    write_report(&report, cli.output, colored, &mut stdout)?;
    stdout.flush().context("failed to flush stdout")
}

/// Compute the report for `query` against `source`.
pub async fn check<S: ClusterSource>(source: S, query: &Query) -> Result<CheckReport> {
    ResourceChecker::new(source)
        .check(query)
        .await
        .map_err(|e| anyhow::anyhow!("{e:?}"))
}

pub fn write_report<W: Write>(
    report: &CheckReport,
    output: OutputFormat,
    colored: bool,
    out: &mut W,
) -> Result<()> {
    let written = match output {
        OutputFormat::Text => render::render_text(report, out, colored),
        OutputFormat::Json => render::render_json(report, out),
    };
    written.context("failed to write report")
}

fn use_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => {
            crossterm::style::force_color_output(true);
            true
        }
        ColorMode::Never => false,
        ColorMode::Auto => std::io::stdout().is_terminal(),
    }
}
