use core::error::Error;
use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::ValueEnum;
use error_stack::Report;
use error_stack::ResultExt;
use tracing::level_filters::LevelFilter;
use utils::version;

use crate::query::Query;
use crate::query::ResourcePattern;
use crate::selector::LabelSelector;

/// Errors raised while turning command line arguments into a [`Query`].
#[derive(Debug, derive_more::Display)]
pub enum CliError {
    #[display("missing required argument: {name}")]
    MissingArgument { name: &'static str },
    #[display("unexpected argument: {value}")]
    UnexpectedArgument { value: String },
    #[display("invalid label selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[display("invalid resource keyword `{keyword}`")]
    InvalidResourcePattern { keyword: String },
}

impl Error for CliError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Query the API server with the built-in client
    Api,
    /// Run the kubectl binary and parse its JSON output
    Kubectl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Colour when stdout is a terminal
    Auto,
    Always,
    Never,
}

#[derive(Args, Debug, Clone)]
pub struct ClusterArgs {
    #[arg(
        long,
        env = "KUBECONFIG_PATH",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to a kubeconfig file, defaults to in-cluster config or ~/.kube/config"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[arg(long, help = "Kubeconfig context to use")]
    pub context: Option<String>,

    #[arg(
        long,
        value_enum,
        default_value_t = Backend::Api,
        help = "How to reach the cluster"
    )]
    pub backend: Backend,

    #[arg(
        long,
        env = "KUBECTL",
        default_value = "kubectl",
        value_hint = clap::ValueHint::CommandName,
        help = "kubectl binary used by the kubectl backend"
    )]
    pub kubectl: PathBuf,
}

/// Count a Kubernetes resource on the nodes matching a label selector.
///
/// `kube-resource-checker -r gpu -l job=training` and
/// `kube-resource-checker gpu job=training` are equivalent.
#[derive(Parser, Debug, Clone)]
#[command(name = "kube-resource-checker", about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[arg(
        short = 'r',
        long = "resource",
        value_name = "RESOURCE",
        help = "Keyword (case-insensitive regex) matched against resource names, e.g. gpu, sriov"
    )]
    pub resource: Option<String>,

    #[arg(
        short = 'l',
        long = "label",
        value_name = "LABEL",
        help = "Label selector for nodes, e.g. job=training"
    )]
    pub label: Option<String>,

    #[arg(value_name = "RESOURCE", help = "Resource keyword (positional form)")]
    pub positional_resource: Option<String>,

    #[arg(value_name = "LABEL", help = "Label selector (positional form)")]
    pub positional_label: Option<String>,

    #[command(flatten)]
    pub cluster: ClusterArgs,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Increase log verbosity on stderr (-v info, -vv debug, -vvv trace)"
    )]
    pub verbose: u8,
}

impl Cli {
    /// Resolve the resource keyword and label selector.
    ///
    /// Flags take precedence; positional values fill whichever of the two is
    /// still missing, in `RESOURCE LABEL` order.
    ///
    /// # Errors
    ///
    /// - [`CliError::MissingArgument`] if the resource or the label is absent
    /// - [`CliError::UnexpectedArgument`] if a positional value is left over
    /// - [`CliError::InvalidSelector`] / [`CliError::InvalidResourcePattern`]
    ///   if a value does not parse
    pub fn query(&self) -> Result<Query, Report<CliError>> {
        let mut positionals = [&self.positional_resource, &self.positional_label]
            .into_iter()
            .flatten()
            .filter(|value| !value.is_empty());

        let resource = non_empty(&self.resource).or_else(|| positionals.next());
        let label = non_empty(&self.label).or_else(|| positionals.next());
        if let Some(extra) = positionals.next() {
            return Err(Report::new(CliError::UnexpectedArgument {
                value: extra.clone(),
            }));
        }

        let resource = resource.ok_or(CliError::MissingArgument { name: "resource" })?;
        let label = label.ok_or(CliError::MissingArgument { name: "label" })?;

        let pattern =
            ResourcePattern::new(resource).change_context_lazy(|| {
                CliError::InvalidResourcePattern {
                    keyword: resource.clone(),
                }
            })?;
        let selector = LabelSelector::parse(label).map_err(|report| {
            let reason = report.current_context().to_string();
            report.change_context(CliError::InvalidSelector {
                selector: label.clone(),
                reason,
            })
        })?;

        Ok(Query {
            resource: pattern,
            selector,
        })
    }

    /// Log level used when `RUST_LOG` is unset.
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&String> {
    value.as_ref().filter(|value| !value.is_empty())
}
