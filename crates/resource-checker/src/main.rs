use anyhow::Result;
use clap::error::ErrorKind;
use clap::CommandFactory;
use clap::Parser;
use resource_checker::app;
use resource_checker::config::Cli;
use resource_checker::config::CliError;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();
    let _guard = utils::logging::init(cli.log_level());

    let query = match cli.query() {
        Ok(query) => query,
        Err(report) => {
            let kind = match report.current_context() {
                CliError::MissingArgument { .. } => ErrorKind::MissingRequiredArgument,
                CliError::UnexpectedArgument { .. } => ErrorKind::UnknownArgument,
                CliError::InvalidSelector { .. } | CliError::InvalidResourcePattern { .. } => {
                    ErrorKind::ValueValidation
                }
            };
            Cli::command().error(kind, report.current_context()).exit()
        }
    };

    tracing::info!(
        resource = %query.resource,
        selector = %query.selector,
        "starting kube-resource-checker {}",
        &**version::VERSION
    );

    app::run(&cli, &query).await
}
