//! Command line interface of the `blobbench` binary.

use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use argh::FromArgs;
use blobbench_client::{Client, ClientBuilder, StoreFlavor};

use crate::config::Config;
use crate::error::Error;
use crate::export;
use crate::measurements::Summary;
use crate::remote::BoxedRemote;
use crate::runner::Runner;
use crate::{healthcheck, observability};

/// Benchmark harness for content-addressable blob stores.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    /// kind of blob store to benchmark, overriding the configuration ("ambry" or "stored")
    #[argh(option)]
    pub flavor: Option<StoreFlavor>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Load(LoadCommand),
    Run(RunCommand),
    Healthcheck(HealthcheckCommand),
    Version(VersionCommand),
}

/// insert the workload's records and publish the key mapping
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "load")]
struct LoadCommand {}

/// run the workload's operations against a published key mapping
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {
    /// reference token printed by the load phase
    #[argh(option)]
    mapping_id: Option<String>,
}

/// check that the configured store is reachable and healthy
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "healthcheck")]
struct HealthcheckCommand {}

/// print the blobbench version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    // Special switch to just print the version and exit.
    if let Command::Version(_) = args.command {
        println!("blobbench {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(flavor) = args.flavor {
        config.flavor = flavor;
    }
    if let Command::Run(RunCommand {
        mapping_id: Some(mapping_id),
    }) = &args.command
    {
        config.mapping_id = Some(mapping_id.clone());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("blobbench-rt")
        .enable_all()
        .worker_threads(config.workers())
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config);
    tracing::debug!(?config);

    runtime.block_on(async move {
        match args.command {
            Command::Load(LoadCommand {}) => load(config).await,
            Command::Run(RunCommand { .. }) => run(config).await,
            Command::Healthcheck(HealthcheckCommand {}) => {
                healthcheck::healthcheck(&client(&config)?).await
            }
            Command::Version(VersionCommand {}) => unreachable!(),
        }
    })
}

fn client(config: &Config) -> Result<Client> {
    let client = ClientBuilder::new(config.base_url(), config.flavor)
        .max_connections(config.max_connections)
        .max_connections_per_host(config.max_connections_per_host)
        .build()
        .context("failed to create store client")?;

    Ok(client)
}

async fn load(config: Config) -> Result<()> {
    let workload = config.workload.build()?;
    let remote: BoxedRemote = Arc::new(client(&config)?);

    let report = Runner::load(remote, workload, config.workers())
        .max_execution_time(config.max_execution_time)
        .show_progress(io::stderr().is_terminal())
        .run_phase()
        .await?;

    write_report(&config, &report.summary)
}

async fn run(config: Config) -> Result<()> {
    let mapping_id = config.mapping_id.clone().ok_or(Error::MissingMappingId)?;
    let workload = config.workload.build()?;
    let remote: BoxedRemote = Arc::new(client(&config)?);

    let report = Runner::run(remote, workload, config.workers(), mapping_id)
        .max_execution_time(config.max_execution_time)
        .show_progress(io::stderr().is_terminal())
        .run_phase()
        .await?;

    write_report(&config, &report.summary)
}

fn write_report(config: &Config, summary: &Summary) -> Result<()> {
    let format = config.export.format;
    match &config.export.path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create report {}", path.display()))?;
            export::export(summary, format, file)?;
            tracing::info!(path = %path.display(), "report written");
        }
        None => {
            println!();
            export::export(summary, format, io::stdout().lock())?;
        }
    }

    Ok(())
}
