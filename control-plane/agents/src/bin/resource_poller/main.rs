//! The Resource Report Poller Agent.
//! Pulls the resource report of every cluster node and keeps the cluster wide view of the
//! resources up to date.

/// Aggregation of the pulled resource reports.
mod aggregator;
/// The cluster membership source.
mod membership;

use agents::poller::{HttpTransport, PollerConfig, ResourceReportPoller};
use aggregator::ClusterResources;
use anyhow::Context;
use clap::Parser;
use membership::{Membership, MembershipFile};
use std::{future::Future, path::PathBuf, sync::Arc};
use tokio::{signal::unix::SignalKind, task::JoinHandle};
use utils::tracing_telemetry::FmtStyle;

/// The Cli arguments for this binary.
#[derive(Debug, Parser)]
#[command(name = utils::package_description!(), version = utils::package_info!())]
pub(crate) struct CliArgs {
    /// The maximum number of resource report pulls in flight, across the whole cluster.
    #[clap(long, env = "MAX_CONCURRENT_RESOURCE_PULLS", default_value_t = utils::MAX_CONCURRENT_RESOURCE_PULLS)]
    pub(crate) max_concurrent_pulls: usize,

    /// The period at which each node's resource report is pulled.
    #[clap(long, default_value = utils::RESOURCE_REPORT_POLL_PERIOD)]
    pub(crate) poll_period: humantime::Duration,

    /// The period at which the poller checks for nodes which are due a pull.
    #[clap(long, default_value = utils::RESOURCE_REPORT_TICK_PERIOD)]
    pub(crate) tick_period: humantime::Duration,

    /// The timeout for every node connection.
    #[clap(long, default_value = utils::DEFAULT_CONN_TIMEOUT)]
    pub(crate) connect_timeout: humantime::Duration,

    /// The timeout for every resource report request.
    #[clap(long, short, default_value = utils::DEFAULT_REQ_TIMEOUT)]
    pub(crate) request_timeout: humantime::Duration,

    /// The json file with the list of cluster nodes.
    #[clap(long, short, env = "MEMBERSHIP_FILE", default_value = utils::DEFAULT_MEMBERSHIP_FILE)]
    pub(crate) membership: PathBuf,

    /// The period at which the membership file is re-read.
    #[clap(long, default_value = utils::MEMBERSHIP_POLL_PERIOD)]
    pub(crate) membership_period: humantime::Duration,

    /// Formatting style to be used while logging.
    #[clap(long, env = "FMT_STYLE", default_value = "pretty")]
    fmt_style: FmtStyle,

    /// Use ANSI colours in the logs.
    #[clap(long, env = "ANSI_COLOURS", default_value_t = true, action = clap::ArgAction::Set)]
    ansi_colours: bool,
}
impl CliArgs {
    fn args() -> Self {
        CliArgs::parse()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli_args = CliArgs::args();
    utils::print_package_info!();
    println!("Using options: {cli_args:?}");
    utils::tracing_telemetry::init_tracing(
        "agent-resource-poller",
        cli_args.fmt_style,
        cli_args.ansi_colours,
    );
    server(cli_args).await
}

async fn server(cli_args: CliArgs) -> anyhow::Result<()> {
    let config = PollerConfig::new(
        cli_args.max_concurrent_pulls,
        cli_args.poll_period.into(),
        cli_args.tick_period.into(),
    );
    let transport = HttpTransport::new(
        cli_args.connect_timeout.into(),
        cli_args.request_timeout.into(),
    )
    .context("Failed to create the http transport")?;
    let cluster = Arc::new(ClusterResources::default());
    let poller = Arc::new(ResourceReportPoller::new(
        config,
        Arc::new(transport),
        cluster.clone(),
    ));

    let source = MembershipFile::new(&cli_args.membership);
    let snapshot = source.read().await.unwrap_or_else(|error| {
        tracing::warn!(error = ?error, "Starting with no cluster nodes");
        vec![]
    });
    let mut membership = Membership::default();
    let initial = membership.update(snapshot);
    for node in &initial.added {
        cluster.track(&node.node_id);
    }
    poller
        .initialize(&initial.added)
        .context("Invalid cluster membership snapshot")?;
    poller.start()?;

    let watcher = tokio::spawn(watch_membership(
        poller.clone(),
        cluster,
        source,
        membership,
        cli_args.membership_period.into(),
    ));
    let result = wait_shutdown(shutdown::Shutdown::wait_sig(), watcher).await;

    // stopping joins the poller thread, so keep it off the runtime's workers
    tokio::task::spawn_blocking(move || poller.stop()).await?;
    result
}

/// Wait for the `shutdown` signal, or for the membership watcher to fail.
/// The watcher is aborted either way, so no membership change races with the poller stop.
async fn wait_shutdown(
    shutdown: impl Future<Output = Option<SignalKind>>,
    mut watcher: JoinHandle<anyhow::Result<()>>,
) -> anyhow::Result<()> {
    let result = tokio::select! {
        signal = shutdown => match signal {
            Some(_) => Ok(()),
            None => Err(anyhow::anyhow!("Failed to wait for the shutdown signals")),
        },
        result = &mut watcher => result.map_err(anyhow::Error::from).and_then(|result| result),
    };
    watcher.abort();
    result
}

/// Keep the poller in sync with the cluster membership file.
/// Returns an error only if the poller rejects a membership change, which is fatal.
async fn watch_membership(
    poller: Arc<ResourceReportPoller>,
    cluster: Arc<ClusterResources>,
    source: MembershipFile,
    mut membership: Membership,
    period: std::time::Duration,
) -> anyhow::Result<()> {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // the first tick completes immediately, but the initial snapshot is already loaded
    interval.tick().await;

    loop {
        interval.tick().await;

        match source.read().await {
            Ok(snapshot) => {
                let diff = membership.update(snapshot);
                for node_id in &diff.removed {
                    poller.node_removed(node_id);
                    cluster.forget(node_id);
                }
                for node in &diff.added {
                    cluster.track(&node.node_id);
                    poller
                        .node_added(node)
                        .with_context(|| format!("Failed to add node '{}'", node.node_id))?;
                }
                if !diff.is_empty() {
                    tracing::info!(
                        added = diff.added.len(),
                        removed = diff.removed.len(),
                        nodes = poller.num_nodes(),
                        "Cluster membership changed"
                    );
                }
            }
            Err(error) => {
                tracing::error!(
                    error = ?error,
                    "Failed to read the cluster membership, keeping the last known nodes"
                );
            }
        }

        tracing::info!(
            inflight_pulls = poller.inflight_pulls(),
            "Cluster resources: {}",
            cluster.summary()
        );
    }
}
