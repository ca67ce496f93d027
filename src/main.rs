//! OctoEB - Gitflow release workflow helper.
//!
//! Orchestrates the source host, the issue tracker, and an optional chat
//! service so that starting branches, moving tickets through QA, and
//! cutting releases are each a single command.

use std::io;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use octoeb::workflow::{self, FixKind, HostTarget, Services};

/// Gitflow release workflow helper
#[derive(Parser)]
#[command(name = "octoeb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Set the log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new branch for a fix, feature, or a new release
    Start {
        #[command(subcommand)]
        target: StartTarget,
    },

    /// Create a pull request to review your code
    Review {
        #[command(subcommand)]
        target: ReviewTarget,
    },

    /// List the tickets and release branches under QA
    Qa {
        /// Show per-ticket type, status, and assignee detail
        #[arg(short, long)]
        verbose: bool,
    },

    /// Publish a pre-release tag of the release branch for QA
    QaTag {
        /// Full version number of the pre-release
        version: String,
    },

    /// Publish the release: merge the release branch, tag it, and close
    /// the release ticket
    Release {
        /// Full version number to publish (defaults to the latest
        /// pre-release)
        version: Option<String>,

        /// Print the full changelog while publishing
        #[arg(short, long)]
        verbose: bool,
    },

    /// (DEV) Call an issue tracker method directly
    Jira {
        /// Tracker method to call
        #[arg(short = 'm', long = "name")]
        method: String,

        /// Method arguments
        #[arg(short = 'a', long = "args")]
        args: Vec<String>,
    },

    /// (DEV) Call a source host method directly
    Method {
        /// Repo to target
        #[arg(short, long, value_enum, default_value = "mainline")]
        target: Target,

        /// Host method to call
        #[arg(short = 'm', long = "name")]
        method: String,

        /// Method arguments
        #[arg(short = 'a', long = "args")]
        args: Vec<String>,
    },

    /// Sync the fork's core branches with mainline
    Sync,

    /// Update the local branch from its upstream base
    Update {
        /// Base branch to update from (inferred from the branch prefix
        /// when omitted)
        #[arg(short, long)]
        base: Option<String>,
    },

    /// Show the changelog between two branches
    Changelog {
        /// Branch to compare the history starting from
        #[arg(short, long, default_value = "master")]
        base: String,

        /// Branch that contains the changes (current branch by default)
        #[arg(long)]
        head: Option<String>,
    },

    /// Show the current release and pre-release versions
    Versions,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum StartTarget {
    /// Start a new feature branch
    Feature {
        /// ID of the ticket defining the feature
        #[arg(short, long)]
        ticket: String,
    },

    /// Start a new hotfix branch
    Hotfix {
        /// ID of the ticket reporting the bug to be fixed
        #[arg(short, long)]
        ticket: String,
    },

    /// Start a new fix branch for a pre-release
    Releasefix {
        /// ID of the ticket reporting the bug to be fixed
        #[arg(short, long)]
        ticket: String,
    },

    /// Start a new release branch
    Release {
        /// Version number of the release to start (derived from the
        /// latest release when omitted)
        version: Option<String>,
    },
}

#[derive(Subcommand)]
enum ReviewTarget {
    /// Create a pull request for a feature branch
    Feature {
        /// Ticket id (read from the current branch when omitted)
        #[arg(short, long)]
        ticket: Option<String>,
    },

    /// Create a pull request for a hotfix branch
    Hotfix {
        /// Ticket id (read from the current branch when omitted)
        #[arg(short, long)]
        ticket: Option<String>,
    },

    /// Create a pull request for a release bugfix branch
    Releasefix {
        /// Ticket id (read from the current branch when omitted)
        #[arg(short, long)]
        ticket: Option<String>,

        /// Version of the release being fixed (latest pre-release when
        /// omitted)
        version: Option<String>,
    },
}

/// Host client targets.
#[derive(Clone, Copy, ValueEnum)]
enum Target {
    Mainline,
    Fork,
}

impl From<Target> for HostTarget {
    fn from(target: Target) -> Self {
        match target {
            Target::Mainline => Self::Mainline,
            Target::Fork => Self::Fork,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = EnvFilter::try_new(&cli.log).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    match cli.command {
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(())
        }
        // Local git bookkeeping needs no configuration or remote client.
        Commands::Sync => Ok(workflow::local::sync()?),
        Commands::Update { base } => Ok(workflow::local::update(base.as_deref())?),
        Commands::Changelog { base, head } => {
            Ok(workflow::local::changelog(&base, head.as_deref())?)
        }
        remote => {
            // Configuration errors abort before any remote call.
            let config = octoeb::core::config::load()?;
            let services = Services::new(config);

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_remote(&services, remote))
        }
    }
}

/// Dispatch the commands that talk to the tracker, host, or chat service.
async fn run_remote(services: &Services, command: Commands) -> Result<()> {
    match command {
        Commands::Start { target } => match target {
            StartTarget::Feature { ticket } => {
                workflow::start::start_fix(services, FixKind::Feature, &ticket).await?;
            }
            StartTarget::Hotfix { ticket } => {
                workflow::start::start_fix(services, FixKind::Hotfix, &ticket).await?;
            }
            StartTarget::Releasefix { ticket } => {
                workflow::start::start_fix(services, FixKind::Releasefix, &ticket).await?;
            }
            StartTarget::Release { version } => {
                workflow::start::start_release(services, version.as_deref()).await?;
            }
        },
        Commands::Review { target } => match target {
            ReviewTarget::Feature { ticket } => {
                workflow::review::review_fix(services, FixKind::Feature, ticket.as_deref(), None)
                    .await?;
            }
            ReviewTarget::Hotfix { ticket } => {
                workflow::review::review_fix(services, FixKind::Hotfix, ticket.as_deref(), None)
                    .await?;
            }
            ReviewTarget::Releasefix { ticket, version } => {
                workflow::review::review_fix(
                    services,
                    FixKind::Releasefix,
                    ticket.as_deref(),
                    version.as_deref(),
                )
                .await?;
            }
        },
        Commands::Qa { verbose } => workflow::qa::qa(services, verbose).await?,
        Commands::QaTag { version } => workflow::release::qa_tag(services, &version).await?,
        Commands::Release { version, verbose } => {
            workflow::release::publish_release(services, version.as_deref(), verbose).await?;
        }
        Commands::Jira { method, args } => {
            let output = workflow::call_tracker_method(services, &method, &args).await?;
            println!("{output}");
        }
        Commands::Method { target, method, args } => {
            let output =
                workflow::call_host_method(services, target.into(), &method, &args).await?;
            println!("{output}");
        }
        Commands::Versions => workflow::release::versions(services).await?,
        Commands::Completions { .. }
        | Commands::Sync
        | Commands::Update { .. }
        | Commands::Changelog { .. } => unreachable!("handled before client setup"),
    }

    Ok(())
}

/// Generate shell completions on stdout.
///
/// Ticket id completion is driven by `octoeb jira -m get_my_ticket_ids`
/// from the generated script's wrapper functions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "octoeb", &mut io::stdout());
}
