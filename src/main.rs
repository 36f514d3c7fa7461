//! ebs-backup: tag-driven EBS snapshot/AMI backup and retention manager
//!
//! Runs as a periodic, stateless invocation: discover tagged resources,
//! create snapshots/images, and prune artifacts beyond retention. Intended
//! to be driven by a scheduler; exits non-zero if any unit of work failed.

use anyhow::Result;
use clap::{Parser, Subcommand};
use ebs_backup::aws::{AwsContext, Ec2Client};
use ebs_backup::config::Settings;
use ebs_backup::manager::BackupManager;
use ebs_backup::policy::Policy;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ebs-backup")]
#[command(about = "Tag-driven EBS snapshot/AMI backup and retention")]
#[command(version)]
struct Args {
    /// AWS region (default: the SDK's resolution chain)
    #[arg(long, global = true)]
    region: Option<String>,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover tagged resources and back them up
    Backup,

    /// Prune old snapshots/images beyond each resource's retention count
    Cleanup,

    /// Backup followed by cleanup, one invocation
    Run,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    // Configuration errors are fatal before any AWS call is made
    let policy = Policy::new(&args.settings)?;

    let aws = AwsContext::new(args.region.as_deref()).await;
    let manager = BackupManager::new(Ec2Client::from_context(&aws), policy);

    let discovered = manager.search().await?;

    match args.command {
        Command::Backup => {
            manager.backup(&discovered).await.into_result()?;
            info!("Backup complete");
        }
        Command::Cleanup => {
            manager.cleanup(&discovered).await.into_result()?;
            info!("Cleanup complete");
        }
        Command::Run => {
            let mut report = manager.backup(&discovered).await;
            report.merge(manager.cleanup(&discovered).await);
            report.into_result()?;
            info!("Backup and cleanup complete");
        }
    }

    Ok(())
}
