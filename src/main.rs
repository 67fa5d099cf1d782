mod cli;
mod config;
mod netbox;
mod netmap;
mod preload;
mod process;
mod recipe;
mod reconcile;
mod restore;
mod seed;
mod utils;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command};
use process::SystemRunner;
use recipe::{RecipeContext, RecipeVariant};
use seed::SeedOutcome;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli::log_filter(cli.verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Seed(args) => {
            let config = args.into_config();
            tracing::info!("Seeding NetBox at {}", config.netbox_url);
            match seed::run(&config, &SystemRunner).await? {
                SeedOutcome::Restored(outcome) => {
                    tracing::info!("Restored {}", outcome.snapshot.display());
                }
                SeedOutcome::RestoreRequested(Some(outcome)) => {
                    tracing::error!(
                        "Restoring {} failed at {}",
                        outcome.snapshot.display(),
                        outcome.aborted_at.map(|s| s.name()).unwrap_or("load")
                    );
                }
                SeedOutcome::RestoreRequested(None) => {}
                SeedOutcome::Reconciled(report) => {
                    let aborted = report.aborted_stages();
                    if aborted.is_empty() {
                        tracing::info!("Seeding complete ({} objects created)", report.total_created());
                    } else {
                        tracing::warn!(
                            "Seeding finished with aborted stages: {} ({} objects created)",
                            aborted.join(", "),
                            report.total_created()
                        );
                    }
                }
            }
        }
        Command::Recipe(args) => {
            let variant = RecipeVariant::new(args.version, args.suite);
            let ctx = RecipeContext::new(args.malcolm_dir);
            recipe::generate(&variant, &ctx, &args.template, &args.output_dir)?;
        }
    }

    Ok(())
}
