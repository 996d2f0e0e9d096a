use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use circles_safes::{
    log,
    snapshot::{check_ordering, read_snapshot, trust_edges, write_trust_edges_csv, SnapshotSummary},
};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Verify safes are in strictly increasing id order.
    Check {
        #[clap(long, default_value = "safes.json")]
        snapshot: PathBuf,
    },
    /// Print counts of what a snapshot holds.
    Summary {
        #[clap(long, default_value = "safes.json")]
        snapshot: PathBuf,
    },
    /// Export the trust graph as user,can_send_to,limit_percentage CSV.
    ExportEdges {
        #[clap(long, default_value = "safes.json")]
        snapshot: PathBuf,
        /// Output file path (e.g., ./edges.csv).
        #[clap(long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    log::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { snapshot } => {
            let snapshot = read_snapshot(&snapshot)?;
            check_ordering(&snapshot.safes)?;
            println!("ok, {} safes in order", snapshot.safes.len());
        }
        Commands::Summary { snapshot } => {
            let snapshot = read_snapshot(&snapshot)?;
            println!("{}", SnapshotSummary::new(&snapshot));
        }
        Commands::ExportEdges { snapshot, output } => {
            let snapshot = read_snapshot(&snapshot)?;
            let edges = trust_edges(&snapshot)?;
            write_trust_edges_csv(&output, &edges)?;
            info!(edges = edges.len(), output = %output.display(), "exported trust edges");
        }
    }

    Ok(())
}
