use clap::{Parser, Subcommand};
use log::info;
use likedsync::clients::{
    ReqwestTransport,
    auth::StdinRedirect,
    errors::{Error, Result},
};
use likedsync::config::ConfigBuilder;
use likedsync::syncer::Syncer;

#[derive(Parser)]
#[command(name = "likedsync")]
#[command(version, about = "Copy liked Spotify tracks into a public playlist", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create (or reuse) the playlist and add every liked track it lacks
    Sync {
        /// Name of the destination playlist, matched exactly
        #[arg(long)]
        name: Option<String>,
        /// Description used when the playlist has to be created
        #[arg(long)]
        description: Option<String>,
        /// Create the playlist as private instead of public
        #[arg(long)]
        private: bool,
        /// Report what would change without modifying anything
        #[arg(long)]
        dry_run: bool,
        /// Items per listing page (1-50)
        #[arg(long)]
        page_size: Option<u32>,
        /// Tracks per add request (1-100)
        #[arg(long)]
        batch_size: Option<usize>,
    },
}

/// Parses the command line and runs the chosen command
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sync {
            name,
            description,
            private,
            dry_run,
            page_size,
            batch_size,
        } => {
            let config = ConfigBuilder::new()
                .playlist_name(name)
                .description(description)
                .public(!private)
                .dry_run(dry_run)
                .page_size(page_size)
                .batch_size(batch_size);
            sync_tracks(config).await?;
        }
    }
    Ok(())
}

async fn sync_tracks(builder: ConfigBuilder) -> Result<()> {
    info!("Building config ...");
    let config = builder.build()?;
    let transport = ReqwestTransport::default();

    // A browser prompt is shown here unless a refresh token is configured
    let report = Syncer::new(config, &transport).sync(StdinRedirect).await?;
    println!("{report}");

    if report.is_success() {
        Ok(())
    } else {
        Err(Error::IncompleteSync {
            failed_chunks: report.reconcile.failures.len(),
            added: report.reconcile.added,
        })
    }
}
