use clap::{Parser, Subcommand};
use ctf_cli::models::PlatformKind;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Init {
            url,
            path,
            kind,
            no_git,
        } => {
            ctf_cli::commands::init(url, *kind, path, !no_git).await?;
        }
        Commands::Configure {} => {
            ctf_cli::commands::configure().await?;
        }
        Commands::RefreshChallenges {} => {
            ctf_cli::commands::refresh_challenges().await?;
        }
        Commands::RefreshScoreboard {} => {
            ctf_cli::commands::refresh_scoreboard().await?;
        }
        Commands::Challenges { refresh } => {
            ctf_cli::commands::challenges(*refresh).await?;
        }
        Commands::Scoreboard { refresh } => {
            ctf_cli::commands::scoreboard(*refresh).await?;
        }
        Commands::SearchChallenge {} => {
            ctf_cli::commands::search_challenge().await?;
        }
        Commands::OpenChallenge { id } => {
            ctf_cli::commands::open_challenge(id).await?;
        }
        Commands::SolveChallenge { id, flag } => {
            ctf_cli::commands::solve_challenge(id, flag).await?;
        }
        Commands::DownloadChallenge { id } => {
            ctf_cli::commands::download_challenge(id).await?;
        }
        Commands::SearchTeam {} => {
            ctf_cli::commands::search_team().await?;
        }
        Commands::OpenTeam { id } => {
            ctf_cli::commands::open_team(id).await?;
        }
        Commands::OwnTeam {} => {
            ctf_cli::commands::own_team().await?;
        }
        Commands::Watch { interval } => {
            ctf_cli::commands::watch(*interval).await?;
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a workspace for a CTF
    Init {
        #[arg()]
        url: String,
        #[arg()]
        path: Option<String>,
        #[arg(long, value_enum, default_value_t = PlatformKind::Ctfd)]
        kind: PlatformKind,
        /// Do not initialise a git repository
        #[arg(long)]
        no_git: bool,
    },
    /// Change platform, URL or token
    Configure {},
    RefreshChallenges {},
    RefreshScoreboard {},
    /// List challenges by category
    Challenges {
        #[arg(long)]
        refresh: bool,
    },
    Scoreboard {
        #[arg(long)]
        refresh: bool,
    },
    SearchChallenge {},
    /// Show a challenge and scaffold its folder
    OpenChallenge {
        #[arg()]
        id: Option<String>,
    },
    SolveChallenge {
        #[arg()]
        id: Option<String>,
        #[arg(long)]
        flag: Option<String>,
    },
    /// Fetch a challenge's attachments into its folder
    DownloadChallenge {
        #[arg()]
        id: Option<String>,
    },
    SearchTeam {},
    OpenTeam {
        #[arg()]
        id: Option<String>,
    },
    /// Show your own team
    OwnTeam {},
    /// Keep refreshing and print what changed
    Watch {
        /// Seconds between refreshes, defaults to the workspace setting
        #[arg(long)]
        interval: Option<u64>,
    },
}
