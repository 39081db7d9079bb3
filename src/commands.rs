use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{bail, Context};
use chrono::Local;
use crossterm::style::Stylize;
use inquire::InquireError;
use tracing::{info, warn};

use crate::{
    models::{Challenge, PlatformKind, SubmitFlagResult, Team, WorkspaceConfig},
    remote::Remote,
    tracker::Tracker,
    view,
    workspace::Workspace,
};

/// Initialises a CTF workspace in the current directory
pub async fn init(
    url: &str,
    kind: PlatformKind,
    path: &Option<String>,
    git: bool,
) -> anyhow::Result<()> {
    let current_dir = std::env::current_dir().context("could not get current directory")?;

    let root_dir = if let Some(path) = path {
        current_dir.join(path)
    } else {
        current_dir
    };

    let token = if kind == PlatformKind::Ctfd {
        let Some(has_token) =
            prompt(inquire::Confirm::new("Do you have an access token or session cookie?").prompt())?
        else {
            return Ok(());
        };
        if has_token {
            prompt(
                inquire::Password::new("Enter your token: ")
                    .without_confirmation()
                    .prompt(),
            )?
        } else {
            None
        }
    } else {
        None
    };

    let config = WorkspaceConfig {
        kind,
        url: url.to_owned(),
        ..WorkspaceConfig::default()
    };
    let workspace = Workspace::create(&root_dir, config, token.as_deref(), git)?;
    println!("{} {}", "Workspace initialised at".green(), root_dir.display());

    let mut tracker = workspace.tracker()?;
    if tracker.refresh_all().await {
        println!("{}", "Workspace synchronised.".green());
    } else {
        println!("{}", "Could not reach the platform, run `ctf configure`.".yellow());
    }
    tracker.persist()
}

/// Interactively changes the platform and credentials, then resyncs with the
/// new backend.
pub async fn configure() -> anyhow::Result<()> {
    let mut workspace = Workspace::from_env()?;
    let mut tracker = workspace.tracker()?;
    let mut config = workspace.config().clone();

    let kinds = vec![PlatformKind::Ctfd, PlatformKind::Custom];
    let cursor = kinds.iter().position(|k| *k == config.kind).unwrap_or(0);
    let Some(kind) = prompt(
        inquire::Select::new("Platform:", kinds)
            .with_starting_cursor(cursor)
            .prompt(),
    )?
    else {
        return Ok(());
    };
    config.kind = kind;

    if kind == PlatformKind::Ctfd {
        let Some(url) = prompt(
            inquire::Text::new("CTF URL:")
                .with_default(&config.url)
                .prompt(),
        )?
        else {
            return Ok(());
        };
        config.url = url;

        let Some(token) = prompt(
            inquire::Password::new("Token (leave empty to keep the current one):")
                .without_confirmation()
                .prompt(),
        )?
        else {
            return Ok(());
        };
        if !token.is_empty() {
            workspace.set_token(&token)?;
        }
    }

    workspace.save_config(config)?;
    tracker.replace_remote(workspace.backend()?);
    info!("switched to {} backend", kind);

    if tracker.refresh_all().await {
        println!("{}", "Configuration saved and synchronised.".green());
    } else {
        println!(
            "{}",
            "Configuration saved, but the platform could not be reached.".yellow()
        );
    }
    tracker.persist()
}

pub async fn refresh_challenges() -> anyhow::Result<()> {
    let workspace = Workspace::from_env()?;
    let mut tracker = workspace.tracker()?;

    if tracker.refresh_challenges().await {
        println!(
            "{}",
            format!("Refreshed {} challenges.", tracker.get_challenges().len()).green()
        );
    } else {
        println!("{}", "Could not refresh challenges.".red());
    }
    tracker.persist()
}

pub async fn refresh_scoreboard() -> anyhow::Result<()> {
    let workspace = Workspace::from_env()?;
    let mut tracker = workspace.tracker()?;

    if tracker.refresh_teams().await {
        println!(
            "{}",
            format!("Refreshed {} teams.", tracker.get_teams().len()).green()
        );
    } else {
        println!("{}", "Could not refresh the scoreboard.".red());
    }
    tracker.persist()
}

/// Prints the challenge tree.
pub async fn challenges(refresh: bool) -> anyhow::Result<()> {
    let workspace = Workspace::from_env()?;
    let mut tracker = workspace.tracker()?;
    if refresh {
        tracker.refresh_challenges().await;
    }

    let challenges = tracker.get_challenges();
    if challenges.is_empty() {
        println!("No challenges yet, run `ctf refresh-challenges`.");
    } else {
        print!("{}", view::render_challenge_tree(&challenges));
    }
    tracker.persist()
}

/// Prints the scoreboard, marking our own team.
pub async fn scoreboard(refresh: bool) -> anyhow::Result<()> {
    let workspace = Workspace::from_env()?;
    let mut tracker = workspace.tracker()?;
    if refresh {
        tracker.refresh_teams().await;
    }

    let own = tracker.get_team_id().await;
    let teams = tracker.get_teams();
    if teams.is_empty() {
        println!("No scoreboard yet, run `ctf refresh-scoreboard`.");
    } else {
        print!("{}", view::render_scoreboard(&teams, own.as_deref()));
    }
    tracker.persist()
}

pub async fn search_challenge() -> anyhow::Result<()> {
    open_challenge(&None).await
}

/// Shows a challenge and scaffolds its folder.
pub async fn open_challenge(id: &Option<String>) -> anyhow::Result<()> {
    let workspace = Workspace::from_env()?;
    let mut tracker = workspace.tracker()?;
    let Some(challenge) = pick_challenge(&tracker, id.as_deref())? else {
        return Ok(());
    };

    // list records carry no description, fetch the full one
    tracker.refresh_challenge(&challenge.id).await;
    let challenge = tracker.get_challenge(&challenge.id).unwrap_or(challenge);

    let folder = workspace.update_challenge_folder(&challenge)?;
    print!("{}", view::render_challenge(&challenge));
    println!();
    println!("{} {}", "Folder:".bold(), folder.display());
    tracker.persist()
}

/// Submits a flag. Solved challenges show the flag that solved them instead.
pub async fn solve_challenge(id: &Option<String>, flag: &Option<String>) -> anyhow::Result<()> {
    let workspace = Workspace::from_env()?;
    let mut tracker = workspace.tracker()?;
    let Some(challenge) = pick_challenge(&tracker, id.as_deref())? else {
        return Ok(());
    };

    if challenge.solved {
        if let Some(flag) = tracker.last_flag(&challenge.id) {
            println!("{} {}", "Already solved:".green(), flag.bold());
            return Ok(());
        }
    }

    let input = match flag {
        Some(flag) => flag.clone(),
        None => match prompt(inquire::Text::new("Flag:").prompt())? {
            Some(flag) => flag,
            None => return Ok(()),
        },
    };
    let Some(flag) = submitted_flag(input) else {
        return Ok(());
    };

    let result = tracker.solve_challenge(&challenge.id, &flag).await;
    match result {
        SubmitFlagResult::Correct => {
            println!("{}", format!("Correct flag for {}!", challenge.name).green().bold());
        }
        SubmitFlagResult::AlreadySolved => {
            println!(
                "{}",
                format!("Correct, {} was already solved.", challenge.name).green()
            );
        }
        SubmitFlagResult::Incorrect => {
            println!("{}", "Incorrect flag.".red());
        }
        SubmitFlagResult::RateLimited => {
            println!("{}", "Too many attempts, try again later.".yellow());
        }
        SubmitFlagResult::Error => {
            warn!("flag submission for {} failed", challenge.id);
            println!("{}", "Could not submit the flag.".red());
        }
    }

    if result.is_accepted() {
        tracker.remember_flag(&challenge.id, &flag);
    }
    tracker.persist()
}

/// Scaffolds the challenge folder and pulls the attachments into it.
pub async fn download_challenge(id: &Option<String>) -> anyhow::Result<()> {
    let workspace = Workspace::from_env()?;
    let mut tracker = workspace.tracker()?;
    let Some(challenge) = pick_challenge(&tracker, id.as_deref())? else {
        return Ok(());
    };

    let folder = workspace.update_challenge_folder(&challenge)?;
    if tracker.download_challenge(&challenge.id, &folder).await {
        println!(
            "{} {} to {}",
            "Downloaded".green(),
            challenge.name,
            folder.display()
        );
    } else {
        println!("{}", format!("Could not download {}.", challenge.name).red());
    }
    tracker.persist()
}

pub async fn search_team() -> anyhow::Result<()> {
    open_team(&None).await
}

pub async fn open_team(id: &Option<String>) -> anyhow::Result<()> {
    let workspace = Workspace::from_env()?;
    let mut tracker = workspace.tracker()?;
    let Some(team) = pick_team(&tracker, id.as_deref())? else {
        return Ok(());
    };

    let own = tracker.get_team_id().await;
    print!("{}", view::render_team(&team, own.as_deref() == Some(team.id.as_str())));
    tracker.persist()
}

/// Jumps to our own entry on the scoreboard.
pub async fn own_team() -> anyhow::Result<()> {
    let workspace = Workspace::from_env()?;
    let mut tracker = workspace.tracker()?;

    let Some(id) = tracker.get_team_id().await else {
        println!("{}", "Could not determine your team.".red());
        return tracker.persist();
    };
    match tracker.get_team(&id) {
        Some(team) => print!("{}", view::render_team(&team, true)),
        None => println!("{}", "Your team is not on the scoreboard yet.".yellow()),
    }
    tracker.persist()
}

/// Refreshes periodically and redraws whatever changed, until Ctrl-C.
pub async fn watch(interval: Option<u64>) -> anyhow::Result<()> {
    let workspace = Workspace::from_env()?;
    let mut tracker = workspace.tracker()?;
    let seconds = interval.unwrap_or(workspace.config().sync_interval).max(1);

    let challenges_changed = Arc::new(AtomicBool::new(false));
    let teams_changed = Arc::new(AtomicBool::new(false));
    {
        let changed = challenges_changed.clone();
        tracker
            .on_challenge_refresh
            .subscribe(move |_| changed.store(true, Ordering::Relaxed));
        let changed = teams_changed.clone();
        tracker
            .on_team_refresh
            .subscribe(move |_| changed.store(true, Ordering::Relaxed));
    }

    println!("Refreshing every {}s, press Ctrl-C to stop.", seconds);
    let mut ticks = Ticks::new(Duration::from_secs(seconds), async {
        let _ = tokio::signal::ctrl_c().await;
    });
    while ticks.next().await {
        tracker.refresh_all().await;
        tracker.persist()?;

        let challenges = challenges_changed.swap(false, Ordering::Relaxed);
        let teams = teams_changed.swap(false, Ordering::Relaxed);
        if !challenges && !teams {
            continue;
        }

        println!(
            "{}",
            format!("--- {} ---", Local::now().format("%H:%M:%S")).dim()
        );
        if challenges {
            print!("{}", view::render_challenge_tree(&tracker.get_challenges()));
        }
        if teams {
            let own = tracker.get_team_id().await;
            print!("{}", view::render_scoreboard(&tracker.get_teams(), own.as_deref()));
        }
    }

    tracker.persist()
}

/// Interval ticks that end once `shutdown` resolves. `shutdown` lives across
/// ticks, so a signal raised while the caller is busy still stops the next one.
struct Ticks {
    interval: tokio::time::Interval,
    shutdown: Pin<Box<dyn Future<Output = ()> + Send>>,
    stopped: bool,
}

impl Ticks {
    fn new(period: Duration, shutdown: impl Future<Output = ()> + Send + 'static) -> Self {
        Ticks {
            interval: tokio::time::interval(period),
            shutdown: Box::pin(shutdown),
            stopped: false,
        }
    }

    async fn next(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        tokio::select! {
            biased;
            _ = &mut self.shutdown => {
                self.stopped = true;
                false
            }
            _ = self.interval.tick() => true,
        }
    }
}

/// Flags are submitted as typed; blank input means nothing to submit.
fn submitted_flag(input: String) -> Option<String> {
    (!input.trim().is_empty()).then_some(input)
}

/// Cancelled or interrupted prompts abort the command quietly.
fn prompt<T>(result: Result<T, InquireError>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn pick_challenge<R: Remote>(
    tracker: &Tracker<R>,
    id: Option<&str>,
) -> anyhow::Result<Option<Challenge>> {
    if let Some(id) = id {
        return tracker
            .get_challenge(id)
            .map(Some)
            .with_context(|| format!("no challenge with id {id}, try `ctf refresh-challenges`"));
    }

    let challenges = tracker.get_challenges();
    if challenges.is_empty() {
        bail!("No challenges yet, run `ctf refresh-challenges`.");
    }

    let ordered: Vec<&Challenge> = view::challenge_tree(&challenges)
        .into_iter()
        .flat_map(|category| category.challenges)
        .collect();
    let labels: Vec<String> = ordered.iter().map(|c| view::challenge_label(c)).collect();

    let picked = prompt(inquire::Select::new("Challenge:", labels).raw_prompt())?;
    Ok(picked.map(|option| ordered[option.index].clone()))
}

fn pick_team<R: Remote>(tracker: &Tracker<R>, id: Option<&str>) -> anyhow::Result<Option<Team>> {
    if let Some(id) = id {
        return tracker
            .get_team(id)
            .map(Some)
            .with_context(|| format!("no team with id {id}, try `ctf refresh-scoreboard`"));
    }

    let teams = tracker.get_teams();
    if teams.is_empty() {
        bail!("No scoreboard yet, run `ctf refresh-scoreboard`.");
    }

    let ordered = view::scoreboard(&teams);
    let labels: Vec<String> = ordered.iter().map(|t| view::team_label(t)).collect();

    let picked = prompt(inquire::Select::new("Team:", labels).raw_prompt())?;
    Ok(picked.map(|option| ordered[option.index].clone()))
}
