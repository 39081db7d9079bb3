//! Plain-text renderings of the challenge tree, the scoreboard and the
//! detail panels.

use std::fmt::Write;

use crate::models::{Challenge, Team};

const SOLVED: &str = "✔";
const TODO: &str = "✘";

#[derive(Debug, PartialEq, Eq)]
pub struct CategoryNode<'a> {
    pub name: &'a str,
    pub challenges: Vec<&'a Challenge>,
}

/// Groups challenges by category. Categories and the challenges in them are
/// sorted case-insensitively by name.
pub fn challenge_tree(challenges: &[Challenge]) -> Vec<CategoryNode<'_>> {
    let mut categories: Vec<&str> = challenges.iter().map(|c| c.category.as_str()).collect();
    categories.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then(a.cmp(b)));
    categories.dedup();

    categories
        .into_iter()
        .map(|name| {
            let mut members: Vec<&Challenge> =
                challenges.iter().filter(|c| c.category == name).collect();
            members.sort_by_key(|c| c.name.to_lowercase());
            CategoryNode {
                name,
                challenges: members,
            }
        })
        .collect()
}

/// Teams in ascending position.
pub fn scoreboard(teams: &[Team]) -> Vec<&Team> {
    let mut sorted: Vec<&Team> = teams.iter().collect();
    sorted.sort_by_key(|team| team.position);
    sorted
}

pub fn challenge_label(challenge: &Challenge) -> String {
    format!(
        "{} {} [{}] {} Points, {} Solves",
        if challenge.solved { SOLVED } else { TODO },
        challenge.name,
        challenge.category,
        challenge.value,
        challenge.solves
    )
}

pub fn team_label(team: &Team) -> String {
    format!(
        "#{} {} ({} Points)",
        team.position, team.name, team.score
    )
}

pub fn render_challenge_tree(challenges: &[Challenge]) -> String {
    let mut out = String::new();
    for category in challenge_tree(challenges) {
        let solved = category.challenges.iter().filter(|c| c.solved).count();
        let _ = writeln!(
            out,
            "▾ {} ({}/{})",
            category.name,
            solved,
            category.challenges.len()
        );
        for challenge in category.challenges {
            let _ = writeln!(
                out,
                "  {} {} ({} Points, {} Solves)",
                if challenge.solved { SOLVED } else { TODO },
                challenge.name,
                challenge.value,
                challenge.solves
            );
        }
    }
    out
}

/// The scoreboard, with `own` marked if it is on it.
pub fn render_scoreboard(teams: &[Team], own: Option<&str>) -> String {
    let mut out = String::new();
    for team in scoreboard(teams) {
        let marker = if Some(team.id.as_str()) == own { "➤" } else { " " };
        let _ = writeln!(
            out,
            "{} {:>3}. {} ({} Points)",
            marker, team.position, team.name, team.score
        );
    }
    out
}

pub fn render_challenge(challenge: &Challenge) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", challenge.name);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} | {} Points | {} Solves | {}",
        challenge.category,
        challenge.value,
        challenge.solves,
        if challenge.solved { "Solved" } else { "Unsolved" }
    );

    if let Some(connection) = &challenge.connection {
        let _ = writeln!(out);
        let _ = writeln!(out, "Connection: {}", connection);
    }

    if let Some(description) = &challenge.description {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", html2md::parse_html(description).trim_end());
    }

    if let Some(files) = challenge.files.as_ref().filter(|files| !files.is_empty()) {
        let _ = writeln!(out);
        let _ = writeln!(out, "Files:");
        for file in files {
            let _ = writeln!(out, "  - {}", file);
        }
    }
    out
}

pub fn render_team(team: &Team, own: bool) -> String {
    let mut out = format!("# {}", team.name);
    if own {
        out.push_str(" (you)");
    }
    let _ = write!(
        out,
        "\n\nPosition {} | {} Points\n",
        team.position, team.score
    );
    out
}
