use std::{collections::HashSet, path::Path};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::{
    events::RefreshEmitter,
    models::{Challenge, SubmitFlagResult, Team},
    remote::Remote,
    state::{self, WorkspaceState, CHALLENGE_KEY, FLAG_KEY, SYNCED_KEY, TEAM_KEY, TOKEN_KEY},
};

/// Local view of a CTF, kept in sync with a remote platform.
///
/// Views read challenges and teams from here and subscribe to
/// [`Tracker::on_challenge_refresh`] / [`Tracker::on_team_refresh`] to learn
/// when to redraw. Refreshes never fail loudly: a failed fetch is logged,
/// reported as `false`, and leaves the cached data alone.
pub struct Tracker<R> {
    remote: R,
    state: WorkspaceState,
    pub on_challenge_refresh: RefreshEmitter,
    pub on_team_refresh: RefreshEmitter,
}

impl<R: Remote> Tracker<R> {
    pub fn new(remote: R, state: WorkspaceState) -> Self {
        Tracker {
            remote,
            state,
            on_challenge_refresh: RefreshEmitter::default(),
            on_team_refresh: RefreshEmitter::default(),
        }
    }

    /// Swaps the platform backend, handing back the old one.
    pub fn replace_remote(&mut self, remote: R) -> R {
        std::mem::replace(&mut self.remote, remote)
    }

    pub fn persist(&mut self) -> anyhow::Result<()> {
        self.state.save()
    }

    pub async fn refresh_challenge(&mut self, id: &str) -> bool {
        let challenge = match self.remote.fetch_challenge(id).await {
            Ok(challenge) => challenge,
            Err(err) => {
                warn!("could not refresh challenge {}: {}", id, err);
                return false;
            }
        };

        if let Err(err) = self.store_challenge(challenge) {
            warn!("could not store challenge {}: {}", id, err);
            return false;
        }

        self.on_challenge_refresh.fire(Some(id));
        true
    }

    pub async fn refresh_challenges(&mut self) -> bool {
        let challenges = match self.remote.fetch_challenges().await {
            Ok(challenges) => challenges,
            Err(err) => {
                warn!("could not refresh challenges: {}", err);
                return false;
            }
        };

        debug!("merging {} challenges", challenges.len());
        for challenge in challenges {
            let id = challenge.id.clone();
            if let Err(err) = self.store_challenge(challenge) {
                warn!("could not store challenge {}: {}", id, err);
                return false;
            }
        }
        self.mark_synced("challenges");

        self.on_challenge_refresh.fire(None);
        true
    }

    pub async fn refresh_teams(&mut self) -> bool {
        let teams = match self.remote.fetch_scoreboard().await {
            Ok(teams) => teams,
            Err(err) => {
                warn!("could not refresh scoreboard: {}", err);
                return false;
            }
        };

        let upstream: HashSet<String> = teams.iter().map(|team| team.id.clone()).collect();

        debug!("merging {} teams", teams.len());
        for team in teams {
            let id = team.id.clone();
            if let Err(err) = self.store_team(team) {
                warn!("could not store team {}: {}", id, err);
                return false;
            }
        }

        let stale: Vec<String> = self
            .team_keys()
            .filter(|key| !upstream.contains(&key[TEAM_KEY.len()..]))
            .map(str::to_owned)
            .collect();
        for key in stale {
            debug!("dropping {}", key);
            self.state.delete(&key);
        }
        self.mark_synced("teams");

        self.on_team_refresh.fire(None);
        true
    }

    /// Refreshes challenges and scoreboard. One failing does not skip the
    /// other.
    pub async fn refresh_all(&mut self) -> bool {
        let challenges = self.refresh_challenges().await;
        let teams = self.refresh_teams().await;
        challenges && teams
    }

    /// Submits a flag. Accepted flags refresh the challenge and the
    /// scoreboard before returning.
    pub async fn solve_challenge(&mut self, id: &str, flag: &str) -> SubmitFlagResult {
        let result = match self.remote.submit_flag(id, flag).await {
            Ok(result) => result,
            Err(err) => {
                warn!("could not submit flag for challenge {}: {}", id, err);
                SubmitFlagResult::Error
            }
        };

        if result.is_accepted() {
            info!("flag accepted for challenge {}", id);
            self.refresh_challenge(id).await;
            self.refresh_teams().await;
        }

        result
    }

    /// Fetches the challenge's attachments into `destination`.
    pub async fn download_challenge(&mut self, id: &str, destination: &Path) -> bool {
        match self.remote.download_challenge_assets(id, destination).await {
            Ok(true) => {
                self.on_challenge_refresh.fire(Some(id));
                true
            }
            Ok(false) => false,
            Err(err) => {
                warn!("could not download challenge {}: {}", id, err);
                false
            }
        }
    }

    pub fn get_challenge(&self, id: &str) -> Option<Challenge> {
        self.state.get(&state::key(CHALLENGE_KEY, id))
    }

    pub fn get_challenges(&self) -> Vec<Challenge> {
        self.state
            .keys()
            .filter(|key| key.starts_with(CHALLENGE_KEY))
            .filter_map(|key| self.state.get(key))
            .collect()
    }

    pub fn get_team(&self, id: &str) -> Option<Team> {
        self.state.get(&state::key(TEAM_KEY, id))
    }

    pub fn get_teams(&self) -> Vec<Team> {
        self.team_keys()
            .filter_map(|key| self.state.get(key))
            .collect()
    }

    /// Who we are on the scoreboard. Resolved answers are remembered per
    /// credential.
    pub async fn get_team_id(&mut self) -> Option<String> {
        let cache_key = self
            .remote
            .credential()
            .map(|credential| state::key(TOKEN_KEY, credential));

        if let Some(id) = cache_key.as_deref().and_then(|key| self.state.get::<String>(key)) {
            return Some(id);
        }

        let id = match self.remote.resolve_caller_identity().await {
            Ok(id) => id?,
            Err(err) => {
                warn!("could not resolve own team: {}", err);
                return None;
            }
        };

        if let Some(key) = cache_key {
            if let Err(err) = self.state.set(key, &id) {
                warn!("could not remember own team: {}", err);
            }
        }
        Some(id)
    }

    pub fn remember_flag(&mut self, id: &str, flag: &str) {
        if let Err(err) = self.state.set(state::key(FLAG_KEY, id), &flag) {
            warn!("could not remember flag for challenge {}: {}", id, err);
        }
    }

    pub fn last_flag(&self, id: &str) -> Option<String> {
        self.state.get(&state::key(FLAG_KEY, id))
    }

    /// When `kind` ("challenges" or "teams") was last fully refreshed.
    pub fn last_synced(&self, kind: &str) -> Option<DateTime<Utc>> {
        self.state.get(&state::key(SYNCED_KEY, kind))
    }

    fn store_challenge(&mut self, challenge: Challenge) -> serde_json::Result<()> {
        let key = state::key(CHALLENGE_KEY, &challenge.id);
        let old: Option<Challenge> = self.state.get(&key);
        self.state.set(key, &Challenge::merged(old.as_ref(), challenge))
    }

    fn store_team(&mut self, team: Team) -> serde_json::Result<()> {
        let key = state::key(TEAM_KEY, &team.id);
        let old: Option<Team> = self.state.get(&key);
        self.state.set(key, &Team::merged(old.as_ref(), team))
    }

    fn team_keys(&self) -> impl Iterator<Item = &str> {
        self.state.keys().filter(|key| key.starts_with(TEAM_KEY))
    }

    fn mark_synced(&mut self, kind: &str) {
        if let Err(err) = self.state.set(state::key(SYNCED_KEY, kind), &Utc::now()) {
            warn!("could not record sync time: {}", err);
        }
    }
}
