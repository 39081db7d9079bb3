use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use ctf_cli::{
    error::{RemoteError, Result},
    models::{Challenge, SubmitFlagResult, Team},
    remote::Remote,
    state::WorkspaceState,
    tracker::Tracker,
};

#[derive(Default)]
struct Upstream {
    challenges: Vec<Challenge>,
    teams: Vec<Team>,
    offline: bool,
    challenges_down: bool,
    verdict: Option<SubmitFlagResult>,
    identity: Option<String>,
    challenge_fetches: HashMap<String, usize>,
    scoreboard_fetches: usize,
    identity_lookups: usize,
}

#[derive(Clone, Default)]
struct FakeRemote {
    upstream: Arc<Mutex<Upstream>>,
    token: Option<String>,
}

impl FakeRemote {
    fn with(&self, f: impl FnOnce(&mut Upstream)) {
        f(&mut self.upstream.lock().unwrap());
    }

    fn read<T>(&self, f: impl FnOnce(&Upstream) -> T) -> T {
        f(&self.upstream.lock().unwrap())
    }
}

fn offline() -> RemoteError {
    RemoteError::NoData("offline".to_string())
}

#[async_trait]
impl Remote for FakeRemote {
    async fn fetch_challenge(&self, id: &str) -> Result<Challenge> {
        let mut upstream = self.upstream.lock().unwrap();
        *upstream.challenge_fetches.entry(id.to_string()).or_default() += 1;
        if upstream.offline {
            return Err(offline());
        }
        upstream
            .challenges
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| RemoteError::NoData(id.to_string()))
    }

    async fn fetch_challenges(&self) -> Result<Vec<Challenge>> {
        let upstream = self.upstream.lock().unwrap();
        if upstream.offline || upstream.challenges_down {
            return Err(offline());
        }
        Ok(upstream.challenges.clone())
    }

    async fn submit_flag(&self, _id: &str, _flag: &str) -> Result<SubmitFlagResult> {
        let upstream = self.upstream.lock().unwrap();
        upstream.verdict.ok_or_else(offline)
    }

    async fn fetch_scoreboard(&self) -> Result<Vec<Team>> {
        let mut upstream = self.upstream.lock().unwrap();
        upstream.scoreboard_fetches += 1;
        if upstream.offline {
            return Err(offline());
        }
        Ok(upstream.teams.clone())
    }

    async fn resolve_caller_identity(&self) -> Result<Option<String>> {
        let mut upstream = self.upstream.lock().unwrap();
        upstream.identity_lookups += 1;
        Ok(upstream.identity.clone())
    }

    async fn download_challenge_assets(&self, _id: &str, _destination: &Path) -> Result<bool> {
        Ok(!self.upstream.lock().unwrap().offline)
    }

    fn credential(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

fn challenge(id: &str, name: &str) -> Challenge {
    Challenge {
        id: id.to_string(),
        name: name.to_string(),
        category: "pwn".to_string(),
        value: 100,
        solves: 5,
        solved: false,
        description: None,
        connection: None,
        files: None,
    }
}

fn team(id: &str, name: &str, position: u32, score: i64) -> Team {
    Team {
        id: id.to_string(),
        name: name.to_string(),
        position,
        score,
    }
}

fn tracker(remote: &FakeRemote) -> Tracker<FakeRemote> {
    Tracker::new(remote.clone(), WorkspaceState::in_memory())
}

fn record_events(emitter: &mut ctf_cli::events::RefreshEmitter) -> Arc<Mutex<Vec<Option<String>>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    emitter.subscribe(move |id| sink.lock().unwrap().push(id.map(str::to_string)));
    events
}

#[tokio::test]
async fn refresh_challenges_stores_records_and_fires_once() {
    let remote = FakeRemote::default();
    remote.with(|u| u.challenges = vec![challenge("0", "Pwn 1")]);
    let mut tracker = tracker(&remote);
    let events = record_events(&mut tracker.on_challenge_refresh);

    assert!(tracker.refresh_challenges().await);

    assert_eq!(tracker.get_challenge("0"), Some(challenge("0", "Pwn 1")));
    assert_eq!(*events.lock().unwrap(), vec![None]);
    assert!(tracker.last_synced("challenges").is_some());
}

#[tokio::test]
async fn failed_refresh_keeps_the_snapshot() {
    let remote = FakeRemote::default();
    remote.with(|u| u.challenges = vec![challenge("0", "Pwn 1"), challenge("1", "Pwn 2")]);
    let mut tracker = tracker(&remote);
    assert!(tracker.refresh_challenges().await);
    let before = tracker.get_challenges();

    remote.with(|u| {
        u.offline = true;
        u.challenges[0].solves = 99;
    });
    let events = record_events(&mut tracker.on_challenge_refresh);

    assert!(!tracker.refresh_challenges().await);
    assert!(!tracker.refresh_challenge("0").await);
    assert_eq!(tracker.get_challenges(), before);
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn challenges_keep_insertion_order_and_are_never_dropped() {
    let remote = FakeRemote::default();
    remote.with(|u| u.challenges = vec![challenge("b", "Second"), challenge("a", "First")]);
    let mut tracker = tracker(&remote);
    assert!(tracker.refresh_challenges().await);

    remote.with(|u| u.challenges = vec![challenge("c", "Third")]);
    assert!(tracker.refresh_challenges().await);

    let ids: Vec<_> = tracker.get_challenges().into_iter().map(|c| c.id).collect();
    assert_eq!(ids, vec!["b", "a", "c"]);
}

#[tokio::test]
async fn single_refresh_merges_details_and_fires_for_that_id() {
    let remote = FakeRemote::default();
    remote.with(|u| u.challenges = vec![challenge("0", "Pwn 1")]);
    let mut tracker = tracker(&remote);
    assert!(tracker.refresh_challenges().await);

    remote.with(|u| {
        u.challenges[0].description = Some("smash it".to_string());
        u.challenges[0].solves = 6;
    });
    let events = record_events(&mut tracker.on_challenge_refresh);
    assert!(tracker.refresh_challenge("0").await);

    // the list endpoint drops the description again
    remote.with(|u| u.challenges[0].description = None);
    assert!(tracker.refresh_challenges().await);

    let cached = tracker.get_challenge("0").unwrap();
    assert_eq!(cached.solves, 6);
    assert_eq!(cached.description.as_deref(), Some("smash it"));
    assert_eq!(*events.lock().unwrap(), vec![Some("0".to_string()), None]);
}

#[tokio::test]
async fn refresh_teams_drops_teams_missing_upstream() {
    let remote = FakeRemote::default();
    remote.with(|u| u.teams = vec![team("t1", "A", 2, 50), team("t2", "B", 1, 80)]);
    let mut tracker = tracker(&remote);
    assert!(tracker.refresh_teams().await);
    assert_eq!(tracker.get_teams().len(), 2);

    remote.with(|u| u.teams = vec![team("t2", "B", 1, 90)]);
    let events = record_events(&mut tracker.on_team_refresh);
    assert!(tracker.refresh_teams().await);

    assert_eq!(tracker.get_teams(), vec![team("t2", "B", 1, 90)]);
    assert_eq!(tracker.get_team("t1"), None);
    assert_eq!(*events.lock().unwrap(), vec![None]);
}

#[tokio::test]
async fn refresh_teams_is_idempotent() {
    let remote = FakeRemote::default();
    remote.with(|u| u.teams = vec![team("t1", "A", 2, 50), team("t2", "B", 1, 80)]);
    let mut tracker = tracker(&remote);

    assert!(tracker.refresh_teams().await);
    let first = tracker.get_teams();
    assert!(tracker.refresh_teams().await);

    assert_eq!(tracker.get_teams(), first);
}

#[tokio::test]
async fn failed_team_refresh_deletes_nothing() {
    let remote = FakeRemote::default();
    remote.with(|u| u.teams = vec![team("t1", "A", 1, 50)]);
    let mut tracker = tracker(&remote);
    assert!(tracker.refresh_teams().await);

    remote.with(|u| u.offline = true);
    assert!(!tracker.refresh_teams().await);
    assert_eq!(tracker.get_teams(), vec![team("t1", "A", 1, 50)]);
}

#[tokio::test]
async fn accepted_flags_refresh_challenge_and_scoreboard_once() {
    for verdict in [SubmitFlagResult::Correct, SubmitFlagResult::AlreadySolved] {
        let remote = FakeRemote::default();
        remote.with(|u| {
            u.challenges = vec![challenge("0", "Pwn 1")];
            u.teams = vec![team("t1", "A", 1, 100)];
            u.verdict = Some(verdict);
        });
        let mut tracker = tracker(&remote);
        assert!(tracker.refresh_challenges().await);

        remote.with(|u| u.challenges[0].solved = true);
        assert_eq!(tracker.solve_challenge("0", "flag{x}").await, verdict);

        assert_eq!(remote.read(|u| u.challenge_fetches.get("0").copied()), Some(1));
        assert_eq!(remote.read(|u| u.scoreboard_fetches), 1);
        assert!(tracker.get_challenge("0").unwrap().solved);
    }
}

#[tokio::test]
async fn rejected_flags_have_no_side_effects() {
    for verdict in [
        Some(SubmitFlagResult::Incorrect),
        Some(SubmitFlagResult::RateLimited),
        None,
    ] {
        let remote = FakeRemote::default();
        remote.with(|u| {
            u.challenges = vec![challenge("0", "Pwn 1")];
            u.verdict = verdict;
        });
        let mut tracker = tracker(&remote);

        let result = tracker.solve_challenge("0", "flag{nope}").await;
        assert_eq!(result, verdict.unwrap_or(SubmitFlagResult::Error));
        assert!(remote.read(|u| u.challenge_fetches.is_empty()));
        assert_eq!(remote.read(|u| u.scoreboard_fetches), 0);
    }
}

#[tokio::test]
async fn team_id_is_resolved_once_per_credential() {
    let remote = FakeRemote {
        token: Some("ctfd_abc".to_string()),
        ..FakeRemote::default()
    };
    remote.with(|u| u.identity = Some("t2".to_string()));
    let mut tracker = tracker(&remote);

    assert_eq!(tracker.get_team_id().await.as_deref(), Some("t2"));
    assert_eq!(tracker.get_team_id().await.as_deref(), Some("t2"));
    assert_eq!(remote.read(|u| u.identity_lookups), 1);

    let other = FakeRemote {
        token: Some("ctfd_other".to_string()),
        upstream: remote.upstream.clone(),
    };
    tracker.replace_remote(other);
    assert_eq!(tracker.get_team_id().await.as_deref(), Some("t2"));
    assert_eq!(remote.read(|u| u.identity_lookups), 2);
}

#[tokio::test]
async fn remembers_accepted_flags() {
    let remote = FakeRemote::default();
    let mut tracker = tracker(&remote);

    assert_eq!(tracker.last_flag("0"), None);
    tracker.remember_flag("0", "flag{x}");
    assert_eq!(tracker.last_flag("0").as_deref(), Some("flag{x}"));
}

#[tokio::test]
async fn downloads_notify_the_challenge() {
    let remote = FakeRemote::default();
    let mut tracker = tracker(&remote);
    let events = record_events(&mut tracker.on_challenge_refresh);

    assert!(tracker.download_challenge("0", Path::new("/tmp/unused")).await);
    remote.with(|u| u.offline = true);
    assert!(!tracker.download_challenge("0", Path::new("/tmp/unused")).await);

    assert_eq!(*events.lock().unwrap(), vec![Some("0".to_string())]);
}

#[tokio::test]
async fn state_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let remote = FakeRemote::default();
    remote.with(|u| u.teams = vec![team("t1", "A", 1, 10)]);

    let mut tracker = Tracker::new(remote.clone(), WorkspaceState::load(&path).unwrap());
    assert!(tracker.refresh_teams().await);
    tracker.persist().unwrap();

    let tracker = Tracker::new(remote, WorkspaceState::load(&path).unwrap());
    assert_eq!(tracker.get_teams(), vec![team("t1", "A", 1, 10)]);
}

#[tokio::test]
async fn refresh_all_syncs_teams_when_challenges_fail() {
    let remote = FakeRemote::default();
    remote.with(|u| {
        u.challenges = vec![challenge("0", "Pwn 1")];
        u.teams = vec![team("t1", "flagbearers", 1, 500)];
        u.challenges_down = true;
    });
    let mut tracker = tracker(&remote);
    let team_events = record_events(&mut tracker.on_team_refresh);

    assert!(!tracker.refresh_all().await);
    assert!(tracker.get_challenges().is_empty());
    assert_eq!(tracker.get_teams().len(), 1);
    assert_eq!(*team_events.lock().unwrap(), vec![None]);
    assert_eq!(remote.read(|u| u.scoreboard_fetches), 1);

    remote.with(|u| u.challenges_down = false);
    assert!(tracker.refresh_all().await);
    assert_eq!(tracker.get_challenges().len(), 1);
}
