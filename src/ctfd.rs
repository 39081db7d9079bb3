use std::{
    collections::HashMap,
    fs::{self, File},
    io::Write,
    path::Path,
    sync::{Arc, LazyLock, Mutex, PoisonError},
};

use async_trait::async_trait;
use flate2::bufread::GzDecoder;
use regex::Regex;
use reqwest::{
    header::{AUTHORIZATION, COOKIE},
    Method, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use tar::Archive;
use tracing::{debug, info};
use url::Url;

use crate::{
    error::{RemoteError, Result},
    models::{Challenge, SubmitFlagResult, Team},
    remote::Remote,
};

static INIT_BLOB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"window\.init = (\{.*?\})").expect("valid regex"));
static CSRF_NONCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([a-f0-9]{64})""#).expect("valid regex"));
static TEAM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'teamId': (.*?),").expect("valid regex"));
static USER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'userId': (.*?),").expect("valid regex"));

/// HTTP client for a CTFd instance.
#[derive(Clone)]
pub struct Client {
    http_client: reqwest::Client,
    base_url: Url,
    token: String,
    identities: Arc<Mutex<HashMap<String, String>>>,
}

impl Client {
    pub fn new<T: AsRef<str>>(base_url: T, token: String) -> Result<Self> {
        static APP_USER_AGENT: &str =
            concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
        let http_client = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()?;
        Ok(Client {
            http_client,
            base_url: Url::parse(base_url.as_ref())?,
            token,
            identities: Arc::default(),
        })
    }

    fn api_url(&self, path: &[&str]) -> Result<Url> {
        join_segments(&self.base_url, ["api", "v1"].into_iter().chain(path.iter().copied()))
    }

    /// API tokens go in `Authorization`, anything else is a session cookie.
    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let request = self.http_client.request(method, url);

        if self.token.is_empty() {
            request
        } else if self.token.starts_with("ctfd_") {
            request.header(AUTHORIZATION, format!("Token {}", self.token))
        } else {
            request.header(COOKIE, format!("session={}", self.token))
        }
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T> {
        let url = self.api_url(path)?;
        debug!("GET {}", url);
        let body = self
            .request(Method::GET, url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        unwrap_envelope(&body, &path.join("/"))
    }

    async fn init_blob(&self) -> Result<Option<String>> {
        let url = join_segments(&self.base_url, ["challenges"])?;
        let html = self
            .request(Method::GET, url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(extract_init_blob(&html))
    }

    fn cached_identity(&self) -> Option<String> {
        self.identities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&self.token)
            .cloned()
    }

    fn cache_identity(&self, id: &str) {
        self.identities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.token.clone(), id.to_string());
    }

    /// Absolute URLs pass through; platform-relative paths are resolved
    /// against the base URL, keeping their query string.
    fn resolve_file(&self, file: &str) -> Result<String> {
        if file.starts_with("http:") || file.starts_with("https:") {
            return Ok(file.to_string());
        }

        let (path, query) = match file.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (file, None),
        };
        let mut url = join_segments(&self.base_url, path.split('/').filter(|s| !s.is_empty()))?;
        url.set_query(query);
        Ok(url.to_string())
    }

    fn parse_challenge(&self, data: CtfdChallenge) -> Result<Challenge> {
        let files = data
            .files
            .map(|files| {
                files
                    .iter()
                    .map(|file| self.resolve_file(file))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        Ok(Challenge {
            id: data.id,
            name: data.name,
            category: data.category,
            value: data.value,
            solves: data.solves.unwrap_or_default(),
            solved: data.solved_by_me,
            description: data.description.filter(|d| !d.is_empty()),
            connection: data.connection_info.filter(|c| !c.is_empty()),
            files,
        })
    }

    fn same_origin(&self, url: &Url) -> bool {
        url.origin() == self.base_url.origin()
    }
}

#[async_trait]
impl Remote for Client {
    async fn fetch_challenge(&self, id: &str) -> Result<Challenge> {
        let data: CtfdChallenge = self.get_data(&["challenges", id]).await?;
        self.parse_challenge(data)
    }

    async fn fetch_challenges(&self) -> Result<Vec<Challenge>> {
        let data: Vec<CtfdChallenge> = self.get_data(&["challenges"]).await?;
        data.into_iter()
            .map(|challenge| self.parse_challenge(challenge))
            .collect()
    }

    async fn submit_flag(&self, id: &str, flag: &str) -> Result<SubmitFlagResult> {
        let url = self.api_url(&["challenges", "attempt"])?;
        let challenge_id = id
            .parse::<i64>()
            .map(serde_json::Value::from)
            .unwrap_or_else(|_| serde_json::Value::from(id));

        let mut request = self.request(Method::POST, url).json(&serde_json::json!({
            "challenge_id": challenge_id,
            "submission": flag,
        }));
        // session cookies need the page's CSRF nonce, API tokens do not
        if !self.token.starts_with("ctfd_") {
            let blob = self.init_blob().await.ok().flatten();
            if let Some(nonce) = blob.as_deref().and_then(extract_csrf) {
                request = request.header("CSRF-Token", nonce);
            }
        }

        let response = request.send().await?;
        let response = if response.status() == StatusCode::TOO_MANY_REQUESTS {
            response
        } else {
            response.error_for_status()?
        };
        let body = response.text().await?;
        let attempt: CtfdAttempt = unwrap_envelope(&body, "challenges/attempt")?;
        debug!("attempt on {} returned {:?}", id, attempt.status);
        Ok(attempt.status)
    }

    async fn fetch_scoreboard(&self) -> Result<Vec<Team>> {
        let data: Vec<CtfdStanding> = self.get_data(&["scoreboard"]).await?;
        Ok(data
            .into_iter()
            .map(|standing| Team {
                id: standing.account_id,
                name: standing.name,
                position: standing.pos,
                score: standing.score,
            })
            .collect())
    }

    async fn resolve_caller_identity(&self) -> Result<Option<String>> {
        if let Some(id) = self.cached_identity() {
            return Ok(Some(id));
        }

        let Some(blob) = self.init_blob().await? else {
            return Ok(None);
        };
        let id = extract_identity(&blob);
        if let Some(id) = &id {
            self.cache_identity(id);
        }
        Ok(id)
    }

    async fn download_challenge_assets(&self, id: &str, destination: &Path) -> Result<bool> {
        let challenge = self.fetch_challenge(id).await?;
        fs::create_dir_all(destination)?;

        for file in challenge.files.iter().flatten() {
            let url = Url::parse(file)?;
            let file_name = url_file_name(&url);
            let request = if self.same_origin(&url) {
                self.request(Method::GET, url)
            } else {
                self.http_client.get(url)
            };
            let file: bytes::Bytes = request.send().await?.error_for_status()?.bytes().await?;
            info!("grabbed attachment {}", &file_name);

            if file_name.ends_with(".tar.gz") && untar_file(&file, destination).is_ok() {
                continue;
            }
            File::create(destination.join(&file_name))?.write_all(&file)?;
        }
        Ok(true)
    }

    fn credential(&self) -> Option<&str> {
        Some(self.token.as_str()).filter(|token| !token.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CtfdChallenge {
    #[serde(deserialize_with = "id_string")]
    id: String,
    name: String,
    category: String,
    value: i64,
    #[serde(default)]
    solves: Option<i64>,
    #[serde(default)]
    solved_by_me: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    connection_info: Option<String>,
    #[serde(default)]
    files: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct CtfdStanding {
    pos: u32,
    #[serde(deserialize_with = "id_string")]
    account_id: String,
    name: String,
    score: i64,
}

#[derive(Debug, Deserialize)]
struct CtfdAttempt {
    status: SubmitFlagResult,
}

fn unwrap_envelope<T: DeserializeOwned>(body: &str, what: &str) -> Result<T> {
    let response: ApiResponse<T> = serde_json::from_str(body)?;
    response
        .data
        .ok_or_else(|| RemoteError::NoData(what.to_string()))
}

fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

fn join_segments<'a>(base: &Url, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| RemoteError::Url(format!("{base} cannot be a base url")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn url_file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(Iterator::last)
        .filter(|name| !name.is_empty())
        .unwrap_or("attachment")
        .to_string()
}

fn untar_file(file: &[u8], destination: &Path) -> Result<()> {
    let tar = GzDecoder::new(file);
    let mut archive = Archive::new(tar);
    archive.unpack(destination)?;
    Ok(())
}

/// The `window.init = {...}` object CTFd embeds in its pages.
fn extract_init_blob(html: &str) -> Option<String> {
    let html = html.replace('\n', " ");
    INIT_BLOB
        .captures(&html)
        .map(|captures| captures[1].to_string())
}

fn extract_csrf(blob: &str) -> Option<String> {
    CSRF_NONCE
        .captures(blob)
        .map(|captures| captures[1].to_string())
}

/// Team id in team mode, user id in user mode.
fn extract_identity(blob: &str) -> Option<String> {
    let capture = |regex: &Regex| {
        regex
            .captures(blob)
            .map(|captures| captures[1].trim().trim_matches('"').to_string())
    };

    capture(&*TEAM_ID)
        .filter(|id| id != "null")
        .or_else(|| capture(&*USER_ID).filter(|id| id != "null"))
}
