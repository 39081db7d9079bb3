use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use config::Config;
use tracing::{debug, info};

use crate::{
    models::{Challenge, WorkspaceConfig},
    remote::Backend,
    state::WorkspaceState,
    templates,
    tracker::Tracker,
};

pub const CONFIG_FILE: &str = ".ctf.toml";

/// A directory holding one CTF: its config, local state and a folder per
/// challenge.
#[derive(Debug, Clone)]
pub struct Workspace {
    config: WorkspaceConfig,
    path: PathBuf,
}

impl Workspace {
    /// Tries to open the workspace at the current directory or any of its parents
    pub fn from_env() -> anyhow::Result<Self> {
        let current_dir = std::env::current_dir().context("could not get current directory")?;
        let root_dir = find_config_dir(&current_dir)?;
        Self::open(&root_dir)
    }

    pub fn create(
        dir: &Path,
        config: WorkspaceConfig,
        token: Option<&str>,
        git: bool,
    ) -> anyhow::Result<Self> {
        if dir.join(CONFIG_FILE).exists() {
            bail!("{} is already a CTF workspace.", dir.display());
        }

        let workspace = Self {
            config,
            path: dir.to_owned(),
        };
        workspace.create_initial_structure(token, git)?;
        Ok(workspace)
    }

    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let config = load_config(&path.join(CONFIG_FILE))?;
        Ok(Self {
            config,
            path: path.to_owned(),
        })
    }

    fn create_initial_structure(&self, token: Option<&str>, git: bool) -> anyhow::Result<()> {
        fs::create_dir_all(self.ctf_dir())?;
        self.write_config()?;

        let gitignore = self.path.join(".gitignore");
        let ignored = match fs::read_to_string(&gitignore) {
            Ok(ignored) => ignored,
            Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err).context("could not read .gitignore"),
        };
        if !ignored.lines().any(|line| line.trim() == ".ctf/") {
            let mut gitignore_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&gitignore)?;
            if !ignored.is_empty() && !ignored.ends_with('\n') {
                gitignore_file.write_all(b"\n")?;
            }
            gitignore_file.write_all(b".ctf/\n")?;
        }

        if let Some(token) = token {
            self.set_token(token)?;
        }

        if git && git2::Repository::discover(&self.path).is_err() {
            git2::Repository::init(&self.path).context("could not initialise git repository")?;
            debug!("initialised git repository at {}", self.path.display());
        }

        info!("Workspace created at {}", self.path.display());
        Ok(())
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn save_config(&mut self, config: WorkspaceConfig) -> anyhow::Result<()> {
        self.config = config;
        self.write_config()
    }

    fn write_config(&self) -> anyhow::Result<()> {
        let mut config_file = File::create(self.config_path())?;
        config_file.write_all(toml::to_string(&self.config)?.as_bytes())?;
        Ok(())
    }

    /// `CTF_TOKEN` wins over the token stored in the workspace.
    pub fn token(&self) -> anyhow::Result<Option<String>> {
        if let Some(token) = &self.config.token {
            return Ok(Some(token.clone()));
        }

        let auth_file = self.auth_path();
        if !auth_file.exists() {
            return Ok(None);
        }
        let token = fs::read_to_string(&auth_file).context("could not read auth file")?;
        let token = token.trim();
        Ok((!token.is_empty()).then(|| token.to_string()))
    }

    pub fn set_token(&self, token: &str) -> anyhow::Result<()> {
        fs::create_dir_all(self.ctf_dir())?;
        let mut file = File::create(self.auth_path())?;
        file.write_all(token.as_bytes())?;
        Ok(())
    }

    pub fn backend(&self) -> anyhow::Result<Backend> {
        Backend::from_config(&self.config, self.token()?).context("could not set up platform client")
    }

    pub fn tracker(&self) -> anyhow::Result<Tracker<Backend>> {
        let state = WorkspaceState::load(&self.state_path())?;
        Ok(Tracker::new(self.backend()?, state))
    }

    pub fn challenge_dir(&self, challenge: &Challenge) -> PathBuf {
        self.path.join(challenge.folder_name())
    }

    /// Scaffolds the folder for `challenge` unless it already exists. The
    /// configured template directory is copied if there is one, otherwise a
    /// README and a solve script are written.
    pub fn update_challenge_folder(&self, challenge: &Challenge) -> anyhow::Result<PathBuf> {
        let challenge_dir = self.challenge_dir(challenge);
        if challenge_dir.exists() {
            return Ok(challenge_dir);
        }

        match &self.config.template {
            Some(template) => {
                let template = self.path.join(template);
                copy_dir_all(&template, &challenge_dir).with_context(|| {
                    format!("could not copy template {}", template.display())
                })?;
            }
            None => {
                fs::create_dir_all(&challenge_dir)?;
                fs::write(challenge_dir.join("README.md"), templates::readme(challenge))?;
                fs::write(challenge_dir.join("solve.py"), templates::solve_script(challenge))?;
            }
        }

        info!("created challenge folder {}", challenge_dir.display());
        Ok(challenge_dir)
    }
}

// paths
impl Workspace {
    fn ctf_dir(&self) -> PathBuf {
        self.path.join(".ctf")
    }

    fn auth_path(&self) -> PathBuf {
        self.ctf_dir().join("auth")
    }

    fn state_path(&self) -> PathBuf {
        self.ctf_dir().join("state.json")
    }

    fn config_path(&self) -> PathBuf {
        self.path.join(CONFIG_FILE)
    }
}

fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<WorkspaceConfig> {
    Config::builder()
        .add_source(config::File::from(path.to_owned()))
        .add_source(config::Environment::with_prefix("CTF").try_parsing(true))
        .build()
        .with_context(|| format!("could not parse {}", path.display()))?
        .try_deserialize::<WorkspaceConfig>()
        .context("could not deserialize workspace config")
}

fn find_config_dir(starting_dir: &Path) -> anyhow::Result<PathBuf> {
    let mut current_dir = starting_dir.to_owned();

    loop {
        if current_dir.join(CONFIG_FILE).exists() {
            return Ok(current_dir);
        }

        // Check if we've reached the root directory
        if !current_dir.pop() {
            break;
        }
    }

    Err(anyhow::anyhow!(
        "{CONFIG_FILE} not found in any parent directories, run `ctf init` first"
    ))
}
