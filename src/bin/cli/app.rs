use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use wordpractice_lib::sync::{
    start_sync_scheduler, FileQueueSlot, JsonFileRemote, SharedRemote, SyncQueue, SyncScheduler,
};
use wordpractice_lib::{AppConfig, PracticeSession, SessionIdentity, SharedIdentity};

/// Pending writes, kept between runs
const QUEUE_FILE: &str = "sync_queue.json";
/// Root of the file-backed word collections
const REMOTE_DIR: &str = "remote";

/// Shared application state for CLI commands
pub struct App {
    pub config: AppConfig,
    pub data_dir: PathBuf,
    pub session: Arc<PracticeSession>,
    user_id: Option<String>,
}

impl App {
    /// Initialize from the config file and the data directory it names
    pub fn new(config_path: Option<&Path>, user: Option<&str>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path.to_path_buf(),
            None => AppConfig::default_path().context("Failed to get config directory")?,
        };
        let config = AppConfig::load(&config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
        let data_dir = config.data_dir().context("Failed to get data directory")?;

        let user_id = user.map(str::to_string).or_else(|| config.user_id.clone());
        let identity = Arc::new(SessionIdentity::new());
        match &user_id {
            Some(id) => identity.sign_in(id),
            None => identity.sign_out(),
        }

        let queue = SyncQueue::open_or_empty(Box::new(FileQueueSlot::new(data_dir.join(QUEUE_FILE))));
        let remote: SharedRemote = Arc::new(JsonFileRemote::new(data_dir.join(REMOTE_DIR)));
        let session = Arc::new(PracticeSession::new(queue, remote, identity as SharedIdentity));

        Ok(Self {
            config,
            data_dir,
            session,
            user_id,
        })
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn require_user(&self) -> Result<&str> {
        self.user_id()
            .context("No user configured. Pass --user or set user_id in the config file")
    }

    /// Load the user's words into the session
    pub async fn load(&self) -> Result<usize> {
        let user_id = self.require_user()?;
        self.session
            .load()
            .await
            .with_context(|| format!("Failed to load words for {}", user_id))
    }

    /// Start flushing pending changes in the background
    pub fn start_sync(&self) -> SyncScheduler {
        start_sync_scheduler(self.session.coordinator(), self.config.sync.interval())
    }

    pub fn queue_path(&self) -> PathBuf {
        self.data_dir.join(QUEUE_FILE)
    }
}
