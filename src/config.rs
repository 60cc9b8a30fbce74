//! Configuration for cclip
//!
//! CLI arguments and environment variable handling using clap. Values are
//! validated once at startup and frozen into a [`Config`] that the store and
//! the HTTP server receive at construction.

use crate::error::ClipError;
use crate::guard::GuardMode;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

/// Default upload cap: 128 MiB
pub const DEFAULT_MAX_SIZE: i64 = 134_217_728;

/// Cloud Clip - share clipboard contents over HTTP
#[derive(Parser, Debug, Clone)]
#[command(name = "cclip")]
#[command(about = "Cloud Clip server")]
pub struct Args {
    /// TCP port to listen on
    #[arg(long, env = "CCLIP_PORT", default_value = "50979")]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "CCLIP_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Clip directory, relative paths resolve against the working directory
    #[arg(long, env = "CCLIP_DIR", default_value = "clips")]
    pub dir: PathBuf,

    /// Maximum clip size in bytes (0 = unlimited)
    #[arg(long, env = "CCLIP_MAX_SIZE", default_value_t = DEFAULT_MAX_SIZE, allow_negative_numbers = true)]
    pub max_size: i64,

    /// Bearer token required on API requests (empty disables auth)
    #[arg(long, env = "CCLIP_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// Store locking: read-write (shared reads) or exclusive (one operation at a time)
    #[arg(long, env = "CCLIP_GUARD", default_value = "read-write")]
    pub guard: GuardMode,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CCLIP_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Check values clap cannot check on its own
    pub fn validate(&self) -> Result<(), ClipError> {
        if self.dir.as_os_str().is_empty() {
            return Err(ClipError::Config("clip directory must not be empty".into()));
        }
        if self.max_size < 0 {
            return Err(ClipError::Config(format!(
                "invalid maximum clip size {}",
                self.max_size
            )));
        }
        Ok(())
    }

    /// Validate and freeze into a [`Config`]
    pub fn into_config(self, cwd: &Path) -> Result<Config, ClipError> {
        self.validate()?;

        let clip_dir = if self.dir.is_absolute() {
            self.dir
        } else {
            cwd.join(self.dir)
        };

        let password = self.password.trim();

        Ok(Config {
            listen: SocketAddr::new(self.bind, self.port),
            clip_dir,
            max_clip_size: self.max_size as u64,
            token: (!password.is_empty()).then(|| password.to_string()),
            guard: self.guard,
        })
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: SocketAddr,
    pub clip_dir: PathBuf,
    /// Upload cap in bytes, 0 = unlimited
    pub max_clip_size: u64,
    /// Bearer token, `None` when auth is disabled
    pub token: Option<String>,
    pub guard: GuardMode,
}

impl Config {
    /// Config for an unauthenticated, uncapped store in `clip_dir`
    pub fn for_dir<P: Into<PathBuf>>(clip_dir: P) -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 0)),
            clip_dir: clip_dir.into(),
            max_clip_size: 0,
            token: None,
            guard: GuardMode::default(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_max_clip_size(mut self, max: u64) -> Self {
        self.max_clip_size = max;
        self
    }
}
