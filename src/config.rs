use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use std::{env, fs, io};

use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::context::GateContext;
use crate::files::path::is_valid_label;
use crate::logs::LogsConfig;
use crate::restful::RestfulServer;

pub const ENV_UPSTREAM_URL: &str = "GATE_UPSTREAM_URL";
pub const ENV_FILES_DIR: &str = "GATE_FILES_DIR";
pub const ENV_SECURE_COOKIES: &str = "GATE_SECURE_COOKIES";

pub trait CommonConfig {
    fn complete(&mut self) -> Result<()>;
}

/// See: [`shellexpand::full`].
pub fn expandenv(name: &str, s: impl AsRef<str>) -> Result<String> {
    let s =
        shellexpand::full(s.as_ref()).with_context(|| format!("expand env value for '{name}'"))?;
    Ok(s.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// The file was missing.
    Defaults(PathBuf),
}

impl ConfigSource {
    pub fn report(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
            ConfigSource::Defaults(path) => {
                warn!("Config file {} not found, using defaults", path.display())
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GateConfig {
    #[serde(default = "GateConfig::default_bind")]
    pub bind: String,

    /// Base URL of the SPARQL store; `/query`, `/update` and `/store` live
    /// directly below it.
    #[serde(default = "GateConfig::default_upstream_url")]
    pub upstream_url: String,

    #[serde(default = "GateConfig::default_files_dir")]
    pub files_dir: String,

    /// Set the Secure flag on session cookies. Only disable for local
    /// development without TLS.
    #[serde(default = "GateConfig::default_secure_cookies")]
    pub secure_cookies: bool,

    #[serde(default = "GateConfig::default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,

    #[serde(default = "GateConfig::default_max_upload_mib")]
    pub max_upload_mib: u64,

    #[serde(default = "GateConfig::default_payload_limit_mib")]
    pub payload_limit_mib: u64,

    /// Label of the root child directory that receives uploads.
    #[serde(default = "GateConfig::default_upload_dir")]
    pub upload_dir: String,

    pub keep_alive_secs: Option<u64>,

    pub workers: Option<u64>,

    #[serde(default)]
    pub logs: LogsConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            bind: Self::default_bind(),
            upstream_url: Self::default_upstream_url(),
            files_dir: Self::default_files_dir(),
            secure_cookies: Self::default_secure_cookies(),
            upstream_timeout_secs: Self::default_upstream_timeout_secs(),
            max_upload_mib: Self::default_max_upload_mib(),
            payload_limit_mib: Self::default_payload_limit_mib(),
            upload_dir: Self::default_upload_dir(),
            keep_alive_secs: None,
            workers: None,
            logs: LogsConfig::default(),
        }
    }
}

impl CommonConfig for GateConfig {
    fn complete(&mut self) -> Result<()> {
        if self.bind.is_empty() {
            bail!("bind is required");
        }

        if self.upstream_url.is_empty() {
            bail!("upstream_url is required");
        }
        self.upstream_url = expandenv("upstream_url", &self.upstream_url)?;
        let url = Url::parse(&self.upstream_url).context("parse upstream_url")?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("upstream_url must be an http or https url");
        }
        self.upstream_url = self.upstream_url.trim_end_matches('/').to_string();

        if self.files_dir.is_empty() {
            bail!("files_dir is required");
        }
        self.files_dir = expandenv("files_dir", &self.files_dir)?;

        if self.upstream_timeout_secs < Self::MIN_UPSTREAM_TIMEOUT_SECS
            || self.upstream_timeout_secs > Self::MAX_UPSTREAM_TIMEOUT_SECS
        {
            bail!(
                "upstream_timeout_secs must be in range [{}, {}]",
                Self::MIN_UPSTREAM_TIMEOUT_SECS,
                Self::MAX_UPSTREAM_TIMEOUT_SECS
            );
        }

        if self.max_upload_mib < Self::MIN_MAX_UPLOAD_MIB
            || self.max_upload_mib > Self::MAX_MAX_UPLOAD_MIB
        {
            bail!(
                "max_upload_mib must be in range [{}, {}]",
                Self::MIN_MAX_UPLOAD_MIB,
                Self::MAX_MAX_UPLOAD_MIB
            );
        }

        if self.payload_limit_mib < Self::MIN_PAYLOAD_LIMIT_MIB
            || self.payload_limit_mib > Self::MAX_PAYLOAD_LIMIT_MIB
        {
            bail!(
                "payload_limit_mib must be in range [{}, {}]",
                Self::MIN_PAYLOAD_LIMIT_MIB,
                Self::MAX_PAYLOAD_LIMIT_MIB
            );
        }

        if self.upload_dir.is_empty() {
            bail!("upload_dir is required");
        }
        if !is_valid_label(&self.upload_dir) {
            bail!("upload_dir must be a single directory label");
        }

        if let Some(keep_alive_secs) = self.keep_alive_secs {
            if keep_alive_secs == 0 {
                bail!("keep_alive_secs must be greater than 0");
            }
        }

        if let Some(workers) = self.workers {
            if workers == 0 {
                bail!("workers must be greater than 0");
            }
        }

        self.logs.complete().context("logs")?;

        Ok(())
    }
}

impl GateConfig {
    const MIN_UPSTREAM_TIMEOUT_SECS: u64 = 1;
    const MAX_UPSTREAM_TIMEOUT_SECS: u64 = 600;

    const MIN_MAX_UPLOAD_MIB: u64 = 1;
    const MAX_MAX_UPLOAD_MIB: u64 = 16 * 1024;

    const MIN_PAYLOAD_LIMIT_MIB: u64 = 1;
    const MAX_PAYLOAD_LIMIT_MIB: u64 = 1024;

    /// Read, override from the environment, and validate. A missing file
    /// means defaults; the returned source says which happened so it can be
    /// reported once logging is up.
    pub fn load(path: &Path) -> Result<(Self, ConfigSource)> {
        let (mut cfg, source): (Self, _) = match fs::read_to_string(path) {
            Ok(s) => (
                toml::from_str(&s).context("parse config toml")?,
                ConfigSource::File(path.to_path_buf()),
            ),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                (Self::default(), ConfigSource::Defaults(path.to_path_buf()))
            }
            Err(err) => {
                return Err(err).context(format!("read config file: {}", path.display()));
            }
        };

        cfg.apply_overrides(|key| env::var(key).ok());
        cfg.complete().context("validate config")?;
        Ok((cfg, source))
    }

    fn apply_overrides<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = get(ENV_UPSTREAM_URL) {
            self.upstream_url = url;
        }
        if let Some(dir) = get(ENV_FILES_DIR) {
            self.files_dir = dir;
        }
        if let Some(secure) = get(ENV_SECURE_COOKIES) {
            self.secure_cookies = !matches!(
                secure.trim().to_ascii_lowercase().as_str(),
                "false" | "0" | "no" | "off"
            );
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mib * 1024 * 1024
    }

    pub fn payload_limit_bytes(&self) -> usize {
        (self.payload_limit_mib * 1024 * 1024) as usize
    }

    pub fn build_ctx(&self) -> Result<Arc<GateContext>> {
        let files_dir = PathBuf::from(&self.files_dir);
        fs::create_dir_all(&files_dir)
            .with_context(|| format!("ensure files directory: {}", files_dir.display()))?;

        info!(
            "Upstream store at {}, files under {}",
            self.upstream_url,
            files_dir.display()
        );
        if !self.secure_cookies {
            warn!("Session cookies are issued without the Secure flag");
        }

        let ctx = GateContext::new(self.clone()).context("build gate context")?;
        Ok(Arc::new(ctx))
    }

    pub fn build_restful_server(&self, ctx: Arc<GateContext>) -> RestfulServer {
        let mut srv = RestfulServer::new(self.bind.clone(), ctx);
        if let Some(keep_alive_secs) = self.keep_alive_secs {
            srv.set_keep_alive_secs(keep_alive_secs);
        }
        if let Some(workers) = self.workers {
            srv.set_workers(workers);
        }
        srv
    }

    fn default_bind() -> String {
        String::from("0.0.0.0:8080")
    }

    fn default_upstream_url() -> String {
        String::from("http://localhost:7878")
    }

    fn default_files_dir() -> String {
        String::from("../files")
    }

    fn default_secure_cookies() -> bool {
        true
    }

    fn default_upstream_timeout_secs() -> u64 {
        30
    }

    fn default_max_upload_mib() -> u64 {
        4 * 1024
    }

    fn default_payload_limit_mib() -> u64 {
        64
    }

    fn default_upload_dir() -> String {
        String::from("upload")
    }
}
