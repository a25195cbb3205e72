use std::fs;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{Local, SecondsFormat};
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LogsConfig {
    #[serde(default)]
    pub target: LogTarget,

    #[serde(default)]
    pub level: LogLevel,

    /// Directory of `{name}.log` when `target` is `file`.
    #[serde(default = "LogsConfig::default_logs_dir")]
    pub logs_dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogTarget {
    #[serde(rename = "stdout")]
    #[default]
    Stdout,

    #[serde(rename = "stderr")]
    Stderr,

    #[serde(rename = "file")]
    File,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    #[serde(rename = "error")]
    Error,

    #[serde(rename = "warning")]
    Warning,

    #[serde(rename = "info")]
    #[default]
    Info,

    #[serde(rename = "debug")]
    Debug,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            target: LogTarget::default(),
            level: LogLevel::default(),
            logs_dir: Self::default_logs_dir(),
        }
    }
}

impl CommonConfig for LogsConfig {
    fn complete(&mut self) -> Result<()> {
        if self.target != LogTarget::File {
            return Ok(());
        }
        if self.logs_dir.is_empty() {
            bail!("logs_dir is required when target is file");
        }
        self.logs_dir = expandenv("logs_dir", &self.logs_dir)?;
        Ok(())
    }
}

impl LogsConfig {
    pub fn init(&self, name: &str) -> Result<()> {
        let level = match self.level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
        };

        let colored = match self.target {
            LogTarget::Stdout => io::stdout().is_terminal(),
            LogTarget::Stderr => io::stderr().is_terminal(),
            LogTarget::File => false,
        };
        let colors = ColoredLevelConfig::new()
            .info(Color::Green)
            .debug(Color::Magenta);

        let dispatch = fern::Dispatch::new()
            .format(move |out, message, record| {
                let now = Local::now().to_rfc3339_opts(SecondsFormat::Millis, true);
                if colored {
                    out.finish(format_args!(
                        "{now} [{}] {message}",
                        colors.color(record.level())
                    ))
                } else {
                    out.finish(format_args!("{now} [{}] {message}", record.level()))
                }
            })
            .level(level)
            // Keep dependency chatter out of the gateway's own log.
            .level_for("hyper", LevelFilter::Warn)
            .level_for("reqwest", LevelFilter::Warn);

        let dispatch = match self.target {
            LogTarget::Stdout => dispatch.chain(io::stdout()),
            LogTarget::Stderr => dispatch.chain(io::stderr()),
            LogTarget::File => {
                let dir = PathBuf::from(&self.logs_dir);
                fs::create_dir_all(&dir)
                    .with_context(|| format!("create logs dir {}", dir.display()))?;
                let path = dir.join(format!("{name}.log"));
                let file = fern::log_file(&path)
                    .with_context(|| format!("open log file {}", path.display()))?;
                dispatch.chain(file)
            }
        };

        dispatch.apply().context("init logger")?;
        Ok(())
    }

    fn default_logs_dir() -> String {
        String::from("logs")
    }
}
