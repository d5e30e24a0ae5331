use std::{env, fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

/// Формат вывода событий.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        };
        f.write_str(s)
    }
}

/// Настройки логирования.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Уровень для событий крейта (`trace`, `debug`, `info`, ...).
    pub level: String,
    /// Дополнительные директивы `EnvFilter`, например `tokio=warn`.
    pub directives: Vec<String>,
    pub format: LogFormat,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_ansi: bool,
    /// Каталог для файлового лога. `None` — только консоль.
    pub log_dir: Option<PathBuf>,
    /// Префикс имени файла при ежедневной ротации.
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directives: Vec::new(),
            format: LogFormat::Compact,
            with_target: true,
            with_thread_ids: false,
            with_ansi: true,
            log_dir: None,
            file_prefix: "orderhub.log".to_string(),
        }
    }
}

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl LoggingConfig {
    /// Применяет переменные окружения `ORDERHUB_LOG_LEVEL`,
    /// `ORDERHUB_LOG_FORMAT` и `ORDERHUB_LOG_DIR`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("ORDERHUB_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(format) = env::var("ORDERHUB_LOG_FORMAT") {
            match format.parse() {
                Ok(format) => self.format = format,
                Err(e) => eprintln!("Ignoring ORDERHUB_LOG_FORMAT: {e}"),
            }
        }
        if let Ok(dir) = env::var("ORDERHUB_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let level = self.level.to_ascii_lowercase();
        if !LEVELS.contains(&level.as_str()) {
            return Err(format!("invalid log level '{}'", self.level));
        }
        if self.log_dir.is_some() && self.file_prefix.trim().is_empty() {
            return Err("file_prefix must not be empty when log_dir is set".to_string());
        }
        Ok(())
    }

    /// Создаёт каталог для файлового лога, если он задан.
    pub fn ensure_log_dir(&self) -> std::io::Result<()> {
        match &self.log_dir {
            Some(dir) => std::fs::create_dir_all(dir),
            None => Ok(()),
        }
    }

    /// Собирает директиву `EnvFilter`: уровень крейта плюс дополнительные.
    pub fn build_filter_directive(&self) -> String {
        let mut parts = vec![format!("orderhub={}", self.level.to_ascii_lowercase())];
        parts.extend(self.directives.iter().cloned());
        parts.join(",")
    }
}
