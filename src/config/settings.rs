use ::config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

use crate::pubsub::{Priority, DEFAULT_PRIORITY};

/// Настройки хаба.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubConfig {
    /// Имя хаба, попадает в span диспетчера.
    pub name: String,
    /// Приоритет для `publish` без явного приоритета.
    pub default_priority: Priority,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            name: "orderhub".to_string(),
            default_priority: DEFAULT_PRIORITY,
        }
    }
}

impl HubConfig {
    /// Загружает настройки: значения по умолчанию, затем переменные
    /// окружения с префиксом `ORDERHUB_` (например `ORDERHUB_DEFAULT_PRIORITY`).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Environment::with_prefix("ORDERHUB"))
    }

    fn load_from(env: Environment) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let cfg = Config::builder()
            // Добавляем значения по умолчанию
            .set_default("name", defaults.name)?
            .set_default("default_priority", defaults.default_priority)?
            .add_source(env.try_parsing(true))
            .build()?;

        // Десериализуем конфигурацию в нашу структуру
        cfg.try_deserialize()
    }
}
