use thiserror::Error;

/// Ошибки жизненного цикла и конфигурации хаба.
#[derive(Debug, Error)]
pub enum HubError {
    /// Хаб уже остановлен; повторный запуск не поддерживается.
    #[error("hub is stopped and cannot be restarted")]
    Stopped,

    /// `join` не может дождаться доставки: диспетчер не работает.
    #[error("hub is not running: {pending} envelope(s) would never be dispatched")]
    NotRunning { pending: usize },

    /// `start` вызван вне контекста tokio runtime.
    #[error("no tokio runtime available to spawn the dispatcher")]
    NoRuntime,

    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
}

pub type HubResult<T> = Result<T, HubError>;

/// Причина сбоя обработчика подписчика.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriberFailure {
    /// Обработчик вернул `Err`.
    #[error("returned error: {0}")]
    Returned(String),

    /// Обработчик запаниковал.
    #[error("panicked: {0}")]
    Panicked(String),
}

/// Сбой одного обработчика при доставке одного конверта.
///
/// Никогда не передаётся издателю и не прерывает рассылку: хаб только
/// логирует его и увеличивает счётчик.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("subscriber on topic '{topic}' failed for envelope #{sequence}: {failure}")]
pub struct SubscriberError {
    pub topic: String,
    pub sequence: u64,
    pub failure: SubscriberFailure,
}
