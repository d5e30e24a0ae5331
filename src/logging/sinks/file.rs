use std::path::Path;

use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{layer::Layer as LayerTrait, registry::LookupSpan};

use crate::logging::{config::LoggingConfig, formatter};

/// Файловый слой с ежедневной ротацией и неблокирующей записью.
///
/// `WorkerGuard` должен жить, пока нужен лог: при его удалении буфер
/// сбрасывается на диск.
pub fn layer_with_config<S>(
    config: &LoggingConfig,
    dir: &Path,
) -> (Box<dyn LayerTrait<S> + Send + Sync>, WorkerGuard)
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let appender = rolling::daily(dir, &config.file_prefix);
    let (writer, guard) = non_blocking(appender);
    // В файл ANSI-последовательности не пишем.
    let layer = formatter::build_formatter_from_config(config, writer, false);
    (layer, guard)
}
