use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

use tracing_appender::non_blocking::WorkerGuard;

/// Handle для управления lifecycle логирования.
///
/// Держит guard файлового sink-а: пока handle жив, неблокирующий writer
/// продолжает писать на диск.
pub struct LoggingHandle {
    file_guard: Option<WorkerGuard>,
    shutdown_started: AtomicBool,
    /// Порог, после которого медленный shutdown сообщается в stderr.
    flush_timeout: Duration,
}

impl LoggingHandle {
    pub fn new(file_guard: Option<WorkerGuard>) -> Self {
        Self {
            file_guard,
            shutdown_started: AtomicBool::new(false),
            flush_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_flush_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.flush_timeout = timeout;
        self
    }

    pub fn has_file_sink(&self) -> bool {
        self.file_guard.is_some()
    }

    pub fn is_shutdown_in_progress(&self) -> bool {
        self.shutdown_started.load(Ordering::Acquire)
    }

    /// Сбрасывает файловый буфер и освобождает writer.
    pub fn shutdown(mut self) {
        self.shutdown_started.store(true, Ordering::Release);
        tracing::info!("Logging shutdown initiated");

        let start = Instant::now();
        drop(self.file_guard.take());
        let elapsed = start.elapsed();

        if elapsed > self.flush_timeout {
            eprintln!(
                "WARNING: Logging shutdown took {}ms (timeout: {}ms)",
                elapsed.as_millis(),
                self.flush_timeout.as_millis()
            );
        }
    }
}

impl Drop for LoggingHandle {
    fn drop(&mut self) {
        if self.file_guard.is_some() && !self.is_shutdown_in_progress() {
            eprintln!(
                "WARNING: LoggingHandle dropped without explicit shutdown(). \
                 Some logs may be lost. Call .shutdown() for graceful cleanup."
            )
        }
    }
}
