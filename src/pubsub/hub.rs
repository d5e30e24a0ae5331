use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

use parking_lot::Mutex;
use tokio::{sync::watch, task::JoinHandle};
use tracing::Instrument;

use super::{Callback, Envelope, OrderedQueue, Priority, Subscription, SubscriptionRegistry};
use crate::{
    config::HubConfig,
    error::{HubError, HubResult, SubscriberError, SubscriberFailure},
};

/// Состояние жизненного цикла хаба.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubState {
    /// Хаб создан, диспетчер ещё не запущен.
    Created,
    /// Диспетчер разбирает очередь.
    Running,
    /// Хаб остановлен, доставка больше не происходит.
    Stopped,
}

#[derive(Debug, Default)]
struct HubMetrics {
    published: AtomicU64,
    dispatched: AtomicU64,
    deliveries: AtomicU64,
    subscriber_failures: AtomicU64,
}

/// Снимок статистики хаба.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    /// Количество вызовов `publish`.
    pub published: u64,
    /// Количество конвертов, рассылка которых завершена.
    pub dispatched: u64,
    /// Количество успешных вызовов обработчиков.
    pub deliveries: u64,
    /// Количество сбоев обработчиков (ошибка или паника).
    pub subscriber_failures: u64,
    /// Конвертов в очереди.
    pub queued: usize,
    /// Конвертов в очереди плюс обрабатываемые прямо сейчас.
    pub outstanding: usize,
}

/// Внутрипроцессный pub/sub хаб с приоритетной доставкой.
///
/// Гарантии:
/// - Конверты рассылаются строго по возрастанию `(priority, sequence)`,
///   где `sequence` — глобальный порядок публикации, независимо от топика.
/// - Обработчики топика вызываются в порядке регистрации.
/// - Сбой одного обработчика не мешает остальным и следующим конвертам.
///
/// Обработчики вызываются синхронно в задаче диспетчера, поэтому медленный
/// обработчик задерживает все последующие конверты. Блокирующую работу
/// стоит передавать в отдельную задачу.
///
/// Диспетчер держит только `Weak` на хаб: если последний `Arc` удалён
/// без [`Hub::stop`], задача диспетчера завершается сама. Конверты,
/// оставшиеся в очереди, при этом не доставляются.
pub struct Hub<P> {
    config: HubConfig,
    queue: Arc<OrderedQueue<P>>,
    registry: SubscriptionRegistry<P>,
    state: watch::Sender<HubState>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    metrics: HubMetrics,
}

impl<P> Hub<P>
where
    P: Send + Sync + 'static,
{
    /// Создаёт хаб с настройками по умолчанию.
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Создаёт хаб с заданными настройками. Диспетчер не запускается.
    pub fn with_config(config: HubConfig) -> Self {
        let (state, _) = watch::channel(HubState::Created);
        Self {
            config,
            queue: Arc::new(OrderedQueue::new()),
            registry: SubscriptionRegistry::new(),
            state,
            dispatcher: Mutex::new(None),
            metrics: HubMetrics::default(),
        }
    }

    /// Создаёт хаб с настройками из окружения (`ORDERHUB_*`).
    pub fn from_env() -> HubResult<Self> {
        Ok(Self::with_config(HubConfig::load()?))
    }

    /// Подписывает обработчик на топик. Повторная подписка того же
    /// обработчика добавит ещё одну регистрацию.
    pub fn subscribe(
        &self,
        topic: &str,
        callback: Callback<P>,
    ) -> Subscription<P> {
        tracing::trace!(topic, "subscribe");
        self.registry.subscribe(topic, callback, false)
    }

    /// Подписывает обработчик на топик не более одного раза.
    ///
    /// Если пара `(topic, callback)` уже зарегистрирована, возвращает
    /// существующую регистрацию.
    pub fn subscribe_unique(
        &self,
        topic: &str,
        callback: Callback<P>,
    ) -> Subscription<P> {
        tracing::trace!(topic, "subscribe unique");
        self.registry.subscribe(topic, callback, true)
    }

    /// Снимает все регистрации обработчика на топике. Конверт, который
    /// уже рассылается, ещё дойдёт до этого обработчика.
    pub fn unsubscribe(
        &self,
        topic: &str,
        callback: &Callback<P>,
    ) -> usize {
        self.registry.unsubscribe(topic, callback)
    }

    /// Публикует сообщение с приоритетом по умолчанию из настроек.
    pub fn publish(
        &self,
        topic: &str,
        payload: P,
    ) -> u64 {
        self.publish_with_priority(topic, payload, self.config.default_priority)
    }

    /// Публикует сообщение и сразу возвращает его порядковый номер.
    ///
    /// Публикация в топик без подписчиков не ошибка: конверт будет
    /// разослан пустому списку и отмечен обработанным.
    pub fn publish_with_priority(
        &self,
        topic: &str,
        payload: P,
        priority: Priority,
    ) -> u64 {
        let topic = self.registry.intern(topic);
        let sequence = self.queue.push(priority, topic, payload);
        self.metrics.published.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(sequence, priority, "published");
        sequence
    }

    /// Запускает диспетчер в отдельной задаче tokio.
    ///
    /// Повторный вызов на работающем хабе ничего не делает. Остановленный
    /// хаб запустить нельзя: возвращается [`HubError::Stopped`].
    pub fn start(self: &Arc<Self>) -> HubResult<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| HubError::NoRuntime)?;

        // Держим слот диспетчера, пока не сохраним handle, чтобы
        // параллельный `stop` его не пропустил.
        let mut slot = self.dispatcher.lock();

        let mut outcome = Ok(false);
        self.state.send_if_modified(|state| match *state {
            HubState::Created => {
                *state = HubState::Running;
                outcome = Ok(true);
                true
            }
            HubState::Running => false,
            HubState::Stopped => {
                outcome = Err(HubError::Stopped);
                false
            }
        });

        if !outcome? {
            tracing::debug!(hub = %self.config.name, "start ignored: already running");
            return Ok(());
        }

        let hub = Arc::downgrade(self);
        let queue = Arc::clone(&self.queue);
        let shutdown = self.state.subscribe();
        let span = tracing::info_span!("dispatcher", hub = %self.config.name);
        let task = dispatch_loop(hub, queue, shutdown).instrument(span);
        *slot = Some(runtime.spawn(task));
        tracing::debug!(hub = %self.config.name, "hub started");
        Ok(())
    }

    /// Останавливает диспетчер.
    ///
    /// Конверт, рассылка которого уже началась, доставляется всем
    /// обработчикам; после возврата из `stop` обработчики больше не
    /// вызываются. Неразосланные конверты остаются в очереди. Повторный
    /// вызов ничего не делает.
    pub async fn stop(&self) {
        let previous = self.state.send_replace(HubState::Stopped);
        self.queue.wake_joiners();

        let task = self.dispatcher.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(hub = %self.config.name, error = %e, "dispatcher task failed");
            }
        }

        if previous != HubState::Stopped {
            tracing::debug!(
                hub = %self.config.name,
                ?previous,
                queued = self.queue.len(),
                "hub stopped"
            );
        }
    }

    /// Ждёт, пока будут разосланы все конверты, опубликованные до вызова.
    ///
    /// Конверт считается обработанным, когда вернулись все его
    /// обработчики. Конверты, опубликованные во время ожидания, его не
    /// продлевают. Если ждать нечего, возвращает `Ok(())` в любом
    /// состоянии. Если же хаб не запущен или останавливается во время
    /// ожидания, возвращает [`HubError::NotRunning`] вместо вечного ожидания.
    pub async fn join(&self) -> HubResult<()> {
        let horizon = self.queue.horizon();
        loop {
            let notified = self.queue.drained().notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.queue.has_pending_before(horizon) {
                return Ok(());
            }
            if self.state() != HubState::Running {
                return match self.queue.pending_before(horizon) {
                    0 => Ok(()),
                    pending => Err(HubError::NotRunning { pending }),
                };
            }
            notified.await;
        }
    }

    /// Текущее состояние жизненного цикла.
    pub fn state(&self) -> HubState {
        *self.state.borrow()
    }

    /// Настройки, с которыми создан хаб.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Количество конвертов, ожидающих рассылки.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Количество конвертов, ожидающих рассылки или рассылаемых сейчас.
    pub fn outstanding(&self) -> usize {
        self.queue.unfinished()
    }

    /// Количество регистраций на топике.
    pub fn subscriber_count(
        &self,
        topic: &str,
    ) -> usize {
        self.registry.subscriber_count(topic)
    }

    /// Снимок счётчиков хаба.
    pub fn stats(&self) -> HubStats {
        HubStats {
            published: self.metrics.published.load(Ordering::Relaxed),
            dispatched: self.metrics.dispatched.load(Ordering::Relaxed),
            deliveries: self.metrics.deliveries.load(Ordering::Relaxed),
            subscriber_failures: self.metrics.subscriber_failures.load(Ordering::Relaxed),
            queued: self.queue.len(),
            outstanding: self.queue.unfinished(),
        }
    }

    /// Рассылает один конверт всем обработчикам его топика и отмечает его
    /// обработанным.
    fn dispatch(
        &self,
        envelope: Envelope<P>,
    ) {
        let subscribers = self.registry.subscribers_for(envelope.topic());
        tracing::debug!(
            topic = %envelope.topic(),
            sequence = envelope.sequence(),
            priority = envelope.priority(),
            subscribers = subscribers.len(),
            "dispatching envelope"
        );

        for callback in &subscribers {
            match invoke(callback, envelope.payload()) {
                Ok(()) => {
                    self.metrics.deliveries.fetch_add(1, Ordering::Relaxed);
                }
                Err(failure) => {
                    self.metrics
                        .subscriber_failures
                        .fetch_add(1, Ordering::Relaxed);
                    let err = SubscriberError {
                        topic: envelope.topic().to_string(),
                        sequence: envelope.sequence(),
                        failure,
                    };
                    tracing::warn!(error = %err, "subscriber failed");
                }
            }
        }

        self.metrics.dispatched.fetch_add(1, Ordering::Relaxed);
        self.queue.task_done(envelope.sequence());
    }
}

impl<P> Drop for Hub<P> {
    fn drop(&mut self) {
        if *self.state.borrow() == HubState::Running {
            tracing::debug!(
                hub = %self.config.name,
                queued = self.queue.len(),
                "hub dropped without stop, dispatcher will exit"
            );
        }
    }
}

impl<P> Default for Hub<P>
where
    P: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Цикл диспетчера. Ждёт конверт в очереди и рассылает его, пока хаб
/// запущен и жив. Удаление хаба закрывает `watch`-канал, поэтому
/// ожидание в `pop` прерывается.
async fn dispatch_loop<P>(
    hub: Weak<Hub<P>>,
    queue: Arc<OrderedQueue<P>>,
    mut shutdown: watch::Receiver<HubState>,
) where
    P: Send + Sync + 'static,
{
    tracing::info!("dispatcher started");
    loop {
        if *shutdown.borrow_and_update() != HubState::Running {
            break;
        }

        let envelope = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            envelope = queue.pop() => envelope,
        };

        let Some(live) = hub.upgrade() else {
            break;
        };
        live.dispatch(envelope);
        drop(live);

        tokio::task::consume_budget().await;
    }
    tracing::info!(queued = queue.len(), "dispatcher stopped");
}

fn invoke<P>(
    callback: &Callback<P>,
    payload: &P,
) -> Result<(), SubscriberFailure> {
    match panic::catch_unwind(AssertUnwindSafe(|| callback.call(payload))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(SubscriberFailure::Returned(e.to_string())),
        Err(panic) => Err(SubscriberFailure::Panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
