use std::{
    cmp::Reverse,
    collections::{BTreeSet, BinaryHeap},
    sync::Arc,
};

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{Envelope, Priority};

struct QueueState<P> {
    heap: BinaryHeap<Reverse<Envelope<P>>>,
    next_sequence: u64,
    /// Номера конвертов, которые ещё не помечены `task_done`:
    /// лежат в куче или уже извлечены, но обрабатываются.
    unfinished: BTreeSet<u64>,
}

/// Стабильная min-очередь конвертов по ключу `(priority, sequence)`.
///
/// - `push` никогда не блокируется, ёмкость не ограничена.
/// - `pop` приостанавливает задачу (без busy-wait), пока очередь пуста.
/// - Конверты с одинаковым приоритетом выходят в порядке вставки.
/// - `task_done` + `join` дают семантику "дождаться обработки всего, что
///   было в очереди на момент вызова".
///
/// Номер присваивается внутри той же критической секции, что и вставка
/// в кучу, поэтому порядок номеров совпадает с порядком вставки.
pub struct OrderedQueue<P> {
    state: Mutex<QueueState<P>>,
    /// Сигнал для `pop`: в очереди появился конверт.
    available: Notify,
    /// Сигнал для `join`: какой-то конверт обработан.
    drained: Notify,
}

impl<P> OrderedQueue<P> {
    /// Создаёт пустую очередь; нумерация начинается с `0`.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                next_sequence: 0,
                unfinished: BTreeSet::new(),
            }),
            available: Notify::new(),
            drained: Notify::new(),
        }
    }

    /// Кладёт сообщение в очередь и возвращает присвоенный номер.
    ///
    /// Номера начинаются с `0` и строго возрастают в пределах очереди.
    pub fn push(
        &self,
        priority: Priority,
        topic: Arc<str>,
        payload: P,
    ) -> u64 {
        let sequence = {
            let mut state = self.state.lock();
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state
                .heap
                .push(Reverse(Envelope::new(priority, sequence, topic, payload)));
            state.unfinished.insert(sequence);
            sequence
        };
        self.available.notify_one();
        sequence
    }

    /// Извлекает конверт с наименьшим `(priority, sequence)`, если он есть.
    pub fn try_pop(&self) -> Option<Envelope<P>> {
        self.state.lock().heap.pop().map(|Reverse(envelope)| envelope)
    }

    /// Ждёт появления конверта и извлекает наименьший.
    ///
    /// Future можно безопасно отменять: конверт удаляется из кучи только
    /// в момент готовности, без промежуточных точек ожидания.
    pub async fn pop(&self) -> Envelope<P> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(envelope) = self.try_pop() {
                return envelope;
            }
            notified.await;
        }
    }

    /// Помечает извлечённый конверт как полностью обработанный.
    ///
    /// Возвращает `false`, если номер неизвестен или уже был отмечен.
    pub fn task_done(
        &self,
        sequence: u64,
    ) -> bool {
        let removed = self.state.lock().unfinished.remove(&sequence);
        if removed {
            self.drained.notify_waiters();
        }
        removed
    }

    /// Ждёт, пока будут обработаны все конверты, помещённые в очередь до
    /// вызова. Конверты, добавленные позже, ожидание не продлевают.
    pub async fn join(&self) {
        let horizon = self.horizon();
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.has_pending_before(horizon) {
                return;
            }
            notified.await;
        }
    }

    /// Номер, который получит следующий `push`.
    pub fn horizon(&self) -> u64 {
        self.state.lock().next_sequence
    }

    /// Есть ли незавершённый конверт с номером меньше `horizon`.
    ///
    /// Смотрит только на наименьший номер, поэтому не зависит от длины
    /// очереди.
    pub fn has_pending_before(
        &self,
        horizon: u64,
    ) -> bool {
        self.state
            .lock()
            .unfinished
            .first()
            .is_some_and(|sequence| *sequence < horizon)
    }

    /// Количество незавершённых конвертов с номером меньше `horizon`.
    pub fn pending_before(
        &self,
        horizon: u64,
    ) -> usize {
        self.state.lock().unfinished.range(..horizon).count()
    }

    /// Количество конвертов, ещё лежащих в куче.
    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    /// Пуста ли куча. Извлечённые, но не обработанные конверты не
    /// учитываются.
    pub fn is_empty(&self) -> bool {
        self.state.lock().heap.is_empty()
    }

    /// Количество конвертов в куче плюс обрабатываемые прямо сейчас.
    pub fn unfinished(&self) -> usize {
        self.state.lock().unfinished.len()
    }

    pub(crate) fn drained(&self) -> &Notify {
        &self.drained
    }

    /// Будит всех, кто ждёт в `join`, чтобы они перепроверили условие.
    pub(crate) fn wake_joiners(&self) {
        self.drained.notify_waiters();
    }
}

impl<P> Default for OrderedQueue<P> {
    fn default() -> Self {
        Self::new()
    }
}
