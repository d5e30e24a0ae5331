use std::{cmp::Ordering, sync::Arc};

/// Приоритет сообщения. Меньшее значение доставляется раньше.
pub type Priority = i64;

/// Приоритет, который получает `publish` без явного приоритета.
///
/// Сообщение с приоритетом по умолчанию упорядочивается точно так же, как
/// сообщение с явным приоритетом `0`.
pub const DEFAULT_PRIORITY: Priority = 0;

/// Опубликованное сообщение вместе с приоритетом и порядковым номером.
///
/// Порядок между конвертами задаётся только парой `(priority, sequence)`;
/// топик и полезная нагрузка в сравнении не участвуют. Так как `sequence`
/// уникален в пределах очереди, два разных конверта никогда не равны.
#[derive(Debug, Clone)]
pub struct Envelope<P> {
    priority: Priority,
    sequence: u64,
    topic: Arc<str>,
    payload: P,
}

impl<P> Envelope<P> {
    pub(crate) fn new(
        priority: Priority,
        sequence: u64,
        topic: Arc<str>,
        payload: P,
    ) -> Self {
        Self {
            priority,
            sequence,
            topic,
            payload,
        }
    }

    /// Приоритет, с которым сообщение было опубликовано.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Порядковый номер публикации в пределах очереди.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Топик, в который опубликовано сообщение.
    pub fn topic(&self) -> &Arc<str> {
        &self.topic
    }

    /// Полезная нагрузка сообщения.
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Ключ сортировки `(priority, sequence)`.
    pub fn key(&self) -> (Priority, u64) {
        (self.priority, self.sequence)
    }

    /// Забирает полезную нагрузку, отбрасывая конверт.
    pub fn into_payload(self) -> P {
        self.payload
    }
}

impl<P> PartialEq for Envelope<P> {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.key() == other.key()
    }
}

impl<P> Eq for Envelope<P> {}

impl<P> PartialOrd for Envelope<P> {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P> Ord for Envelope<P> {
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        self.key().cmp(&other.key())
    }
}
