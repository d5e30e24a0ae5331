use std::{fmt, sync::Arc};

use dashmap::DashMap;

/// Ошибка, которую может вернуть обработчик подписчика.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Результат вызова обработчика.
pub type CallbackResult = Result<(), BoxError>;

type CallbackFn<P> = dyn Fn(&P) -> CallbackResult + Send + Sync;

/// Разделяемая ссылка на обработчик сообщений.
///
/// Два `Callback` равны тогда и только тогда, когда указывают на одно и то
/// же замыкание: клоны одного `Callback` равны, а два отдельно созданных
/// обработчика с одинаковым кодом — нет.
pub struct Callback<P> {
    inner: Arc<CallbackFn<P>>,
}

impl<P> Callback<P> {
    /// Оборачивает обработчик, который может завершиться ошибкой.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&P) -> CallbackResult + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Оборачивает обработчик без ошибок.
    pub fn infallible<F>(f: F) -> Self
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        Self::new(move |payload: &P| {
            f(payload);
            Ok(())
        })
    }

    pub fn call(
        &self,
        payload: &P,
    ) -> CallbackResult {
        (self.inner)(payload)
    }

    /// Сравнение по идентичности замыкания.
    pub fn ptr_eq(
        &self,
        other: &Self,
    ) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
    }
}

impl<P> Clone for Callback<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> PartialEq for Callback<P> {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.ptr_eq(other)
    }
}

impl<P> Eq for Callback<P> {}

impl<P> fmt::Debug for Callback<P> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Callback({:p})", Arc::as_ptr(&self.inner) as *const ())
    }
}

/// Регистрация обработчика на топик.
pub struct Subscription<P> {
    /// Топик, на который оформлена подписка.
    pub topic: Arc<str>,
    /// Обработчик сообщений.
    pub callback: Callback<P>,
    /// Была ли подписка оформлена как уникальная.
    pub unique: bool,
}

impl<P> Clone for Subscription<P> {
    fn clone(&self) -> Self {
        Self {
            topic: self.topic.clone(),
            callback: self.callback.clone(),
            unique: self.unique,
        }
    }
}

impl<P> fmt::Debug for Subscription<P> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("callback", &self.callback)
            .field("unique", &self.unique)
            .finish()
    }
}

/// Реестр подписок: топик → упорядоченный список обработчиков.
///
/// Порядок регистрации внутри топика сохраняется всегда: именно в нём
/// происходит рассылка.
pub struct SubscriptionRegistry<P> {
    topics: DashMap<Arc<str>, Vec<Subscription<P>>>,
}

impl<P> SubscriptionRegistry<P> {
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
        }
    }

    /// Добавляет обработчик в конец списка топика.
    ///
    /// Повтор не добавляется, если новая подписка уникальная или если та же
    /// пара `(topic, callback)` уже зарегистрирована как уникальная. В этом
    /// случае возвращается существующая регистрация.
    pub fn subscribe(
        &self,
        topic: &str,
        callback: Callback<P>,
        unique: bool,
    ) -> Subscription<P> {
        let mut entry = self.topics.entry(Arc::from(topic)).or_default();
        let topic = entry.key().clone();

        if let Some(existing) = entry
            .value()
            .iter()
            .find(|s| s.callback == callback && (unique || s.unique))
        {
            tracing::trace!(topic = %topic, "duplicate unique subscription ignored");
            return existing.clone();
        }

        let subscription = Subscription {
            topic,
            callback,
            unique,
        };
        entry.value_mut().push(subscription.clone());
        subscription
    }

    /// Удаляет все регистрации данного обработчика на топике.
    ///
    /// Возвращает число удалённых регистраций. Пустой топик удаляется.
    pub fn unsubscribe(
        &self,
        topic: &str,
        callback: &Callback<P>,
    ) -> usize {
        let removed = match self.topics.get_mut(topic) {
            Some(mut subs) => {
                let before = subs.len();
                subs.retain(|s| s.callback != *callback);
                before - subs.len()
            }
            None => 0,
        };

        if removed > 0 {
            self.topics.remove_if(topic, |_, subs| subs.is_empty());
        }
        removed
    }

    /// Снимок обработчиков топика в порядке регистрации.
    ///
    /// Блокировка не удерживается после возврата, поэтому обработчики
    /// могут сами подписываться и публиковать.
    pub fn subscribers_for(
        &self,
        topic: &str,
    ) -> Vec<Callback<P>> {
        self.topics
            .get(topic)
            .map(|subs| subs.iter().map(|s| s.callback.clone()).collect())
            .unwrap_or_default()
    }

    /// Снимок регистраций топика в порядке регистрации.
    pub fn subscriptions(
        &self,
        topic: &str,
    ) -> Vec<Subscription<P>> {
        self.topics
            .get(topic)
            .map(|subs| subs.value().clone())
            .unwrap_or_default()
    }

    pub fn subscriber_count(
        &self,
        topic: &str,
    ) -> usize {
        self.topics.get(topic).map_or(0, |subs| subs.len())
    }

    /// Топики, на которые есть хотя бы одна подписка (порядок произвольный).
    pub fn topics(&self) -> Vec<Arc<str>> {
        self.topics.iter().map(|e| e.key().clone()).collect()
    }

    /// Возвращает `Arc<str>` для топика, переиспользуя ключ реестра, если
    /// топик уже известен.
    pub fn intern(
        &self,
        topic: &str,
    ) -> Arc<str> {
        match self.topics.get(topic) {
            Some(entry) => entry.key().clone(),
            None => Arc::from(topic),
        }
    }

    /// Общее количество регистраций по всем топикам.
    pub fn len(&self) -> usize {
        self.topics.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<P> Default for SubscriptionRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}
