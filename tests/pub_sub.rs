use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use bytes::Bytes;
use tokio::time::timeout;

use orderhub::{Callback, Hub, HubConfig, HubError, HubState};

type Seen<T> = Arc<Mutex<Vec<T>>>;

fn collect<T, P>(
    seen: &Seen<T>,
    f: impl Fn(&P) -> T + Send + Sync + 'static,
) -> Callback<P>
where
    T: Send + 'static,
    P: 'static,
{
    let seen = seen.clone();
    Callback::infallible(move |p: &P| seen.lock().unwrap().push(f(p)))
}

/// Тест проверяет реальный сценарий использования: несколько топиков,
/// байтовые payload-ы, несколько подписчиков на топик и приоритеты.
#[tokio::test]
async fn test_real_world_usage_example() -> Result<(), Box<dyn std::error::Error>> {
    let hub: Arc<Hub<Bytes>> = Arc::new(Hub::new());
    let seen: Seen<String> = Seen::default();

    hub.subscribe(
        "user.notifications",
        collect(&seen, |b: &Bytes| {
            format!("user: {}", String::from_utf8_lossy(b))
        }),
    );
    hub.subscribe(
        "admin.audit",
        collect(&seen, |b: &Bytes| {
            format!("audit: {}", String::from_utf8_lossy(b))
        }),
    );
    hub.subscribe(
        "admin.audit",
        collect(&seen, |b: &Bytes| format!("audit-copy: {}", b.len())),
    );

    hub.start()?;

    hub.publish("user.notifications", Bytes::from("New message arrived"));
    hub.publish_with_priority("admin.audit", Bytes::from("Failed login"), -10);
    hub.publish("user.notifications", Bytes::from("Email verified"));
    hub.publish("nobody.listens", Bytes::from("dropped"));
    hub.join().await?;

    // audit опубликован с более высоким приоритетом и уходит первым,
    // оба его подписчика — подряд в порядке регистрации.
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "audit: Failed login".to_string(),
            "audit-copy: 12".to_string(),
            "user: New message arrived".to_string(),
            "user: Email verified".to_string(),
        ]
    );

    let stats = hub.stats();
    assert_eq!(stats.published, 4);
    assert_eq!(stats.dispatched, 4);
    assert_eq!(stats.deliveries, 4);
    assert_eq!(stats.outstanding, 0);

    hub.stop().await;
    assert_eq!(hub.state(), HubState::Stopped);
    Ok(())
}

/// Тест проверяет сценарий: `foo`/1 с приоритетом 5, затем `bar`/2 и
/// `foo`/3 с приоритетом 1. Ожидаемый порядок: B(2), A(3), A(1).
#[tokio::test]
async fn test_priority_scenario_across_topics() {
    let hub = Arc::new(Hub::new());
    let seen: Seen<(char, u32)> = Seen::default();
    hub.subscribe("foo", collect(&seen, |v: &u32| ('A', *v)));
    hub.subscribe("bar", collect(&seen, |v: &u32| ('B', *v)));

    hub.start().unwrap();
    // На current_thread runtime диспетчер не получит управление до первого
    // await, поэтому все три конверта окажутся в очереди одновременно.
    hub.publish_with_priority("foo", 1, 5);
    hub.publish_with_priority("bar", 2, 1);
    hub.publish_with_priority("foo", 3, 1);
    hub.join().await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![('B', 2), ('A', 3), ('A', 1)]);
    hub.stop().await;
}

/// Тест проверяет полноту рассылки: N подписчиков получают сообщение
/// ровно один раз и в порядке регистрации.
#[tokio::test]
async fn test_fan_out_completeness() {
    let hub = Arc::new(Hub::new());
    let seen: Seen<(usize, u32)> = Seen::default();
    for i in 0..10 {
        hub.subscribe("t", collect(&seen, move |v: &u32| (i, *v)));
    }

    hub.start().unwrap();
    hub.publish("t", 7);
    hub.join().await.unwrap();

    let expected: Vec<_> = (0..10).map(|i| (i, 7)).collect();
    assert_eq!(*seen.lock().unwrap(), expected);
    hub.stop().await;
}

/// Тест проверяет идемпотентность уникальной подписки: одна регистрация
/// и один вызов на сообщение.
#[tokio::test]
async fn test_unique_subscription_idempotence() {
    let hub = Arc::new(Hub::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let cb = Callback::infallible(move |_: &u32| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    hub.subscribe_unique("t", cb.clone());
    hub.subscribe_unique("t", cb.clone());
    assert_eq!(hub.subscriber_count("t"), 1);

    hub.start().unwrap();
    hub.publish("t", 1);
    hub.publish("t", 2);
    hub.join().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    hub.stop().await;
}

/// Тест проверяет, что отписка прекращает доставку, а остальные
/// подписчики продолжают получать сообщения.
#[tokio::test]
async fn test_unsubscribe_behavior() {
    let hub = Arc::new(Hub::new());
    let seen: Seen<(&'static str, u32)> = Seen::default();
    let a = collect(&seen, |v: &u32| ("a", *v));
    let b = collect(&seen, |v: &u32| ("b", *v));
    hub.subscribe("t", a.clone());
    hub.subscribe("t", b.clone());

    hub.start().unwrap();
    hub.publish("t", 1);
    hub.join().await.unwrap();

    assert_eq!(hub.unsubscribe("t", &a), 1);
    assert_eq!(hub.unsubscribe("t", &a), 0);
    hub.publish("t", 2);
    hub.join().await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![("a", 1), ("b", 1), ("b", 2)]);
    hub.stop().await;
}

/// Тест проверяет изоляцию сбоев: подписчик, падающий на сообщении M,
/// не мешает другим получить M и не мешает доставке M+1.
#[tokio::test]
async fn test_failure_isolation() {
    let hub = Arc::new(Hub::new());
    let seen: Seen<u32> = Seen::default();
    hub.subscribe(
        "t",
        Callback::new(|v: &u32| match v {
            1 => Err("cannot handle 1".into()),
            _ => Ok(()),
        }),
    );
    hub.subscribe(
        "t",
        Callback::infallible(|v: &u32| assert_ne!(*v, 2, "cannot handle 2")),
    );
    hub.subscribe("t", collect(&seen, |v: &u32| *v));

    hub.start().unwrap();
    for v in 1..=3 {
        hub.publish("t", v);
    }
    hub.join().await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(hub.stats().subscriber_failures, 2);
    hub.stop().await;
}

/// Тест проверяет, что `join` дожидается всего опубликованного до вызова,
/// даже если параллельно идут новые публикации.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_join_drains_outstanding_under_concurrent_publish() {
    let hub = Arc::new(Hub::new());
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = delivered.clone();
    hub.subscribe(
        "t",
        Callback::infallible(move |v: &u64| sink.lock().unwrap().push(*v)),
    );
    hub.start().unwrap();

    for i in 0..500u64 {
        hub.publish("t", i);
    }

    let publisher = {
        let hub = hub.clone();
        tokio::spawn(async move {
            for i in 500..2000u64 {
                hub.publish_with_priority("t", i, -1);
                if i % 100 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };

    timeout(Duration::from_secs(10), hub.join())
        .await
        .expect("join timed out")
        .unwrap();

    // Всё, что было опубликовано до join, уже доставлено.
    {
        let delivered = delivered.lock().unwrap();
        for v in 0..500u64 {
            assert!(delivered.contains(&v), "payload {v} not delivered");
        }
    }

    publisher.await.unwrap();
    hub.join().await.unwrap();
    assert_eq!(hub.outstanding(), 0);
    assert_eq!(hub.queue_len(), 0);
    assert_eq!(delivered.lock().unwrap().len(), 2000);
    hub.stop().await;
}

/// Тест проверяет, что после `stop` обработчики больше не вызываются и
/// очередь сохраняет неразосланные конверты.
#[tokio::test]
async fn test_stop_is_graceful_and_final() {
    let hub = Arc::new(Hub::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    hub.subscribe(
        "t",
        Callback::infallible(move |_: &u32| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    hub.start().unwrap();
    hub.publish("t", 1);
    hub.join().await.unwrap();
    hub.stop().await;

    hub.publish("t", 2);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(hub.queue_len(), 1);
    assert!(matches!(
        hub.join().await,
        Err(HubError::NotRunning { pending: 1 })
    ));
    assert!(matches!(hub.start(), Err(HubError::Stopped)));
}

/// Тест проверяет, что `join`, ожидающий на работающем хабе, завершается
/// ошибкой, если хаб останавливают во время ожидания.
#[tokio::test]
async fn test_stop_wakes_pending_join() {
    let hub = Arc::new(Hub::new());
    hub.subscribe("slow", Callback::infallible(|_: &u32| {}));

    // Диспетчер запускается и сразу останавливается: часть конвертов
    // (или все) остаётся в очереди.
    for v in 0..3 {
        hub.publish("slow", v);
    }
    hub.start().unwrap();

    let joiner = {
        let hub = hub.clone();
        tokio::spawn(async move { hub.join().await })
    };
    hub.stop().await;

    let res = timeout(Duration::from_secs(1), joiner)
        .await
        .expect("join must wake up on stop")
        .unwrap();
    match res {
        Ok(()) => assert_eq!(hub.outstanding(), 0),
        Err(HubError::NotRunning { pending }) => assert_eq!(pending, hub.outstanding()),
        Err(e) => panic!("unexpected error: {e}"),
    }
}

/// Тест проверяет хаб с настройками из конфигурации.
#[tokio::test]
async fn test_hub_with_config() {
    let hub = Arc::new(Hub::with_config(HubConfig {
        name: "configured".into(),
        default_priority: 100,
    }));
    let seen: Seen<&'static str> = Seen::default();
    hub.subscribe("t", collect(&seen, |v: &&'static str| *v));

    hub.publish("t", "default");
    hub.publish_with_priority("t", "urgent", 0);

    hub.start().unwrap();
    hub.join().await.unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["urgent", "default"]);
    assert_eq!(hub.config().name, "configured");
    hub.stop().await;
}
