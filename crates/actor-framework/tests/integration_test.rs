use actor_framework::{FrameworkError, KeyedActor, KeyedResource};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

// --- Test Resource ---

/// A counter whose value lives in an "external" map.
///
/// `Increment` deliberately reads, yields, then writes back, which loses updates unless
/// the framework serializes commands per key.
struct Tally;

#[derive(Debug)]
enum TallyCommand {
    Increment,
    Slow(Duration),
    Read,
}

#[derive(Debug, thiserror::Error)]
enum TallyError {
    #[error(transparent)]
    Framework(#[from] FrameworkError),
}

type TallyStore = Arc<Mutex<HashMap<u32, u64>>>;

#[async_trait]
impl KeyedResource for Tally {
    type Id = u32;
    type Command = TallyCommand;
    type Reply = u64;
    type Context = TallyStore;
    type Error = TallyError;

    async fn handle(id: &u32, command: TallyCommand, store: &TallyStore) -> Result<u64, TallyError> {
        match command {
            TallyCommand::Increment => {
                let current = store.lock().await.get(id).copied().unwrap_or(0);
                tokio::task::yield_now().await;
                store.lock().await.insert(*id, current + 1);
                Ok(current + 1)
            }
            TallyCommand::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(store.lock().await.get(id).copied().unwrap_or(0))
            }
            TallyCommand::Read => Ok(store.lock().await.get(id).copied().unwrap_or(0)),
        }
    }
}

// --- Tests ---

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_commands_per_key_do_not_lose_updates() {
    let store: TallyStore = Arc::new(Mutex::new(HashMap::new()));
    let (actor, client) = KeyedActor::<Tally>::new(64);
    let handle = tokio::spawn(actor.run(store.clone()));

    let mut tasks = Vec::new();
    for i in 0..90u32 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            client.send(i % 3, TallyCommand::Increment).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    for key in 0..3 {
        assert_eq!(client.send(key, TallyCommand::Read).await.unwrap(), 30);
    }

    drop(client);
    handle.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_key_does_not_block_other_keys() {
    let store: TallyStore = Arc::new(Mutex::new(HashMap::new()));
    let (actor, client) = KeyedActor::<Tally>::new(16);
    tokio::spawn(actor.run(store));

    let slow_client = client.clone();
    let slow = tokio::spawn(async move {
        slow_client
            .send(1, TallyCommand::Slow(Duration::from_millis(500)))
            .await
    });
    // Let the slow command reach its worker.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let fast = tokio::time::timeout(
        Duration::from_millis(200),
        client.send(2, TallyCommand::Increment),
    )
    .await;
    assert!(fast.is_ok(), "key 2 waited on key 1");
    assert_eq!(fast.unwrap().unwrap(), 1);

    slow.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_drains_queued_commands() {
    let store: TallyStore = Arc::new(Mutex::new(HashMap::new()));
    let (actor, client) = KeyedActor::<Tally>::new(16);
    let handle = tokio::spawn(actor.run(store.clone()));

    let queued: Vec<_> = (0..5)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.send(7, TallyCommand::Increment).await })
        })
        .collect();
    for task in queued {
        task.await.unwrap().unwrap();
    }

    drop(client);
    handle.await.unwrap();
    assert_eq!(store.lock().await.get(&7).copied(), Some(5));
}

#[tokio::test]
async fn test_send_after_shutdown_reports_closed() {
    let store: TallyStore = Arc::new(Mutex::new(HashMap::new()));
    let (actor, client) = KeyedActor::<Tally>::new(4);
    let handle = tokio::spawn(actor.run(store));
    handle.abort();
    let _ = handle.await;

    let result = client.send(1, TallyCommand::Read).await;
    assert!(matches!(
        result,
        Err(TallyError::Framework(FrameworkError::ActorClosed))
    ));
    assert!(client.is_closed());
}
