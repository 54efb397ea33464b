use std::sync::Arc;
use std::time::Duration;

use keystone_gateway_lib::scripting::{LuaPool, PoolError};
use tokio::time::timeout;

#[tokio::test]
async fn creates_lazily_and_reuses_released_instances() {
    let pool = LuaPool::new(4);
    assert_eq!(pool.created(), 0);

    let (lua, permit) = pool.acquire().await.expect("acquire");
    assert_eq!(pool.created(), 1);

    pool.release(lua, permit);
    assert_eq!(pool.created(), 1);

    // The idle instance is reused, not recreated.
    let (lua, permit) = pool.acquire().await.expect("acquire");
    assert_eq!(pool.created(), 1);
    pool.release(lua, permit);
}

#[tokio::test]
async fn blocks_at_capacity_until_release() {
    let pool = Arc::new(LuaPool::new(2));

    let a = pool.acquire().await.expect("acquire");
    let b = pool.acquire().await.expect("acquire");
    assert_eq!(pool.created(), 2);

    // Saturated: the third acquire must wait.
    assert!(timeout(Duration::from_millis(50), pool.acquire()).await.is_err());
    assert_eq!(pool.created(), 2);

    let waiter = tokio::spawn({
        let pool = Arc::clone(&pool);
        async move {
            let (lua, permit) = pool.acquire().await.expect("acquire after release");
            pool.release(lua, permit);
        }
    });

    let (lua, permit) = a;
    pool.release(lua, permit);
    timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter finished")
        .expect("waiter task");

    assert_eq!(pool.created(), 2);
    let (lua, permit) = b;
    pool.release(lua, permit);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn capacity_holds_under_concurrent_load() {
    let pool = Arc::new(LuaPool::new(3));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                for _ in 0..20 {
                    let (lua, permit) = pool.acquire().await.expect("acquire");
                    assert!(pool.created() <= 3);
                    tokio::task::yield_now().await;
                    pool.release(lua, permit);
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.expect("task");
    }

    assert!(pool.created() <= 3);
}

#[tokio::test]
async fn discard_frees_the_slot() {
    let pool = LuaPool::new(1);

    let (lua, permit) = pool.acquire().await.expect("acquire");
    pool.discard(lua, permit);
    assert_eq!(pool.created(), 0);

    // The slot is available again.
    let (lua, permit) = pool.acquire().await.expect("acquire");
    assert_eq!(pool.created(), 1);
    pool.release(lua, permit);
}

#[tokio::test]
async fn close_destroys_idle_and_fails_acquire() {
    let pool = LuaPool::new(2);

    let (lua, permit) = pool.acquire().await.expect("acquire");
    let (in_flight, in_flight_permit) = pool.acquire().await.expect("acquire");
    pool.release(lua, permit);
    assert_eq!(pool.created(), 2);

    pool.close();
    // Idle instance destroyed immediately.
    assert_eq!(pool.created(), 1);

    assert!(matches!(pool.acquire().await, Err(PoolError::Closed)));

    // The in-flight instance dies on release.
    pool.release(in_flight, in_flight_permit);
    assert_eq!(pool.created(), 0);
}
