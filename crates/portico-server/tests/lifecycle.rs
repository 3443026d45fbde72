//! Lifecycle integration tests: start/stop races, hook ordering and
//! teardown guarantees.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use portico_server::{
    Database, DatabaseResult, Server, ServerConfig, ServerError, ServerState, Transaction,
};
use tokio::task::JoinHandle;

fn ephemeral() -> Server {
    Server::builder()
        .config(ServerConfig::builder().port(0).build())
        .build()
}

async fn wait_ready(server: &Server) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !server.is_ready() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("server became ready");
}

fn spawn_start(server: &Server) -> JoinHandle<Result<(), ServerError>> {
    let server = server.clone();
    tokio::spawn(async move { server.start().await })
}

fn counting_hook(
    counter: &Arc<AtomicUsize>,
) -> impl Fn(Server) -> futures_util::future::Ready<portico_server::LifecycleResult> + Send + Sync + 'static
{
    let counter = Arc::clone(counter);
    move |_server| {
        counter.fetch_add(1, Ordering::SeqCst);
        futures_util::future::ready(Ok(()))
    }
}

struct TrackedDb {
    closed: Arc<AtomicUsize>,
}

struct NoopTx;

#[async_trait]
impl Transaction for NoopTx {
    async fn commit(self: Box<Self>) -> DatabaseResult {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DatabaseResult {
        Ok(())
    }
}

#[async_trait]
impl Database for TrackedDb {
    fn name(&self) -> &str {
        "tracked"
    }

    async fn close(&self) -> DatabaseResult {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn begin(&self) -> DatabaseResult<Box<dyn Transaction>> {
        Ok(Box::new(NoopTx))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_start_has_exactly_one_winner() {
    let server = ephemeral();

    let first = spawn_start(&server);
    let second = spawn_start(&server);
    wait_ready(&server).await;

    server.stop().await;

    let results = [first.await.unwrap(), second.await.unwrap()];
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(ServerError::AlreadyRunning)))
        .count();
    let served = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(rejected, 1);
    assert_eq!(served, 1);
}

#[tokio::test]
async fn stopped_server_cannot_restart() {
    let server = ephemeral();
    let handle = spawn_start(&server);
    wait_ready(&server).await;

    server.stop().await;
    handle.await.unwrap().unwrap();

    assert_eq!(server.state(), ServerState::Stopped);
    assert!(matches!(server.start().await, Err(ServerError::AlreadyStopped)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_stop_runs_shutdown_hooks_once() {
    let server = ephemeral();
    let shutdowns = Arc::new(AtomicUsize::new(0));
    server.register_shutdown_hook(counting_hook(&shutdowns));

    let handle = spawn_start(&server);
    wait_ready(&server).await;

    let (a, b) = (server.clone(), server.clone());
    tokio::join!(a.stop(), b.stop(), server.stop());
    handle.await.unwrap().unwrap();

    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn startup_hooks_run_in_order_once_ready() {
    let server = ephemeral();
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

    for name in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        server.register_startup_hook_named(name, move |server| {
            order.lock().push((name, server.is_ready()));
            async { Ok(()) }
        });
    }

    let handle = spawn_start(&server);
    tokio::time::timeout(Duration::from_secs(5), async {
        while order.lock().len() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("startup hooks ran");

    assert_eq!(
        *order.lock(),
        [("first", true), ("second", true), ("third", true)]
    );

    server.stop().await;
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn startup_hook_registered_after_ready_never_runs() {
    let server = ephemeral();
    let handle = spawn_start(&server);
    wait_ready(&server).await;

    let late = Arc::new(AtomicUsize::new(0));
    server.register_startup_hook(counting_hook(&late));
    tokio::time::sleep(Duration::from_millis(50)).await;

    server.stop().await;
    handle.await.unwrap().unwrap();
    assert_eq!(late.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failing_startup_hook_does_not_stop_the_rest() {
    let server = ephemeral();
    let after = Arc::new(AtomicUsize::new(0));

    server.register_startup_hook(|_| async {
        Err(portico_server::LifecycleError::new("warmup failed"))
    });
    server.register_startup_hook(counting_hook(&after));

    let handle = spawn_start(&server);
    tokio::time::timeout(Duration::from_secs(5), async {
        while after.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("second startup hook ran");

    assert!(server.is_ready());
    server.stop().await;
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn bind_failure_runs_shutdown_hooks() {
    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    let closed = Arc::new(AtomicUsize::new(0));
    let server = Server::builder()
        .config(ServerConfig::builder().port(port).build())
        .database(TrackedDb {
            closed: Arc::clone(&closed),
        })
        .build();

    let startups = Arc::new(AtomicUsize::new(0));
    let shutdowns = Arc::new(AtomicUsize::new(0));
    server.register_startup_hook(counting_hook(&startups));
    server.register_shutdown_hook(counting_hook(&shutdowns));

    let err = server.start().await.unwrap_err();
    assert!(matches!(err, ServerError::Bind { .. }), "{err:?}");
    assert_eq!(server.state(), ServerState::Stopped);
    assert_eq!(startups.load(Ordering::SeqCst), 0);
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);

    drop(occupied);
}

#[tokio::test]
async fn unresolvable_host_is_invalid_address() {
    let server = Server::builder()
        .config(ServerConfig::builder().host("not a host").port(0).build())
        .build();

    let err = server.start().await.unwrap_err();
    assert!(matches!(err, ServerError::InvalidAddress { .. }), "{err:?}");
}

#[tokio::test]
async fn database_is_closed_after_shutdown_hooks() {
    let closed = Arc::new(AtomicUsize::new(0));
    let server = Server::builder()
        .config(ServerConfig::builder().port(0).build())
        .database(TrackedDb {
            closed: Arc::clone(&closed),
        })
        .build();

    let seen_open = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&seen_open);
    server.register_shutdown_hook(move |server| {
        if server.db().is_ok() {
            probe.fetch_add(1, Ordering::SeqCst);
        }
        async { Ok(()) }
    });

    let handle = spawn_start(&server);
    wait_ready(&server).await;
    server.stop().await;
    handle.await.unwrap().unwrap();

    assert_eq!(seen_open.load(Ordering::SeqCst), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert!(matches!(server.db(), Err(ServerError::NoDatabase)));
}

#[tokio::test]
async fn stop_waits_for_shutdown_hooks() {
    let server = ephemeral();
    let finished = Arc::new(AtomicUsize::new(0));
    let flag = Arc::clone(&finished);
    server.register_shutdown_hook(move |_| {
        let flag = Arc::clone(&flag);
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });

    let handle = spawn_start(&server);
    wait_ready(&server).await;
    server.stop().await;

    assert_eq!(finished.load(Ordering::SeqCst), 1);
    handle.await.unwrap().unwrap();
}
