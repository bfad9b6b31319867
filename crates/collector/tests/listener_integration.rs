//! End-to-end tests over real TCP connections.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use classifier::{Category, Classifier};
use collector::MAX_FRAME_BYTES;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use usage_store::{
    InMemoryUsageStore, ModuleIdentity, ModuleUsage, RawEvent, RawEventStream, UsageQuery,
    UsageStore, UsageStoreError, UsageStoreExt,
};

struct TestServer<S = InMemoryUsageStore> {
    addr: SocketAddr,
    store: Arc<S>,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        Self::with_store(InMemoryUsageStore::new()).await
    }
}

impl<S: UsageStore + 'static> TestServer<S> {
    async fn with_store(store: S) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let store = Arc::new(store);
        let (stop, stopped) = oneshot::channel::<()>();

        let handle = tokio::spawn(collector::serve(
            listener,
            Arc::clone(&store),
            Arc::new(Classifier::default()),
            async move {
                let _ = stopped.await;
            },
            Duration::from_secs(5),
        ));

        Self {
            addr,
            store,
            stop,
            handle,
        }
    }

    /// Stops accepting and waits for every handler to finish.
    async fn shutdown(self) -> Arc<S> {
        self.stop.send(()).unwrap();
        self.handle.await.unwrap();
        self.store
    }
}

/// Fails every record from one user and passes the rest through.
struct StoreRejectingUser {
    inner: InMemoryUsageStore,
    user: &'static str,
    rejected: AtomicUsize,
}

#[async_trait::async_trait]
impl UsageStore for StoreRejectingUser {
    async fn record(
        &self,
        event: RawEvent,
        module: Option<ModuleIdentity>,
    ) -> usage_store::Result<()> {
        if event.user == self.user {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(UsageStoreError::WriterClosed);
        }
        self.inner.record(event, module).await
    }

    async fn read_raw_events(&self) -> usage_store::Result<RawEventStream> {
        self.inner.read_raw_events().await
    }

    async fn usage(&self, query: UsageQuery) -> usage_store::Result<Vec<ModuleUsage>> {
        self.inner.usage(query).await
    }

    async fn event_count(&self) -> usage_store::Result<u64> {
        self.inner.event_count().await
    }

    async fn snapshot(&self, destination: &Path) -> usage_store::Result<()> {
        self.inner.snapshot(destination).await
    }
}

/// Sends one frame and waits for the server to close the connection.
async fn send(addr: SocketAddr, bytes: &[u8]) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    // Oversized writes may be cut off by the server closing early.
    let _ = stream.write_all(bytes).await;
    let _ = stream.shutdown().await;
    let mut rest = Vec::new();
    let _ = stream.read_to_end(&mut rest).await;
}

#[tokio::test]
async fn test_valid_frame_is_recorded() {
    let server = TestServer::start().await;

    send(
        server.addr,
        b"userA\0/software/hgi/softpack/installs/team/env-1-scripts/python",
    )
    .await;

    let store = server.shutdown().await;
    let events = store.all_raw_events().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].user, "userA");
    assert_eq!(
        events[0].command,
        "/software/hgi/softpack/installs/team/env-1-scripts/python"
    );
    assert_eq!(events[0].source_ip, "127.0.0.1");
    assert!(events[0].timestamp > 0);

    let usage = store
        .user_usage(Category::Softpack, "team/env-1", "userA")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(usage.count, 1);
}

#[tokio::test]
async fn test_malformed_frames_are_dropped() {
    let server = TestServer::start().await;

    send(server.addr, b"no separator at all").await;
    send(server.addr, b"userA\0/bin/ls\0extra").await;
    send(server.addr, b"").await;

    let store = server.shutdown().await;
    assert_eq!(store.event_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unclassified_command_still_logged() {
    let server = TestServer::start().await;

    send(server.addr, b" userB \0 ls -la ").await;

    let store = server.shutdown().await;
    let events = store.all_raw_events().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].user, "userB");
    assert_eq!(events[0].command, "ls -la");
    for category in Category::ALL {
        assert!(
            store
                .usage(UsageQuery::modules(category))
                .await
                .unwrap()
                .is_empty()
        );
    }
}

#[tokio::test]
async fn test_frame_is_cut_at_max_bytes() {
    let server = TestServer::start().await;

    let mut bytes = b"userA\0/opt/tool/".to_vec();
    bytes.resize(MAX_FRAME_BYTES + 500, b'x');
    send(server.addr, &bytes).await;

    let store = server.shutdown().await;
    let events = store.all_raw_events().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].command.len(), MAX_FRAME_BYTES - "userA\0".len());
}

#[tokio::test]
async fn test_concurrent_connections_all_recorded() {
    let server = TestServer::start().await;
    let clients = 40;

    let mut handles = Vec::new();
    for i in 0..clients {
        let addr = server.addr;
        handles.push(tokio::spawn(async move {
            let frame = format!("user{}\0/software/hgi/installs/tools/bin/run", i % 4);
            send(addr, frame.as_bytes()).await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let store = server.shutdown().await;
    assert_eq!(store.event_count().await.unwrap(), clients);

    let usage = store
        .module_usage(Category::Other, "tools/bin")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(usage.count, clients as i64);
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let server = TestServer::start().await;
    let addr = server.addr;

    server.shutdown().await;

    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_failed_write_does_not_stop_serving() {
    let server = TestServer::with_store(StoreRejectingUser {
        inner: InMemoryUsageStore::new(),
        user: "broken",
        rejected: AtomicUsize::new(0),
    })
    .await;

    send(server.addr, b"broken\0/software/hgi/installs/tools/bin/run").await;
    send(
        server.addr,
        b"userA\0/software/hgi/softpack/installs/team/env-1-scripts/python",
    )
    .await;

    let store = server.shutdown().await;
    assert_eq!(store.rejected.load(Ordering::SeqCst), 1);
    let events = store.inner.all_raw_events().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].user, "userA");
    assert!(
        store
            .inner
            .module_usage(Category::Softpack, "team/env-1")
            .await
            .unwrap()
            .is_some()
    );
}
