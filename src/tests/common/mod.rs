//! Common test utilities and mock implementations
//!
//! Recording doubles for the collaborators, a fake upstream pool speaking
//! plain HTTP/1.1 over a local socket, and a ready-made set of route
//! components.

use crate::application::broadcast_hub::BroadcastHub;
use crate::application::services::NodeServices;
use crate::application::shutdown::ShutdownSignal;
use crate::domain::collaborators::{Miner, NodeServer};
use crate::domain::mining::{
    MinerSettings, MiningInfo, NonceSubmission, PlotDirectory, PlotSummary, SettingsUpdate,
};
use crate::infrastructure::adapters::{CredentialGuard, MiningPoolClient};
use crate::infrastructure::http::handlers::assets::AssetServer;
use crate::infrastructure::http::routes::RouteComponents;
use crate::shared::error::{AppError, AppResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const GIB: u64 = 1024 * 1024 * 1024;

/// Timeout used for the pool client in tests
pub const POOL_TIMEOUT: Duration = Duration::from_millis(500);

pub fn test_settings() -> MinerSettings {
    MinerSettings {
        target_deadline: 86_400,
        mining_intensity: 2,
        max_plot_readers: 1,
        buffer_size_mb: 64,
        submission_max_retry: 3,
    }
}

pub fn test_mining_info() -> MiningInfo {
    MiningInfo {
        height: 482_113,
        base_target: 63_285,
        generation_signature: "9fbb9ad1".to_string(),
        target_deadline: 86_400,
    }
}

/// Miner double counting every call
pub struct MockMiner {
    info: Mutex<Option<MiningInfo>>,
    settings: Mutex<MinerSettings>,
    calls: AtomicUsize,
    submissions: Mutex<Vec<NonceSubmission>>,
    shutdowns: AtomicUsize,
}

impl MockMiner {
    pub fn new(info: Option<MiningInfo>) -> Self {
        Self {
            info: Mutex::new(info),
            settings: Mutex::new(test_settings()),
            calls: AtomicUsize::new(0),
            submissions: Mutex::new(Vec::new()),
            shutdowns: AtomicUsize::new(0),
        }
    }

    /// Every call made through the `Miner` trait, shutdown excluded
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<NonceSubmission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Miner for MockMiner {
    async fn mining_info(&self) -> Option<MiningInfo> {
        self.record();
        self.info.lock().unwrap().clone()
    }

    async fn settings(&self) -> MinerSettings {
        self.record();
        self.settings.lock().unwrap().clone()
    }

    async fn apply_settings(&self, update: &SettingsUpdate) -> AppResult<MinerSettings> {
        self.record();
        let mut settings = self.settings.lock().unwrap();
        update.apply_to(&mut settings);
        Ok(settings.clone())
    }

    async fn on_nonce_submitted(&self, submission: &NonceSubmission) {
        self.record();
        self.submissions.lock().unwrap().push(submission.clone());
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Node server double with an in-memory directory list
pub struct MockNodeServer {
    directories: Mutex<Vec<PlotDirectory>>,
    calls: AtomicUsize,
    rescans: AtomicUsize,
    shutdown_requests: AtomicUsize,
}

impl MockNodeServer {
    pub fn new() -> Self {
        Self {
            directories: Mutex::new(vec![PlotDirectory {
                path: "/plots/a".to_string(),
                plot_files: 2,
                total_bytes: 2 * GIB,
            }]),
            calls: AtomicUsize::new(0),
            rescans: AtomicUsize::new(0),
            shutdown_requests: AtomicUsize::new(0),
        }
    }

    /// Every call made through the `NodeServer` trait, shutdown excluded
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn rescans(&self) -> usize {
        self.rescans.load(Ordering::SeqCst)
    }

    pub fn shutdown_requests(&self) -> usize {
        self.shutdown_requests.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> Vec<String> {
        self.directories.lock().unwrap().iter().map(|dir| dir.path.clone()).collect()
    }
}

impl Default for MockNodeServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeServer for MockNodeServer {
    async fn plot_directories(&self) -> Vec<PlotDirectory> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.directories.lock().unwrap().clone()
    }

    async fn rescan_plot_directories(&self) -> AppResult<PlotSummary> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.rescans.fetch_add(1, Ordering::SeqCst);
        // Every rescan finds one more 1 GiB plot in the first directory.
        let mut directories = self.directories.lock().unwrap();
        if let Some(first) = directories.first_mut() {
            first.plot_files += 1;
            first.total_bytes += GIB;
        }
        Ok(PlotSummary::from_directories(directories.clone()))
    }

    async fn add_plot_directory(&self, path: &str) -> AppResult<PlotDirectory> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if path.contains("missing") {
            return Err(AppError::PlotDirectory(format!("No such directory: {}", path)));
        }
        let mut directories = self.directories.lock().unwrap();
        if directories.iter().any(|dir| dir.path == path) {
            return Err(AppError::Validation(format!("Already configured: {}", path)));
        }
        let directory = PlotDirectory::empty(path);
        directories.push(directory.clone());
        Ok(directory)
    }

    async fn remove_plot_directory(&self, path: &str) -> AppResult<PlotDirectory> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut directories = self.directories.lock().unwrap();
        let index = directories
            .iter()
            .position(|dir| dir.path == path)
            .ok_or_else(|| AppError::PlotDirectory(format!("Not configured: {}", path)))?;
        Ok(directories.remove(index))
    }

    fn request_shutdown(&self) {
        self.shutdown_requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Handles to the doubles behind a set of route components
pub struct TestDoubles {
    pub miner: Arc<MockMiner>,
    pub server: Arc<MockNodeServer>,
    /// Asset root; removed when dropped
    pub site: tempfile::TempDir,
}

impl TestDoubles {
    /// Collaborator calls of any kind so far
    pub fn collaborator_calls(&self) -> usize {
        self.miner.calls() + self.server.calls() + self.miner.shutdowns() + self.server.shutdown_requests()
    }
}

/// Route components bound to fresh doubles, with an unreachable pool
pub fn test_components(secret: &str) -> (RouteComponents, TestDoubles) {
    test_components_with_pool(secret, "http://127.0.0.1:9", false)
}

/// Route components bound to fresh doubles and the given pool
pub fn test_components_with_pool(
    secret: &str,
    pool_url: &str,
    websocket_requires_auth: bool,
) -> (RouteComponents, TestDoubles) {
    let site = tempfile::tempdir().unwrap();
    std::fs::write(
        site.path().join("index.html"),
        "<title>Node %VERSION%</title><p>Block %HEIGHT%</p><p>%UNKNOWN%</p><script src=\"%WS_PATH%\"></script>",
    )
    .unwrap();
    std::fs::write(site.path().join("app.js"), "const ws = '%WS_PATH%';").unwrap();

    let miner = Arc::new(MockMiner::new(Some(test_mining_info())));
    let server = Arc::new(MockNodeServer::new());
    let hub = Arc::new(BroadcastHub::new(64, 64, 8));

    let node = Arc::new(NodeServices::new(
        miner.clone(),
        server.clone(),
        hub,
        ShutdownSignal::new(),
        pool_url,
        websocket_requires_auth,
    ));

    let components = RouteComponents {
        node,
        pool: Arc::new(MiningPoolClient::with_url(pool_url, POOL_TIMEOUT).unwrap()),
        assets: Arc::new(AssetServer::new(site.path(), "index.html")),
        guard: Arc::new(CredentialGuard::new("", secret)),
    };

    (components, TestDoubles { miner, server, site })
}

/// What the fake pool answers
#[derive(Clone)]
enum PoolBehavior {
    Respond(Vec<u8>),
    Hang,
}

/// A local HTTP/1.1 server standing in for the upstream pool
///
/// Every request is recorded verbatim.
pub struct FakePool {
    port: u16,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
    task: tokio::task::JoinHandle<()>,
}

impl FakePool {
    /// Answer every request with `status` and `body`, passing `headers` through
    pub async fn respond(status: &str, headers: &[(&str, &str)], body: &[u8]) -> Self {
        let mut response = format!("HTTP/1.1 {}\r\n", status).into_bytes();
        for (name, value) in headers {
            response.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        response.extend_from_slice(format!("Content-Length: {}\r\nConnection: close\r\n\r\n", body.len()).as_bytes());
        response.extend_from_slice(body);
        Self::start(PoolBehavior::Respond(response)).await
    }

    /// Answer every request with a JSON body
    pub async fn json(body: &str) -> Self {
        Self::respond("200 OK", &[("Content-Type", "application/json")], body.as_bytes()).await
    }

    /// Accept connections and never answer
    pub async fn hang() -> Self {
        Self::start(PoolBehavior::Hang).await
    }

    async fn start(behavior: PoolBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let behavior = behavior.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    serve_connection(stream, behavior, recorded).await;
                });
            }
        });

        Self { port, requests, task }
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Raw bytes of every request received so far
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.requests.lock().unwrap().clone()
    }

    /// Request line and headers of the `index`th request, lower-cased
    pub fn head(&self, index: usize) -> String {
        let request = &self.requests()[index];
        let end = find(request, b"\r\n\r\n").unwrap_or(request.len());
        String::from_utf8_lossy(&request[..end]).to_lowercase()
    }
}

impl Drop for FakePool {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_connection(mut stream: TcpStream, behavior: PoolBehavior, recorded: Arc<Mutex<Vec<Vec<u8>>>>) {
    let mut request = Vec::new();
    let mut buffer = [0u8; 4096];

    loop {
        let read = match stream.read(&mut buffer).await {
            Ok(0) | Err(_) => return,
            Ok(read) => read,
        };
        request.extend_from_slice(&buffer[..read]);

        if let Some(end) = find(&request, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if request.len() >= end + 4 + length {
                break;
            }
        }
    }

    recorded.lock().unwrap().push(request);

    match behavior {
        PoolBehavior::Respond(response) => {
            let _ = stream.write_all(&response).await;
            let _ = stream.shutdown().await;
        }
        PoolBehavior::Hang => {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
