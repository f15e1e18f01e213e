#![allow(dead_code)]

use async_trait::async_trait;
use field_submit::error::AppResult;
use field_submit::services::{
    HttpProjectDirectory, MediaProvider, MemoryCache, ProjectKeyResolver, StaticToken,
};
use field_submit::{Config, SubmissionOrchestrator, TransportClient};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::{MockServer, Request};

pub const TOKEN: &str = "test-token";

/// 不读磁盘的媒体提供者，记录读取过的 URI
#[derive(Default)]
pub struct FakeMedia {
    reads: Mutex<Vec<String>>,
}

impl FakeMedia {
    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaProvider for FakeMedia {
    async fn read(&self, uri: &str) -> AppResult<Vec<u8>> {
        self.reads.lock().unwrap().push(uri.to_string());
        Ok(format!("bytes:{}", uri).into_bytes())
    }
}

pub fn config_for(server: &MockServer) -> Config {
    Config {
        api_base_url: server.uri(),
        api_token: Some(TOKEN.to_string()),
        app_version: "1.2.3".to_string(),
        app_build: "42".to_string(),
        ..Config::default()
    }
}

pub fn transport(server: &MockServer) -> Arc<TransportClient> {
    transport_with_timeouts(server, Duration::from_secs(5), Duration::from_secs(5))
}

pub fn transport_with_timeouts(
    server: &MockServer,
    short: Duration,
    long: Duration,
) -> Arc<TransportClient> {
    let credentials = Arc::new(StaticToken::new(Some(TOKEN.to_string())));
    Arc::new(TransportClient::new(&config_for(server), credentials).with_timeouts(short, long))
}

pub struct Harness {
    pub orchestrator: SubmissionOrchestrator,
    pub media: Arc<FakeMedia>,
    pub cache: Arc<MemoryCache>,
    pub resolver: Arc<ProjectKeyResolver>,
}

pub fn harness(server: &MockServer) -> Harness {
    harness_with_transport(transport(server))
}

pub fn harness_with_transport(transport: Arc<TransportClient>) -> Harness {
    let media = Arc::new(FakeMedia::default());
    let cache = Arc::new(MemoryCache::new());
    let directory = Arc::new(HttpProjectDirectory::new(transport.clone()));
    let resolver = Arc::new(ProjectKeyResolver::new(directory, cache.clone()));
    let orchestrator =
        SubmissionOrchestrator::new(transport, resolver.clone(), media.clone());
    Harness {
        orchestrator,
        media,
        cache,
        resolver,
    }
}

/// 服务端收到的指定路径的请求
pub async fn requests_to(server: &MockServer, path: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == path)
        .collect()
}

pub fn json_body(request: &Request) -> serde_json::Value {
    serde_json::from_slice(&request.body).unwrap()
}
