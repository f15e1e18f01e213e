//! 批量草稿提交器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责发件箱的批量提交和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：日志文件、传输客户端、项目键缓存、提交编排器
//! 2. **批量加载**：扫描发件箱中的所有草稿（`Vec<DraftFile>`）
//! 3. **并发控制**：使用 Semaphore 限制同时提交的草稿数量
//! 4. **全局统计**：汇总所有草稿的提交结果
//!
//! 各草稿之间没有共享的可变状态，唯一共享的是项目键缓存。

use crate::config::Config;
use crate::infrastructure::TransportClient;
use crate::models::DraftFile;
use crate::orchestrator::outbox_processor;
use crate::services::{
    CredentialProvider, EnvToken, FsMediaProvider, HttpProjectDirectory, JsonFileCache,
    ProjectKeyResolver, StaticToken,
};
use crate::utils::logging;
use crate::workflow::SubmissionOrchestrator;
use anyhow::Result;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    orchestrator: Arc<SubmissionOrchestrator>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        logging::init_log_file(&config.output_log_file)?;

        logging::log_startup(&config);

        let credentials: Arc<dyn CredentialProvider> = match &config.api_token {
            Some(token) => Arc::new(StaticToken::new(Some(token.clone()))),
            None => Arc::new(EnvToken::new("API_TOKEN")),
        };
        let transport = Arc::new(TransportClient::new(&config, credentials));

        let cache = Arc::new(JsonFileCache::open(&config.project_cache_file).await?);
        let directory = Arc::new(HttpProjectDirectory::new(transport.clone()));
        let resolver = Arc::new(ProjectKeyResolver::new(directory, cache));
        let media = Arc::new(FsMediaProvider::with_root(&config.outbox_folder));

        let orchestrator = SubmissionOrchestrator::new(transport, resolver, media)
            .allow_partial_attachments(config.allow_partial_attachments);

        Ok(Self::with_orchestrator(config, Arc::new(orchestrator)))
    }

    /// 使用已有的编排器创建应用（测试中注入）
    pub fn with_orchestrator(config: Config, orchestrator: Arc<SubmissionOrchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<ProcessingStats> {
        self.run_with_cancel(CancellationToken::new()).await
    }

    /// 运行应用主逻辑，令牌取消时正在进行的提交以 TIMEOUT 结束
    pub async fn run_with_cancel(&self, cancel: CancellationToken) -> Result<ProcessingStats> {
        // 加载所有待提交的草稿
        let drafts = self.load_drafts().await?;

        if drafts.is_empty() {
            warn!("⚠️ 发件箱中没有待提交的草稿，程序结束");
            return Ok(ProcessingStats::default());
        }

        logging::log_drafts_loaded(drafts.len(), self.config.max_concurrent_submissions);

        let stats = self.process_all(drafts, cancel).await?;

        logging::print_final_stats(
            stats.success,
            stats.soft_success,
            stats.failed,
            stats.total,
            &self.config.output_log_file,
        );

        Ok(stats)
    }

    /// 加载草稿
    async fn load_drafts(&self) -> Result<Vec<DraftFile>> {
        info!("\n📁 正在扫描发件箱...");
        tokio::fs::create_dir_all(&self.config.outbox_folder).await?;
        crate::models::load_pending_drafts(&self.config.outbox_folder, &self.config.sent_folder)
            .await
    }

    /// 并发提交所有草稿
    async fn process_all(
        &self,
        drafts: Vec<DraftFile>,
        cancel: CancellationToken,
    ) -> Result<ProcessingStats> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_submissions.max(1)));
        let mut stats = ProcessingStats {
            total: drafts.len(),
            ..Default::default()
        };

        let mut handles = Vec::new();
        for (idx, file) in drafts.into_iter().enumerate() {
            let draft_index = idx + 1;
            let permit = semaphore.clone().acquire_owned().await?;

            let orchestrator = self.orchestrator.clone();
            let config = self.config.clone();
            let cancel = cancel.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                outbox_processor::process_draft_file(
                    &orchestrator,
                    file,
                    draft_index,
                    &config,
                    Some(&cancel),
                )
                .await
            });
            handles.push((draft_index, handle));
        }

        // 等待所有任务完成
        let outcomes = join_all(
            handles
                .into_iter()
                .map(|(draft_index, handle)| async move { (draft_index, handle.await) }),
        )
        .await;

        for (draft_index, outcome) in outcomes {
            let line = match outcome {
                Ok(Ok(result)) => {
                    stats.success += 1;
                    if result.is_soft_success() {
                        stats.soft_success += 1;
                    }
                    format!("✓ 草稿 {} 已提交 ({})", draft_index, result.project_key)
                }
                Ok(Err(e)) => {
                    stats.failed += 1;
                    format!("❌ 草稿 {}: {:#}", draft_index, e)
                }
                Err(e) => {
                    error!("[草稿 {}] 任务执行失败: {}", draft_index, e);
                    stats.failed += 1;
                    format!("❌ 草稿 {}: 任务执行失败", draft_index)
                }
            };
            if let Err(e) = logging::append_log_line(&self.config.output_log_file, &line) {
                warn!("写入日志文件失败: {}", e);
            }
        }

        Ok(stats)
    }
}

/// 处理统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub success: usize,
    /// 成功中 commit 软成功的数量
    pub soft_success: usize,
    pub failed: usize,
    pub total: usize,
}
