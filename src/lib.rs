//! # Field Submit
//!
//! 工地现场文档（工作报告、送货单、照片备注）的离线提交与附件对账管道
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（HTTP 客户端），只暴露能力
//! - `TransportClient` - 一次有截止时间的 HTTP 调用，失败分类为封闭的错误种类
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不包含流程
//! - `ProjectKeyResolver` - 项目标识 → 业务编码
//! - `AttachmentNamer` - 确定性的附件命名
//! - `ReconciliationMatcher` - 上传结果对账
//! - 外部协作者接口：`KeyValueCache` / `CredentialProvider` / `MediaProvider` / `ProjectDirectory`
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一份文档"的完整提交流程
//! - `ProtocolDescriptor` - 每种文档类型的端点与阶段声明
//! - `SubmissionOrchestrator` - upload → submit → commit?，旧协议回退与软成功
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 发件箱批量提交，管理资源和并发
//! - `orchestrator/outbox_processor` - 单个草稿文件的提交与归档
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, ErrorKind, TransportError};
pub use infrastructure::TransportClient;
pub use models::{AttachmentRef, DocumentType, DraftDocument, ProjectKey, SubmissionResult};
pub use orchestrator::{process_draft_file, App, ProcessingStats};
pub use workflow::{ProtocolDescriptor, SubmissionCtx, SubmissionOrchestrator};
