//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量草稿提交器
//! - 管理应用生命周期（初始化、运行）
//! - 扫描发件箱（Vec<DraftFile>）
//! - 控制并发数量（Semaphore）
//! - 输出全局统计信息
//!
//! ### `outbox_processor` - 单个草稿处理器
//! - 调用 SubmissionOrchestrator 提交
//! - 成功时归档草稿并写入结果文件
//! - 失败时保留草稿
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<DraftFile>)
//!     ↓
//! outbox_processor (处理单个 DraftFile)
//!     ↓
//! workflow::SubmissionOrchestrator (upload → submit → commit?)
//!     ↓
//! services (能力层：project_key / namer / reconciliation / cache / media)
//!     ↓
//! infrastructure (基础设施：TransportClient)
//! ```

pub mod batch_processor;
pub mod outbox_processor;

// 重新导出主要类型
pub use batch_processor::{App, ProcessingStats};
pub use outbox_processor::process_draft_file;
