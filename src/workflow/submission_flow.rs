//! 文档提交流程 - 流程层
//!
//! 核心职责：定义"一份文档"的完整提交流程
//!
//! 状态顺序：
//! 1. CREATED → NAMED：为所有附件生成稳定名称
//! 2. UPLOADED | NO_ATTACHMENTS：本地文件一次 multipart 上传，结果对账
//! 3. SUBMITTED：提交文档体
//! 4. COMMITTED | FINAL：可选的 commit
//!
//! 只有这里可以把 `MissingEndpoint` 转换为软成功（commit）或旧协议切换（submit / upload）。
//! 编排器自身不做重试；命名和项目键解析是确定的，调用方整体重试总是安全的。

use chrono::Local;
use serde_json::{json, Map, Value as JsonValue};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult, TransportError};
use crate::infrastructure::{ApiRequest, ApiResponse, FilePart, MultipartBody, TransportClient};
use crate::models::{
    AttachmentRef, CommitOutcome, DraftDocument, Phase, PhaseReport, ProjectKey, Protocol,
    SubmissionResult, SubmissionState,
};
use crate::services::{
    normalize_upload_response, AttachmentNamer, MediaProvider, ProjectKeyResolver, Reconciled,
    ReconciliationMatcher,
};
use crate::workflow::protocol::ProtocolDescriptor;
use crate::workflow::submission_ctx::SubmissionCtx;

/// multipart 中文件部分的字段名
const UPLOAD_FILE_FIELD: &str = "files";

/// 响应中文档 id 的字段名（按优先级）
const DOC_ID_FIELDS: [&str; 4] = ["docId", "doc_id", "id", "documentId"];

/// 文档提交编排器
///
/// - 编排 upload → submit → commit? 的完整流程
/// - 决定何时回退到旧协议、何时视为软成功
/// - 只依赖业务能力（services）和传输客户端
pub struct SubmissionOrchestrator {
    transport: Arc<TransportClient>,
    resolver: Arc<ProjectKeyResolver>,
    media: Arc<dyn MediaProvider>,
    namer: AttachmentNamer,
    allow_partial_attachments: bool,
}

/// 单次提交的运行状态，调用结束即丢弃
struct SubmissionRun<'a> {
    ctx: SubmissionCtx,
    key: ProjectKey,
    descriptor: &'static ProtocolDescriptor,
    cancel: Option<&'a CancellationToken>,
    trace: Vec<SubmissionState>,
    phases: PhaseReport,
    protocol: Protocol,
    /// 成功完成的上传阶段（没有本地文件时为 None）
    uploaded_in: Option<Phase>,
}

impl SubmissionRun<'_> {
    fn enter(&mut self, state: SubmissionState) {
        debug!("{} 状态 → {:?}", self.ctx, state);
        self.trace.push(state);
    }

    fn key(&self) -> &str {
        self.key.as_str()
    }
}

impl SubmissionOrchestrator {
    pub fn new(
        transport: Arc<TransportClient>,
        resolver: Arc<ProjectKeyResolver>,
        media: Arc<dyn MediaProvider>,
    ) -> Self {
        Self {
            transport,
            resolver,
            media,
            namer: AttachmentNamer::new(),
            allow_partial_attachments: false,
        }
    }

    /// 是否允许带着未对账的附件（url 为空）继续提交
    pub fn allow_partial_attachments(mut self, allow: bool) -> Self {
        self.allow_partial_attachments = allow;
        self
    }

    pub fn with_namer(mut self, namer: AttachmentNamer) -> Self {
        self.namer = namer;
        self
    }

    /// 提交一份草稿
    pub async fn submit(&self, draft: DraftDocument) -> AppResult<SubmissionResult> {
        self.submit_with_cancel(draft, None).await
    }

    /// 提交一份草稿，可被取消（取消发生在哪个阶段就报告哪个阶段的 TIMEOUT）
    ///
    /// # 参数
    /// - `draft`: 草稿，提交期间由编排器独占
    /// - `cancel`: 可选的取消令牌
    ///
    /// # 返回
    /// 成功时返回统一的提交结果（无论走的是当前协议还是旧协议）
    pub async fn submit_with_cancel(
        &self,
        mut draft: DraftDocument,
        cancel: Option<&CancellationToken>,
    ) -> AppResult<SubmissionResult> {
        if draft.project_id.trim().is_empty() {
            return Err(AppError::Draft("缺少项目标识 (projectId)".to_string()));
        }

        let descriptor = ProtocolDescriptor::for_type(draft.kind);
        let key = self.resolver.resolve(&draft.project_id).await;
        let mut run = SubmissionRun {
            ctx: SubmissionCtx::new(draft.kind, key.to_string(), draft.id.clone()),
            key,
            descriptor,
            cancel,
            trace: vec![SubmissionState::Created],
            phases: PhaseReport::default(),
            protocol: Protocol::Current,
            uploaded_in: None,
        };

        info!("{} 📤 开始提交", run.ctx);

        // ========== NAMED ==========
        self.namer
            .name_all(&mut draft.attachments, descriptor.name_prefix);
        if descriptor.requires_date && is_blank(draft.date.as_deref()) {
            let today = Local::now().format("%Y-%m-%d").to_string();
            debug!("{} 日期缺省为 {}", run.ctx, today);
            draft.date = Some(today);
        }
        run.enter(SubmissionState::Named);

        // ========== UPLOADED | NO_ATTACHMENTS ==========
        let reconciled = self.upload_phase(&mut run, &draft).await?;
        self.check_reconciled(&run, &reconciled)?;

        let Reconciled {
            attachments,
            unresolved,
            ..
        } = reconciled;
        let body = submission_body(&run, &draft, &attachments);

        // ========== SUBMITTED → COMMITTED | FINAL ==========
        let doc_id = match run.protocol {
            Protocol::Legacy => {
                let path = descriptor.legacy_commit_path(run.key()).ok_or_else(|| {
                    AppError::submission(
                        Phase::LegacyCommit,
                        TransportError::server(0, "该文档类型没有旧协议"),
                    )
                })?;
                self.legacy_commit(&mut run, path, body).await?
            }
            Protocol::Current => self.submit_phase(&mut run, &draft, body).await?,
        };

        info!(
            "{} ✓ 提交完成 (协议: {:?}, 文档 id: {})",
            run.ctx,
            run.protocol,
            doc_id.as_deref().unwrap_or("-")
        );

        Ok(SubmissionResult {
            ok: true,
            doc_id,
            project_key: run.key.to_string(),
            attachments,
            unresolved,
            phases: run.phases,
            protocol: run.protocol,
            trace: run.trace,
        })
    }

    /// 上传阶段：没有本地文件时跳过，否则一次 multipart 上传后对账
    async fn upload_phase(
        &self,
        run: &mut SubmissionRun<'_>,
        draft: &DraftDocument,
    ) -> AppResult<Reconciled> {
        let matcher = ReconciliationMatcher::new(run.descriptor.storage_prefix_for(run.key()));
        let batch: Vec<&AttachmentRef> = draft
            .attachments
            .iter()
            .filter(|attachment| attachment.is_local())
            .collect();

        if batch.is_empty() {
            run.enter(SubmissionState::NoAttachments);
            return Ok(matcher.reconcile(&draft.attachments, &[]));
        }

        let form = self.build_upload_form(run.key(), &batch).await?;
        info!("{} 📤 上传 {} 个文件", run.ctx, batch.len());

        let request = ApiRequest::post_multipart(run.descriptor.upload_path(run.key()), form.clone());
        let (phase, response) = match self.call(run.cancel, request).await {
            Ok(response) => (Phase::Upload, response),
            Err(e) => {
                let legacy_path = if e.is_missing_endpoint() {
                    run.descriptor.legacy_upload_path(run.key())
                } else {
                    None
                };
                match legacy_path {
                    Some(path) => {
                        warn!("{} ⚠️ 上传接口不存在，切换到旧协议: {}", run.ctx, path);
                        run.protocol = Protocol::Legacy;
                        let response = self
                            .call(run.cancel, ApiRequest::post_multipart(path, form))
                            .await
                            .map_err(|e| self.fail(run, Phase::LegacyUpload, e))?;
                        (Phase::LegacyUpload, response)
                    }
                    None => return Err(self.fail(run, Phase::Upload, e)),
                }
            }
        };

        let results = normalize_upload_response(&response.body);
        debug!("{} 上传响应规范化为 {} 条结果", run.ctx, results.len());

        if results.is_empty() {
            let e = TransportError::server(
                response.status,
                format!(
                    "上传响应中没有 items：发送了 {} 个文件，返回 0 条结果",
                    batch.len()
                ),
            );
            return Err(self.fail(run, phase, e));
        }
        if results.len() < batch.len() {
            warn!(
                "{} ⚠️ 上传结果少于文件数: {}/{}",
                run.ctx,
                results.len(),
                batch.len()
            );
        }

        run.phases.uploaded = Some(true);
        run.uploaded_in = Some(phase);
        run.enter(SubmissionState::Uploaded);
        info!("{} ✓ 上传完成，{} 条结果", run.ctx, results.len());

        Ok(matcher.reconcile(&draft.attachments, &results))
    }

    /// 提交阶段；提交接口不存在且声明了旧协议时切换到旧协议
    async fn submit_phase(
        &self,
        run: &mut SubmissionRun<'_>,
        draft: &DraftDocument,
        body: JsonValue,
    ) -> AppResult<Option<String>> {
        let path = run.descriptor.submit_path(run.key());
        debug!("{} 提交 {}", run.ctx, path);

        let response = match self
            .call(run.cancel, ApiRequest::post_json(path, body.clone()))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let legacy_path = if e.is_missing_endpoint() {
                    run.descriptor.legacy_commit_path(run.key())
                } else {
                    None
                };
                return match legacy_path {
                    Some(path) => {
                        warn!("{} ⚠️ 提交接口不存在，切换到旧协议: {}", run.ctx, path);
                        run.protocol = Protocol::Legacy;
                        self.legacy_commit(run, path, body).await
                    }
                    None => Err(self.fail(run, Phase::Submit, e)),
                };
            }
        };

        let doc_id = extract_doc_id(&response.body);
        if doc_id.is_none() && run.descriptor.requires_doc_id {
            let e = TransportError::server(response.status, "提交响应中缺少文档 id");
            return Err(self.fail(run, Phase::Submit, e));
        }

        run.phases.submitted = true;
        run.enter(SubmissionState::Submitted);
        info!("{} ✓ 文档已提交", run.ctx);

        self.commit_phase(run, draft, doc_id.as_deref()).await?;
        Ok(doc_id)
    }

    /// commit 阶段；接口不存在视为不需要 commit（软成功）
    async fn commit_phase(
        &self,
        run: &mut SubmissionRun<'_>,
        draft: &DraftDocument,
        doc_id: Option<&str>,
    ) -> AppResult<()> {
        let path = match run.descriptor.commit_path(run.key()) {
            Some(path) => path,
            None => {
                run.enter(SubmissionState::Final);
                return Ok(());
            }
        };

        let mut body = json!({
            "projectId": run.key(),
            "projectCode": run.key(),
            "docId": doc_id,
        });
        if let Some(id) = &draft.id {
            body["clientId"] = json!(id);
        }
        if let Some(date) = &draft.date {
            body["date"] = json!(date);
        }

        match self.call(run.cancel, ApiRequest::post_json(path, body)).await {
            Ok(_) => {
                run.phases.committed = Some(CommitOutcome::Committed);
                run.enter(SubmissionState::Committed);
                info!("{} ✓ commit 完成", run.ctx);
            }
            Err(e) if e.is_missing_endpoint() => {
                warn!("{} ⚠️ commit 接口不存在，视为不需要 commit: {}", run.ctx, e);
                run.phases.committed = Some(CommitOutcome::NotRequired);
            }
            Err(e) => return Err(self.fail(run, Phase::Commit, e)),
        }

        run.enter(SubmissionState::Final);
        Ok(())
    }

    /// 旧协议：完整文档体直接提交到 commit 端点
    async fn legacy_commit(
        &self,
        run: &mut SubmissionRun<'_>,
        path: String,
        body: JsonValue,
    ) -> AppResult<Option<String>> {
        let response = self
            .call(run.cancel, ApiRequest::post_json(path, body))
            .await
            .map_err(|e| self.fail(run, Phase::LegacyCommit, e))?;

        let doc_id = extract_doc_id(&response.body);
        if doc_id.is_none() {
            debug!("{} 旧协议响应中没有文档 id", run.ctx);
        }

        run.phases.submitted = true;
        run.phases.committed = Some(CommitOutcome::Committed);
        run.enter(SubmissionState::Committed);
        run.enter(SubmissionState::Final);
        info!("{} ✓ 旧协议提交完成", run.ctx);

        Ok(doc_id)
    }

    /// 未对账的附件默认中止提交
    fn check_reconciled(&self, run: &SubmissionRun<'_>, reconciled: &Reconciled) -> AppResult<()> {
        if !reconciled.stripped.is_empty() {
            warn!(
                "{} ⚠️ 去掉了 {} 个带本地 URI 的附件",
                run.ctx,
                reconciled.stripped.len()
            );
        }
        if reconciled.unresolved.is_empty() {
            return Ok(());
        }

        if self.allow_partial_attachments {
            warn!(
                "{} ⚠️ {} 个附件未对账，按配置继续提交: {}",
                run.ctx,
                reconciled.unresolved.len(),
                reconciled.unresolved.join(", ")
            );
            Ok(())
        } else {
            error!(
                "{} ❌ 附件对账失败: {}",
                run.ctx,
                reconciled.unresolved.join(", ")
            );
            Err(AppError::Reconciliation {
                attachment: reconciled.unresolved.join(", "),
                after: run.uploaded_in,
            })
        }
    }

    /// 读取本地文件，组装上传表单（顺序与原附件列表一致）
    async fn build_upload_form(
        &self,
        project_key: &str,
        batch: &[&AttachmentRef],
    ) -> AppResult<MultipartBody> {
        let mut form = MultipartBody::new()
            .text("projectId", project_key)
            .text("projectCode", project_key);

        for attachment in batch {
            let uri = attachment.local_uri.as_deref().unwrap_or_default();
            let bytes = self.media.read(uri).await?;
            form = form.file(FilePart {
                field: UPLOAD_FILE_FIELD.to_string(),
                file_name: attachment.stable_name.clone(),
                media_type: attachment.media_type.clone(),
                bytes,
            });
        }

        Ok(form)
    }

    async fn call(
        &self,
        cancel: Option<&CancellationToken>,
        request: ApiRequest,
    ) -> Result<ApiResponse, TransportError> {
        self.transport.send_with_cancel(request, cancel).await
    }

    fn fail(&self, run: &SubmissionRun<'_>, phase: Phase, e: TransportError) -> AppError {
        error!("{} ❌ {} 阶段失败: {}", run.ctx, phase, e);
        AppError::submission(phase, e)
    }
}

/// 组装提交体
///
/// 项目键同时写入 `projectId` 和 `projectCode`，兼容旧服务端
fn submission_body(
    run: &SubmissionRun<'_>,
    draft: &DraftDocument,
    attachments: &[AttachmentRef],
) -> JsonValue {
    let mut body: Map<String, JsonValue> = draft.payload.clone();
    body.insert("projectId".to_string(), json!(run.key()));
    body.insert("projectCode".to_string(), json!(run.key()));
    if let Some(date) = &draft.date {
        body.insert("date".to_string(), json!(date));
    }
    if let Some(id) = &draft.id {
        body.insert("clientId".to_string(), json!(id));
    }
    body.insert(
        run.descriptor.attachment_field.to_string(),
        JsonValue::Array(attachments.iter().map(AttachmentRef::to_wire).collect()),
    );
    JsonValue::Object(body)
}

/// 从响应中读取文档 id（也查看 `data` 下的嵌套对象）
fn extract_doc_id(body: &JsonValue) -> Option<String> {
    let read = |value: &JsonValue| {
        DOC_ID_FIELDS
            .iter()
            .find_map(|field| match value.get(*field) {
                Some(JsonValue::String(id)) if !id.trim().is_empty() => {
                    Some(id.trim().to_string())
                }
                Some(JsonValue::Number(id)) => Some(id.to_string()),
                _ => None,
            })
    };
    read(body).or_else(|| body.get("data").and_then(read))
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(str::trim).map_or(true, str::is_empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentType;
    use pretty_assertions::assert_eq;

    fn run_for(doc_type: DocumentType) -> SubmissionRun<'static> {
        SubmissionRun {
            ctx: SubmissionCtx::new(doc_type, "BA-2025-DEMO".to_string(), None),
            key: ProjectKey::Canonical("BA-2025-DEMO".to_string()),
            descriptor: ProtocolDescriptor::for_type(doc_type),
            cancel: None,
            trace: Vec::new(),
            phases: PhaseReport::default(),
            protocol: Protocol::Current,
            uploaded_in: None,
        }
    }

    #[test]
    fn test_extract_doc_id_variants() {
        assert_eq!(extract_doc_id(&json!({"docId": "r-1"})), Some("r-1".to_string()));
        assert_eq!(extract_doc_id(&json!({"id": 42})), Some("42".to_string()));
        assert_eq!(
            extract_doc_id(&json!({"data": {"documentId": "d-9"}})),
            Some("d-9".to_string())
        );
        assert_eq!(extract_doc_id(&json!({"ok": true})), None);
        assert_eq!(extract_doc_id(&json!({"docId": "  "})), None);
    }

    #[test]
    fn test_submission_body_duplicates_project_key() {
        let run = run_for(DocumentType::DeliveryNote);
        let draft = DraftDocument::new(DocumentType::DeliveryNote, "uuid-ignored")
            .with_id("d-17")
            .with_date("2025-03-01")
            .with_field("supplier", json!("Kies AG"));
        let attachments = vec![AttachmentRef::remote("a.jpg", "/u/a.jpg")];

        let body = submission_body(&run, &draft, &attachments);

        assert_eq!(body["projectId"], "BA-2025-DEMO");
        assert_eq!(body["projectCode"], "BA-2025-DEMO");
        assert_eq!(body["date"], "2025-03-01");
        assert_eq!(body["clientId"], "d-17");
        assert_eq!(body["supplier"], "Kies AG");
        assert_eq!(body["images"], json!([{"name": "a.jpg", "url": "/u/a.jpg"}]));
    }

    #[test]
    fn test_blank_date_detection() {
        assert!(is_blank(None));
        assert!(is_blank(Some("  ")));
        assert!(!is_blank(Some("2025-03-01")));
    }
}
