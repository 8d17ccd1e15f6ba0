//! アップロード→マッピング確認→確定→結果表示のワークフロー状態機械。

use anyhow::{Result, bail};
use uuid::Uuid;

use crate::api::upload::{ConfirmResponse, ProcessingStats, UploadResponse};
use crate::mapping::{self, ConfirmationPayload, MappingRecord, MappingSet, TargetField};
use crate::schema::SchemaCatalog;

/// ワークフローの各フェーズ。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// 待機中（ファイルの選択はネットワークを伴わないためIdleのまま）。
    Idle,
    /// アップロード要求が解決待ち。
    Uploading,
    /// 提案されたマッピングを確認・編集中。
    ReviewingMapping,
    /// 確定要求が解決待ち。
    ConfirmingMappings,
    /// 処理結果を表示中（閉じるとIdleへ戻る）。
    ShowingResults,
    /// 直前の要求が失敗。確認操作で元のフェーズへ戻る。
    Failed,
}

/// セッションの進行状態。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// アップロード/解析中。
    Uploading,
    /// マッピング確認待ち。
    MappingPending,
    /// 確定処理中。
    Confirming,
    /// 全件処理成功。
    Completed,
    /// 一部の行が失敗。
    PartialSuccess,
    /// 処理失敗。
    Failed,
}

impl SessionStatus {
    /// バックエンドのステータスラベルから状態を推定する。未知のラベルはNone。
    pub fn from_label(label: &str) -> Option<Self> {
        let l = label.to_ascii_lowercase();
        if l.contains("partial") {
            Some(SessionStatus::PartialSuccess)
        } else if l.contains("fail") || l.contains("error") {
            Some(SessionStatus::Failed)
        } else if l.contains("complet") || l.contains("success") {
            Some(SessionStatus::Completed)
        } else if l.contains("confirm") {
            Some(SessionStatus::Confirming)
        } else if l.contains("pending") || l.contains("mapping") {
            Some(SessionStatus::MappingPending)
        } else if l.contains("upload") || l.contains("processing") {
            Some(SessionStatus::Uploading)
        } else {
            None
        }
    }
}

/// 確定呼び出しが返した処理結果。表示用にそのまま保持する。
#[derive(Clone, Debug)]
pub struct ProcessingOutcome {
    /// バックエンドの生のステータスラベル。
    pub status_label: String,
    /// 行単位の処理統計（不整合な値でもそのまま表示する）。
    pub stats: ProcessingStats,
    /// エコーバックされたマッピング一覧。
    pub mappings: Vec<MappingRecord>,
    /// マッピングされなかった列。
    pub unmapped_fields: Vec<String>,
    /// 検出された列一覧。
    pub extracted_columns: Vec<String>,
}

/// 1回のアップロードを表すセッション。キャンセル/クローズで破棄される。
#[derive(Clone, Debug)]
pub struct UploadSession {
    /// バックエンドが発行した不透明な識別子。
    pub id: String,
    /// 検出された列（ファイル内の順序）。
    pub source_columns: Vec<String>,
    /// 取り込み先スキーマ（セッション中は不変）。
    pub schema: SchemaCatalog,
    /// 編集対象のマッピング一覧。
    pub mappings: MappingSet,
    /// セッションの進行状態。
    pub status: SessionStatus,
    /// 確定後の処理結果。
    pub outcome: Option<ProcessingOutcome>,
}

/// 失敗の内容と、確認後に戻るフェーズ。
#[derive(Clone, Debug)]
struct Failure {
    message: String,
    resume: Phase,
}

/// ワークフロー本体。1インスタンスが同時に1セッションだけを駆動する。
///
/// 非同期応答はすべてトークン照合を通る。キャンセルや新規アップロードで
/// トークンが差し替わった後に届いた古い応答は、状態を変えずに破棄される。
#[derive(Debug)]
pub struct UploadWorkflow {
    phase: Phase,
    session: Option<UploadSession>,
    /// 進行中のセッション/要求を識別するトークン。
    token: Option<Uuid>,
    failure: Option<Failure>,
}

impl Default for UploadWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadWorkflow {
    /// Idle状態のワークフローを作る。
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            session: None,
            token: None,
            failure: None,
        }
    }

    /// 現在のフェーズを返す。
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// アクティブなセッションを返す。
    pub fn session(&self) -> Option<&UploadSession> {
        self.session.as_ref()
    }

    /// Failed中の失敗メッセージを返す。
    pub fn failure_message(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.message.as_str())
    }

    /// ネットワーク要求が解決待ちか判定する。
    pub fn is_in_flight(&self) -> bool {
        matches!(self.phase(), Phase::Uploading | Phase::ConfirmingMappings)
    }

    /// アップロードを開始し、応答照合用のトークンを発行する。
    ///
    /// Idle以外からは開始できない。これにより同種の要求が二重に飛ぶことは
    /// 状態機械のレベルで起こり得ない。
    pub fn begin_upload(&mut self) -> Result<Uuid> {
        if self.phase() != Phase::Idle {
            bail!("an upload session is already active");
        }
        let token = Uuid::new_v4();
        self.token = Some(token);
        self.phase = Phase::Uploading;
        Ok(token)
    }

    /// アップロード成功応答を適用する。適用されたらtrue。
    pub fn apply_upload_success(&mut self, token: Uuid, resp: UploadResponse) -> bool {
        if self.phase() != Phase::Uploading || self.token != Some(token) {
            tracing::warn!("stale upload response dropped (token {token})");
            return false;
        }
        // 提案をスキーマで検証しつつマッピング一覧を初期化する。
        let mappings =
            MappingSet::from_suggestions(&resp.extracted_columns, &resp.mappings, &resp.expected_schema);
        self.session = Some(UploadSession {
            id: resp.file_upload_id,
            source_columns: resp.extracted_columns,
            schema: resp.expected_schema,
            mappings,
            status: SessionStatus::MappingPending,
            outcome: None,
        });
        self.phase = Phase::ReviewingMapping;
        true
    }

    /// アップロード失敗を適用する。確認後はIdleへ戻る。
    pub fn apply_upload_failure(&mut self, token: Uuid, message: String) -> bool {
        if self.phase() != Phase::Uploading || self.token != Some(token) {
            tracing::warn!("stale upload failure dropped (token {token})");
            return false;
        }
        self.session = None;
        self.token = None;
        self.failure = Some(Failure {
            message,
            resume: Phase::Idle,
        });
        self.phase = Phase::Failed;
        true
    }

    /// 確認中のマッピングの取り込み先フィールドを1つ編集する。
    pub fn edit_target(&mut self, index: usize, field: TargetField, value: String) -> Result<()> {
        if self.phase() != Phase::ReviewingMapping {
            bail!("mappings are not editable in this phase");
        }
        let Some(session) = self.session.as_mut() else {
            bail!("no active session");
        };
        session.mappings.set_target(index, field, value)
    }

    /// 確定を開始できるか（全エントリの取り込み先が埋まっているか）。
    pub fn can_confirm(&self) -> bool {
        self.phase() == Phase::ReviewingMapping
            && self
                .session
                .as_ref()
                .is_some_and(|s| !s.mappings.is_empty() && s.mappings.is_complete())
    }

    /// 確定を開始し、送信ペイロードとトークンを返す。
    ///
    /// 未選択エントリが残っていればここで拒否され、送信は行われない。
    pub fn begin_confirm(&mut self) -> Result<(Uuid, ConfirmationPayload)> {
        if self.phase() != Phase::ReviewingMapping {
            bail!("nothing to confirm in this phase");
        }
        let Some(session) = self.session.as_mut() else {
            bail!("no active session");
        };
        let payload = mapping::build_confirmation(&session.id, &session.mappings)?;
        let Some(token) = self.token else {
            bail!("no session token");
        };
        session.status = SessionStatus::Confirming;
        self.phase = Phase::ConfirmingMappings;
        Ok((token, payload))
    }

    /// 確定成功応答を適用し、結果表示へ進む。適用されたらtrue。
    ///
    /// バックエンドが行単位の失敗を報告していても例外経路にはしない。
    /// 結果はデータとして保持し、ShowingResultsで表示する。
    pub fn apply_confirm_success(&mut self, token: Uuid, resp: ConfirmResponse) -> bool {
        if self.phase() != Phase::ConfirmingMappings || self.token != Some(token) {
            tracing::warn!("stale confirm response dropped (token {token})");
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        session.status = SessionStatus::from_label(&resp.status).unwrap_or({
            // ラベルが読めない場合は統計から推定する。
            if resp.processing_stats.failed_records == 0 {
                SessionStatus::Completed
            } else if resp.processing_stats.successful_records > 0 {
                SessionStatus::PartialSuccess
            } else {
                SessionStatus::Failed
            }
        });
        session.outcome = Some(ProcessingOutcome {
            status_label: resp.status,
            stats: resp.processing_stats,
            mappings: resp.mappings,
            unmapped_fields: resp.unmapped.unmapped_fields,
            extracted_columns: resp.extracted_columns,
        });
        self.phase = Phase::ShowingResults;
        true
    }

    /// 確定失敗を適用する。セッションは保持し、確認後にReviewingMappingへ戻る。
    pub fn apply_confirm_failure(&mut self, token: Uuid, message: String) -> bool {
        if self.phase() != Phase::ConfirmingMappings || self.token != Some(token) {
            tracing::warn!("stale confirm failure dropped (token {token})");
            return false;
        }
        if let Some(session) = self.session.as_mut() {
            session.status = SessionStatus::MappingPending;
        }
        self.failure = Some(Failure {
            message,
            resume: Phase::ReviewingMapping,
        });
        self.phase = Phase::Failed;
        true
    }

    /// セッションを破棄してIdleへ戻る。確認中/確定待ちから呼べる。
    ///
    /// 確定要求が解決待ちでも破棄できる。後から届く応答はトークン不一致で
    /// 捨てられるため、破棄済みセッションが蘇ることはない。
    pub fn cancel(&mut self) -> bool {
        match self.phase() {
            Phase::ReviewingMapping | Phase::ConfirmingMappings => {
                self.discard();
                true
            }
            _ => false,
        }
    }

    /// 結果表示を閉じ、次のアップロードに備えてIdleへ戻る。
    pub fn close_results(&mut self) -> bool {
        if self.phase() != Phase::ShowingResults {
            return false;
        }
        self.discard();
        true
    }

    /// 失敗を確認し、失敗前のフェーズへ戻る。戻り先フェーズを返す。
    pub fn acknowledge_failure(&mut self) -> Option<Phase> {
        if self.phase() != Phase::Failed {
            return None;
        }
        let resume = self.failure.take().map(|f| f.resume).unwrap_or(Phase::Idle);
        self.phase = resume;
        Some(resume)
    }

    /// セッションと関連状態をすべて捨てる。
    fn discard(&mut self) {
        self.session = None;
        self.token = None;
        self.failure = None;
        self.phase = Phase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2列分の提案付きアップロード応答を作る。
    fn upload_response() -> UploadResponse {
        serde_json::from_value(serde_json::json!({
            "file_upload_id": "42",
            "status": "MappingPending",
            "extracted_columns": ["Inv No", "Amt (decimal)"],
            "mappings": [
                {"source_field": "Inv No", "target_table": "", "target_column": ""},
                {"source_field": "Amt (decimal)", "target_table": "invoices",
                 "target_column": "total (decimal)"}
            ],
            "expected_schema": {"invoices": {"invoice_number": "string", "total": "decimal"}}
        }))
        .expect("upload response json")
    }

    /// 行単位の失敗を2件含む確定応答を作る。
    fn confirm_response(status: &str) -> ConfirmResponse {
        serde_json::from_value(serde_json::json!({
            "status": status,
            "extracted_columns": ["Inv No", "Amt (decimal)"],
            "mappings": [],
            "processing_stats": {
                "total_records": 10, "successful_records": 8,
                "failed_records": 2, "errors": ["row 3: bad total"]
            }
        }))
        .expect("confirm response json")
    }

    /// ReviewingMappingまで進めたワークフローを作る。
    fn reviewing() -> (UploadWorkflow, Uuid) {
        let mut wf = UploadWorkflow::new();
        let token = wf.begin_upload().unwrap();
        assert!(wf.apply_upload_success(token, upload_response()));
        (wf, token)
    }

    #[test]
    fn test_upload_success_enters_review() {
        // アップロード成功でReviewingMappingに入り、提案が取り込まれる。
        let (wf, _) = reviewing();
        assert_eq!(wf.phase(), Phase::ReviewingMapping);
        let session = wf.session().unwrap();
        assert_eq!(session.id, "42");
        assert_eq!(session.mappings.len(), 2);
        assert_eq!(session.status, SessionStatus::MappingPending);
    }

    #[test]
    fn test_double_upload_is_blocked() {
        // 要求が解決するまで同種の要求は開始できない。
        let mut wf = UploadWorkflow::new();
        wf.begin_upload().unwrap();
        assert!(wf.begin_upload().is_err());

        let (mut wf, _) = reviewing();
        assert!(wf.begin_upload().is_err());
    }

    #[test]
    fn test_cancel_from_review_lands_in_idle_without_session() {
        // キャンセル後のIdleにはセッションデータが一切残らない。
        let (mut wf, _) = reviewing();
        assert!(wf.cancel());
        assert_eq!(wf.phase(), Phase::Idle);
        assert!(wf.session().is_none());
        assert!(!wf.can_confirm());
    }

    #[test]
    fn test_stale_confirm_response_after_cancel_is_ignored() {
        // 確定解決待ち中にキャンセルした場合、遅れて届いた応答は状態を変えない。
        let (mut wf, _) = reviewing();
        wf.edit_target(0, TargetField::Table, "invoices".into())
            .unwrap();
        wf.edit_target(0, TargetField::Column, "invoice_number (string)".into())
            .unwrap();
        let (token, _payload) = wf.begin_confirm().unwrap();
        assert_eq!(wf.phase(), Phase::ConfirmingMappings);

        assert!(wf.cancel());
        assert_eq!(wf.phase(), Phase::Idle);

        // 破棄済みセッション宛の応答は捨てられる。
        assert!(!wf.apply_confirm_success(token, confirm_response("Completed")));
        assert_eq!(wf.phase(), Phase::Idle);
        assert!(wf.session().is_none());
    }

    #[test]
    fn test_stale_upload_response_after_new_session_is_ignored() {
        // 古いトークンのアップロード応答は新しい要求に適用されない。
        let mut wf = UploadWorkflow::new();
        let old = wf.begin_upload().unwrap();
        assert!(wf.apply_upload_failure(old, "timeout".into()));
        wf.acknowledge_failure();
        let fresh = wf.begin_upload().unwrap();

        assert!(!wf.apply_upload_success(old, upload_response()));
        assert_eq!(wf.phase(), Phase::Uploading);

        assert!(wf.apply_upload_success(fresh, upload_response()));
        assert_eq!(wf.phase(), Phase::ReviewingMapping);
    }

    #[test]
    fn test_upload_failure_resumes_to_idle() {
        // アップロード失敗はFailedを経て、確認後にIdleへ戻る。
        let mut wf = UploadWorkflow::new();
        let token = wf.begin_upload().unwrap();
        assert!(wf.apply_upload_failure(token, "connection refused".into()));
        assert_eq!(wf.phase(), Phase::Failed);
        assert_eq!(wf.failure_message(), Some("connection refused"));
        assert_eq!(wf.acknowledge_failure(), Some(Phase::Idle));
        assert!(wf.session().is_none());
    }

    #[test]
    fn test_confirm_failure_resumes_to_review_with_session() {
        // 確定失敗後はセッションを保持したままReviewingMappingへ戻り、再試行できる。
        let (mut wf, _) = reviewing();
        wf.edit_target(0, TargetField::Table, "invoices".into())
            .unwrap();
        wf.edit_target(0, TargetField::Column, "invoice_number (string)".into())
            .unwrap();
        let (token, _) = wf.begin_confirm().unwrap();
        assert!(wf.apply_confirm_failure(token, "502 bad gateway".into()));
        assert_eq!(wf.phase(), Phase::Failed);
        assert_eq!(wf.acknowledge_failure(), Some(Phase::ReviewingMapping));

        // マッピングは失われていない。
        let session = wf.session().unwrap();
        assert_eq!(session.mappings.get(0).unwrap().target_table, "invoices");
        assert_eq!(session.status, SessionStatus::MappingPending);

        // そのまま確定をやり直せる。
        assert!(wf.begin_confirm().is_ok());
    }

    #[test]
    fn test_incomplete_mapping_blocks_confirm() {
        // 未選択エントリが残っている間は確定が拒否され、送信は始まらない。
        let (mut wf, _) = reviewing();
        assert!(!wf.can_confirm());
        assert!(wf.begin_confirm().is_err());
        assert_eq!(wf.phase(), Phase::ReviewingMapping);

        wf.edit_target(0, TargetField::Table, "invoices".into())
            .unwrap();
        wf.edit_target(0, TargetField::Column, "invoice_number (string)".into())
            .unwrap();
        assert!(wf.can_confirm());
    }

    #[test]
    fn test_backend_reported_failure_still_reaches_results() {
        // 行単位の失敗は例外ではなくデータとして結果表示に乗る。
        let (mut wf, _) = reviewing();
        wf.edit_target(0, TargetField::Table, "invoices".into())
            .unwrap();
        wf.edit_target(0, TargetField::Column, "invoice_number (string)".into())
            .unwrap();
        let (token, _) = wf.begin_confirm().unwrap();
        assert!(wf.apply_confirm_success(token, confirm_response("PartialSuccess")));
        assert_eq!(wf.phase(), Phase::ShowingResults);

        let session = wf.session().unwrap();
        assert_eq!(session.status, SessionStatus::PartialSuccess);
        let outcome = session.outcome.as_ref().unwrap();
        assert_eq!(outcome.stats.failed_records, 2);
        assert_eq!(outcome.stats.errors.len(), 1);

        // 閉じると次のアップロードに備えたIdleへ戻る。
        assert!(wf.close_results());
        assert_eq!(wf.phase(), Phase::Idle);
        assert!(wf.session().is_none());
    }

    #[test]
    fn test_end_to_end_confirmation_payload() {
        // アップロード→編集→確定で正規化済みペイロードができる一連の流れ。
        let (mut wf, _) = reviewing();
        wf.edit_target(0, TargetField::Table, "invoices".into())
            .unwrap();
        wf.edit_target(0, TargetField::Column, "invoice_number (string)".into())
            .unwrap();
        let (_, payload) = wf.begin_confirm().unwrap();
        assert_eq!(payload.file_upload_id, "42");
        assert_eq!(
            payload.mappings,
            vec![
                MappingRecord {
                    source_field: "Inv No".into(),
                    target_table: "invoices".into(),
                    target_column: "invoice_number".into(),
                },
                MappingRecord {
                    source_field: "Amt".into(),
                    target_table: "invoices".into(),
                    target_column: "total".into(),
                },
            ]
        );
    }

    #[test]
    fn test_status_label_parsing() {
        // ステータスラベルの揺れを吸収できることを検証する。
        assert_eq!(
            SessionStatus::from_label("PartialSuccess"),
            Some(SessionStatus::PartialSuccess)
        );
        assert_eq!(
            SessionStatus::from_label("completed"),
            Some(SessionStatus::Completed)
        );
        assert_eq!(
            SessionStatus::from_label("Failed"),
            Some(SessionStatus::Failed)
        );
        assert_eq!(
            SessionStatus::from_label("Processing"),
            Some(SessionStatus::Uploading)
        );
        assert_eq!(SessionStatus::from_label("???"), None);
    }
}
