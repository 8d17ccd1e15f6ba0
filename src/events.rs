//! 画面遷移用のUI状態と画面種別。

use crate::api::dashboard::{DashboardOverview, RecentUpload, SummaryTable};

/// TUIで現在表示中の画面。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Screen {
    /// ファイルの選択とアップロード開始画面。
    Upload,
    /// 提案マッピングの確認・編集画面。
    Mapping,
    /// 処理結果の表示画面。
    Results,
    /// アップロード履歴のダッシュボード画面。
    Dashboard,
}

/// 描画側と共有するUI状態。
#[derive(Clone, Debug)]
pub struct UiState {
    /// 現在の画面。
    pub screen: Screen,
    /// 一覧系画面の選択行。
    pub selected: usize,
    /// 右側パネルに表示するログ。
    pub log: Vec<String>,
    /// 画面下部のステータス文言。
    pub status: String,
    /// エラーメッセージ（強調表示用）。
    pub error: Option<String>,
}

/// ダッシュボード画面専用の状態。
#[derive(Clone, Debug, Default)]
pub struct DashboardState {
    /// 最後に取得した集計と履歴（取得前はNone）。
    pub overview: Option<DashboardOverview>,
    /// 履歴テーブルの絞り込み文字列。
    pub filter: String,
    /// 集計の取得中フラグ。
    pub loading: bool,
    /// 取得待ちの処理サマリのファイルID。
    pub summary_loading: Option<String>,
    /// 表示中の処理サマリポップアップ。
    pub summary: Option<SummaryView>,
}

/// 1ファイル分の処理サマリポップアップ。
#[derive(Clone, Debug)]
pub struct SummaryView {
    /// 対象ファイルのID。
    pub file_id: String,
    /// 種別ごとのテーブル（定義順）。
    pub tables: Vec<SummaryTable>,
    /// アクティブなタブ位置。
    pub active: usize,
}

impl SummaryView {
    /// 次のタブへ循環移動する。
    pub fn next_tab(&mut self) {
        if !self.tables.is_empty() {
            self.active = (self.active + 1) % self.tables.len();
        }
    }

    /// アクティブなテーブルを返す。
    pub fn active_table(&self) -> Option<&SummaryTable> {
        self.tables.get(self.active)
    }
}

impl DashboardState {
    /// 絞り込み後の履歴行を返す。
    ///
    /// ファイル名・ステータス・ID・処理件数のいずれかに部分一致すれば残す。
    pub fn filtered_uploads(&self) -> Vec<&RecentUpload> {
        let Some(overview) = &self.overview else {
            return vec![];
        };
        let needle = self.filter.trim().to_lowercase();
        overview
            .recent_uploads
            .iter()
            .filter(|u| {
                needle.is_empty()
                    || u.filename.to_lowercase().contains(&needle)
                    || u.status.to_lowercase().contains(&needle)
                    || u.file_upload_id.contains(&needle)
                    || u.records_processed.to_string().contains(&needle)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2行の履歴を持つダッシュボード状態を作る。
    fn dashboard() -> DashboardState {
        let overview: DashboardOverview = serde_json::from_value(serde_json::json!({
            "recent_uploads": [
                {"file_upload_id": 1, "filename": "invoices.csv", "status": "Completed",
                 "records_processed": 120},
                {"file_upload_id": 2, "filename": "vendors.xlsx", "status": "Failed",
                 "records_processed": 0}
            ]
        }))
        .expect("overview json");
        DashboardState {
            overview: Some(overview),
            ..DashboardState::default()
        }
    }

    #[test]
    fn test_empty_filter_keeps_all_rows() {
        // 絞り込みが空なら全行を返す。
        assert_eq!(dashboard().filtered_uploads().len(), 2);
    }

    #[test]
    fn test_filter_matches_each_field() {
        // ファイル名・ステータス・ID・件数のどれでも一致する。
        let mut d = dashboard();
        d.filter = "vend".into();
        assert_eq!(d.filtered_uploads()[0].filename, "vendors.xlsx");
        d.filter = "COMPLETED".into();
        assert_eq!(d.filtered_uploads()[0].filename, "invoices.csv");
        d.filter = "120".into();
        assert_eq!(d.filtered_uploads().len(), 1);
        d.filter = "zzz".into();
        assert!(d.filtered_uploads().is_empty());
    }

    #[test]
    fn test_summary_tab_cycles() {
        // タブ移動が末尾で先頭へ戻ることを検証する。
        use crate::api::dashboard::{SummaryKind, SummaryTable};
        let mut view = SummaryView {
            file_id: "1".into(),
            tables: vec![
                SummaryTable {
                    kind: SummaryKind::Invoices,
                    rows: vec![],
                },
                SummaryTable {
                    kind: SummaryKind::Vendors,
                    rows: vec![],
                },
            ],
            active: 0,
        };
        view.next_tab();
        assert_eq!(view.active, 1);
        view.next_tab();
        assert_eq!(view.active, 0);
    }
}
