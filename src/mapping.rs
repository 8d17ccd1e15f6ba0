//! 列マッピングの編集モデルと確定ペイロードの組み立て。

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::schema::SchemaCatalog;

/// 取り込み元1列→取り込み先1カラムの対応（ワイヤ形式と共通の三つ組）。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRecord {
    /// 取り込み元の列名（"Amount (decimal)" のような型付記を含むことがある）。
    #[serde(default)]
    pub source_field: String,
    /// 取り込み先テーブル名。未選択は空文字。
    #[serde(default)]
    pub target_table: String,
    /// 取り込み先カラム名（表示用の型付記を含む）。未選択は空文字。
    #[serde(default)]
    pub target_column: String,
}

impl MappingRecord {
    /// 取り込み先が両方選択済みか判定する。
    pub fn is_complete(&self) -> bool {
        !self.target_table.is_empty() && !self.target_column.is_empty()
    }
}

/// 編集対象となる取り込み先フィールド。
///
/// source_field は意図的に編集不可とする（自由入力の列名がバックエンドの
/// 列照合を壊すため、選択式の2フィールドのみ変更を許す）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetField {
    /// 取り込み先テーブル。
    Table,
    /// 取り込み先カラム。
    Column,
}

/// 1セッション分のマッピング一覧。検出列1つにつき1エントリ、検出順を保つ。
#[derive(Clone, Debug, Default)]
pub struct MappingSet {
    entries: Vec<MappingRecord>,
}

impl MappingSet {
    /// バックエンドの提案からマッピング一覧を組み立てる。
    ///
    /// 検出列ごとに source_field が一致する提案を採用し、無ければ空エントリを
    /// 作る。スキーマに存在しないテーブルを指す提案は、確定時に宙ぶらりんの
    /// 参照を送らないようここで空に戻す。
    pub fn from_suggestions(
        source_columns: &[String],
        suggested: &[MappingRecord],
        schema: &SchemaCatalog,
    ) -> Self {
        let entries = source_columns
            .iter()
            .map(|col| {
                let mut entry = suggested
                    .iter()
                    .find(|m| m.source_field == *col)
                    .cloned()
                    .unwrap_or_else(|| MappingRecord {
                        source_field: col.clone(),
                        ..MappingRecord::default()
                    });
                // 不正なテーブル参照は提案ごと破棄する。
                if !entry.target_table.is_empty() && !schema.contains_table(&entry.target_table) {
                    entry.target_table.clear();
                    entry.target_column.clear();
                }
                // テーブル未選択でカラムだけ残っている提案も無効。
                if entry.target_table.is_empty() {
                    entry.target_column.clear();
                }
                entry
            })
            .collect();
        Self { entries }
    }

    /// エントリ数を返す。
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// エントリが1件も無いか判定する。
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 指定位置のエントリを返す。
    pub fn get(&self, index: usize) -> Option<&MappingRecord> {
        self.entries.get(index)
    }

    /// 全エントリを検出順で返す。
    pub fn entries(&self) -> &[MappingRecord] {
        &self.entries
    }

    /// 指定エントリの取り込み先フィールドを1つ更新する。
    ///
    /// テーブルを変更した場合、旧テーブルに属するカラム選択は同じ更新の中で
    /// 必ず空へ戻す。確定処理が前テーブルのカラムを送ってしまうのを防ぐための
    /// 不変条件であり、省略できない。
    pub fn set_target(&mut self, index: usize, field: TargetField, value: String) -> Result<()> {
        let len = self.entries.len();
        let Some(entry) = self.entries.get_mut(index) else {
            bail!("mapping index {index} out of bounds (len {len})");
        };
        match field {
            TargetField::Table => {
                if entry.target_table != value {
                    entry.target_table = value;
                    entry.target_column.clear();
                }
            }
            TargetField::Column => {
                entry.target_column = value;
            }
        }
        Ok(())
    }

    /// 全エントリの取り込み先が埋まっているか判定する。
    ///
    /// 確定ボタンの有効化判定と build_confirmation 内の防御チェックの両方が
    /// この述語を使う（厳格ポリシー）。
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(MappingRecord::is_complete)
    }

    /// 取り込み先が未選択のエントリ数を返す。
    pub fn incomplete_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_complete()).count()
    }
}

/// 確定時にバックエンドへ送る正規化済みペイロード。
///
/// file_upload_id はURLパスに載せるためボディには含めない。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConfirmationPayload {
    /// 対象アップロードの識別子（シリアライズ対象外）。
    #[serde(skip)]
    pub file_upload_id: String,
    /// 型付記を取り除いたマッピング一覧。
    pub mappings: Vec<MappingRecord>,
}

/// 表示用の型付記 `\s*\([^)]*\)` をすべて取り除く。
///
/// 例: "amount (decimal)" → "amount"。付記の無い値はそのまま返す。
pub fn strip_annotation(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(open) = rest.find('(') {
        match rest[open..].find(')') {
            Some(close) => {
                // 括弧直前の空白ごと取り除く。
                out.push_str(rest[..open].trim_end());
                rest = &rest[open + close + 1..];
            }
            // 閉じ括弧の無い括弧は付記ではないので残す。
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// マッピング一覧から確定ペイロードを組み立てる。
///
/// 入力の純関数であり、同じ一覧からは常に同じペイロードが得られる。
/// 空の一覧と未選択エントリはここで拒否し、不正なデータは送信しない。
pub fn build_confirmation(file_upload_id: &str, set: &MappingSet) -> Result<ConfirmationPayload> {
    if set.is_empty() {
        bail!("no mappings to confirm");
    }
    if !set.is_complete() {
        bail!(
            "{} field(s) still unmapped; select a target table and column for every row",
            set.incomplete_count()
        );
    }
    let mappings = set
        .entries()
        .iter()
        .map(|e| MappingRecord {
            source_field: strip_annotation(&e.source_field),
            target_table: e.target_table.clone(),
            target_column: strip_annotation(&e.target_column),
        })
        .collect();
    Ok(ConfirmationPayload {
        file_upload_id: file_upload_id.to_string(),
        mappings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// invoicesテーブルだけを持つスキーマを作る。
    fn schema() -> SchemaCatalog {
        serde_json::from_value(serde_json::json!({
            "invoices": {"invoice_number": "string", "total": "decimal"}
        }))
        .expect("schema json")
    }

    /// 提案付きの2列マッピングを作る。
    fn seeded() -> MappingSet {
        let columns = vec!["Inv No".to_string(), "Amt (decimal)".to_string()];
        let suggested = vec![
            MappingRecord {
                source_field: "Inv No".into(),
                target_table: String::new(),
                target_column: String::new(),
            },
            MappingRecord {
                source_field: "Amt (decimal)".into(),
                target_table: "invoices".into(),
                target_column: "total (decimal)".into(),
            },
        ];
        MappingSet::from_suggestions(&columns, &suggested, &schema())
    }

    #[test]
    fn test_table_change_clears_column_same_index_only() {
        // テーブル変更が同一エントリのカラムだけを空へ戻すことを検証する。
        let mut set = seeded();
        set.set_target(1, TargetField::Table, "vendors".into())
            .unwrap();
        assert_eq!(set.get(1).unwrap().target_table, "vendors");
        assert_eq!(set.get(1).unwrap().target_column, "");
        // 他のエントリは無変更。
        assert_eq!(set.get(0).unwrap().source_field, "Inv No");
        assert_eq!(set.get(0).unwrap().target_table, "");
    }

    #[test]
    fn test_same_table_keeps_column() {
        // 同じテーブルを再選択してもカラムは保持される。
        let mut set = seeded();
        set.set_target(1, TargetField::Table, "invoices".into())
            .unwrap();
        assert_eq!(set.get(1).unwrap().target_column, "total (decimal)");
    }

    #[test]
    fn test_out_of_bounds_edit_is_error() {
        // 範囲外インデックスはエラーになる。
        let mut set = seeded();
        assert!(set.set_target(9, TargetField::Column, "x".into()).is_err());
    }

    #[test]
    fn test_suggestion_with_unknown_table_is_cleared() {
        // スキーマに無いテーブルを指す提案は空に戻される。
        let columns = vec!["Amt".to_string()];
        let suggested = vec![MappingRecord {
            source_field: "Amt".into(),
            target_table: "ledgers".into(),
            target_column: "total (decimal)".into(),
        }];
        let set = MappingSet::from_suggestions(&columns, &suggested, &schema());
        assert_eq!(set.get(0).unwrap().target_table, "");
        assert_eq!(set.get(0).unwrap().target_column, "");
    }

    #[test]
    fn test_strip_annotation() {
        // 型付記の除去規則を検証する。
        assert_eq!(strip_annotation("total (decimal)"), "total");
        assert_eq!(strip_annotation("name"), "name");
        assert_eq!(strip_annotation("a (x) b (y)"), "a b");
        // 閉じ括弧の無い値はそのまま。
        assert_eq!(strip_annotation("odd (value"), "odd (value");
    }

    #[test]
    fn test_build_strips_source_and_column_not_table() {
        // 付記除去が source/column のみに適用されることを検証する。
        let mut set = seeded();
        set.set_target(0, TargetField::Table, "invoices".into())
            .unwrap();
        set.set_target(0, TargetField::Column, "invoice_number (string)".into())
            .unwrap();
        let payload = build_confirmation("42", &set).unwrap();
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
    fn test_build_is_idempotent() {
        // 同じ一覧からは常に同一のペイロードが得られる。
        let mut set = seeded();
        set.set_target(0, TargetField::Table, "invoices".into())
            .unwrap();
        set.set_target(0, TargetField::Column, "invoice_number (string)".into())
            .unwrap();
        let a = build_confirmation("42", &set).unwrap();
        let b = build_confirmation("42", &set).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_incomplete_set_blocks_confirmation() {
        // 未選択エントリが1つでもあれば確定できず、埋まった瞬間に解除される。
        let mut set = seeded();
        assert!(!set.is_complete());
        assert_eq!(set.incomplete_count(), 1);
        assert!(build_confirmation("42", &set).is_err());

        set.set_target(0, TargetField::Table, "invoices".into())
            .unwrap();
        // テーブルだけではまだ不完全。
        assert!(!set.is_complete());
        set.set_target(0, TargetField::Column, "invoice_number (string)".into())
            .unwrap();
        assert!(set.is_complete());
        assert!(build_confirmation("42", &set).is_ok());
    }

    #[test]
    fn test_empty_set_is_rejected() {
        // 空の一覧は確定できない。
        let set = MappingSet::default();
        assert!(build_confirmation("42", &set).is_err());
    }

    #[test]
    fn test_payload_body_omits_upload_id() {
        // ボディには mappings のみが載る（idはURLパス側）。
        let mut set = seeded();
        set.set_target(0, TargetField::Table, "invoices".into())
            .unwrap();
        set.set_target(0, TargetField::Column, "invoice_number (string)".into())
            .unwrap();
        let payload = build_confirmation("42", &set).unwrap();
        let body = serde_json::to_value(&payload).unwrap();
        assert!(body.get("file_upload_id").is_none());
        assert_eq!(body["mappings"][1]["target_column"], "total");
    }
}
