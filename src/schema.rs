//! 取り込み先スキーマ（テーブル→カラム→型）の参照モデル。

use serde::Deserialize;
use std::collections::BTreeMap;

/// アップロード応答に同梱される取り込み先スキーマ。
///
/// 1回のアップロードセッション中は不変の参照データとして扱う。
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct SchemaCatalog {
    /// テーブル名→（カラム名→型ラベル）。BTreeMapで表示順を安定させる。
    tables: BTreeMap<String, BTreeMap<String, String>>,
}

impl SchemaCatalog {
    /// 選択可能なテーブル名を定義順（辞書順）で返す。
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// テーブルがスキーマに存在するか判定する。
    pub fn contains_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// 指定テーブルのカラムと型を返す。未知のテーブルは空列挙とする（エラーにしない）。
    pub fn columns_of(&self, table: &str) -> impl Iterator<Item = (&str, &str)> {
        self.tables
            .get(table)
            .into_iter()
            .flat_map(|cols| cols.iter().map(|(c, t)| (c.as_str(), t.as_str())))
    }

    /// カラム選択肢の表示ラベル（例: "total (decimal)"）を作る。
    ///
    /// 確定時には mapping::strip_annotation がこの付記を取り除く。
    pub fn column_labels(&self, table: &str) -> Vec<String> {
        self.columns_of(table)
            .map(|(col, ty)| format!("{col} ({ty})"))
            .collect()
    }

    /// テーブル数を返す。
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// 全テーブル合計のカラム数を返す。
    pub fn column_count(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// テスト用の小さなスキーマを組み立てる。
    fn catalog() -> SchemaCatalog {
        serde_json::from_value(serde_json::json!({
            "invoices": {"invoice_number": "string", "total": "decimal"},
            "vendors": {"name": "string"}
        }))
        .expect("schema json")
    }

    #[test]
    fn test_known_table_lookup() {
        // 既知テーブルのカラムと型を引けることを検証する。
        let c = catalog();
        let cols: Vec<_> = c.columns_of("invoices").collect();
        assert_eq!(
            cols,
            vec![("invoice_number", "string"), ("total", "decimal")]
        );
        assert!(c.contains_table("vendors"));
    }

    #[test]
    fn test_unknown_table_is_empty_not_error() {
        // 未知テーブルは空列挙になることを検証する。
        let c = catalog();
        assert_eq!(c.columns_of("payments").count(), 0);
        assert!(c.column_labels("payments").is_empty());
        assert!(!c.contains_table("payments"));
    }

    #[test]
    fn test_column_labels_carry_type_annotation() {
        // 表示ラベルに型付記が付くことを検証する。
        let c = catalog();
        assert_eq!(
            c.column_labels("invoices"),
            vec!["invoice_number (string)", "total (decimal)"]
        );
    }

    #[test]
    fn test_counts() {
        // テーブル数と総カラム数の集計を検証する。
        let c = catalog();
        assert_eq!(c.table_count(), 2);
        assert_eq!(c.column_count(), 3);
    }
}
