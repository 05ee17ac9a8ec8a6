/// スタック合成のエラー型
use thiserror::Error;

use super::config::StackConfigError;

#[derive(Debug, Error)]
pub enum StackError {
    /// 同じ論理IDを二重に登録しようとした（上書きはしない）
    #[error("Duplicate logical id in {section}: {logical_id}")]
    DuplicateLogicalId {
        section: &'static str,
        logical_id: String,
    },

    /// 参照先のリソース・パラメータが存在しない
    #[error("{from} references unknown logical id {target}")]
    DanglingReference { from: String, target: String },

    /// 設定値が不正
    #[error("Invalid stack config: {0}")]
    InvalidConfig(#[from] StackConfigError),

    /// テンプレートのJSONシリアライズに失敗
    #[error("Failed to serialize template: {0}")]
    Serialize(#[from] serde_json::Error),
}
