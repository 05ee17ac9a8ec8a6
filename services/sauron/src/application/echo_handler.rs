/// エコーハンドラー
///
/// 入力のbodyをそのまま返し、bodyが"erro"の場合のみステータスを404にする。
/// バケットへの読み書き権限は付与されているが、このハンドラーはアクセスしない。
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{EchoRequest, EchoResponse};

/// エコーハンドラーのエラー型
///
/// いずれも呼び出し失敗としてランタイムに返す。レスポンスには変換しない。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EchoHandlerError {
    /// ペイロードがJSONオブジェクトではない
    #[error("Payload must be a JSON object")]
    PayloadNotObject,
    /// bodyキーが存在しない
    #[error("Missing body in payload")]
    MissingBody,
    /// bodyが文字列ではない
    #[error("body must be a string, got {0}")]
    InvalidBody(&'static str),
}

/// エコーリクエストを処理するハンドラー
///
/// 状態を持たないため、同時実行される呼び出し間で共有するものはない。
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

impl EchoHandler {
    /// 新しいEchoHandlerを作成
    pub fn new() -> Self {
        Self
    }

    /// 型付きリクエストを処理
    ///
    /// # 処理フロー
    /// 1. bodyを読み取る
    /// 2. bodyが"erro"なら404、それ以外は200を選択
    /// 3. bodyを変更せずにレスポンスへコピー
    pub fn handle(&self, request: &EchoRequest) -> EchoResponse {
        let response = EchoResponse::for_request(request);

        info!(
            body_len = request.body.len(),
            status_code = response.status_code,
            "エコーリクエスト処理完了"
        );

        response
    }

    /// 生のLambdaペイロードを処理
    ///
    /// # 引数
    /// * `payload` - 呼び出しペイロード（少なくとも`body`キーを持つオブジェクト）
    ///
    /// # 戻り値
    /// * 成功時は`Ok(EchoResponse)`
    /// * `body`が欠落または文字列でない場合は`Err(EchoHandlerError)`
    pub fn handle_payload(&self, payload: &Value) -> Result<EchoResponse, EchoHandlerError> {
        let request = parse_request(payload)?;
        Ok(self.handle(&request))
    }
}

/// ペイロードからEchoRequestを抽出
///
/// 欠落と型不一致を区別するため、serdeの派生実装ではなく手動で取り出す。
fn parse_request(payload: &Value) -> Result<EchoRequest, EchoHandlerError> {
    let object = payload
        .as_object()
        .ok_or(EchoHandlerError::PayloadNotObject)?;

    let body = object.get("body").ok_or(EchoHandlerError::MissingBody)?;

    match body {
        Value::String(text) => Ok(EchoRequest::new(text.as_str())),
        other => {
            debug!(body_type = json_type_name(other), "bodyが文字列ではない");
            Err(EchoHandlerError::InvalidBody(json_type_name(other)))
        }
    }
}

/// JSON値の型名（エラーメッセージ用）
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
