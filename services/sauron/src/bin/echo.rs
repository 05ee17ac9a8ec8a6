/// エコーLambdaエントリポイント
///
/// `{"body": "..."}`形式のペイロードを受け取り、
/// `{"statusCode": 200|404, "body": "..."}`を返却する。
/// bodyが欠落している場合はエラーを返し、呼び出し失敗として扱わせる。
use lambda_runtime::{service_fn, Error, LambdaEvent};
use sauron::application::EchoHandler;
use sauron::infrastructure::init_logging;
use serde_json::Value;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // 構造化ログを初期化
    init_logging();

    info!("エコーLambda関数を初期化");

    lambda_runtime::run(service_fn(handler)).await
}

/// Lambda関数のメインハンドラー
///
/// # 処理フロー
/// 1. ペイロードからbodyを取り出す
/// 2. EchoHandlerでステータスを決定
/// 3. レスポンスをJSONにして返却（失敗時はエラーをそのまま返す）
async fn handler(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let (payload, context) = event.into_parts();

    match EchoHandler::new().handle_payload(&payload) {
        Ok(response) => Ok(serde_json::to_value(response)?),
        Err(err) => {
            warn!(request_id = %context.request_id, error = %err, "不正なペイロード");
            Err(Error::from(err))
        }
    }
}
