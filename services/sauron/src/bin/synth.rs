/// スタック合成CLI
///
/// 環境変数とコマンドライン引数からスタック設定を組み立て、
/// CloudFormationテンプレートを標準出力（または指定ファイル）に書き出す。
/// デプロイ自体はCloudFormation（またはそれを呼び出すツール）に任せる。
///
/// # ローカル実行
/// ```bash
/// # 既定のスタック（保存クエリ接続）
/// cargo run --bin synth > template.json
///
/// # ステートマシン接続に切り替え
/// cargo run --bin synth -- --downstream workflow --output template.json
///
/// # デプロイパッケージを固定
/// cargo run --bin synth -- --code-bucket my-artifacts --code-key echo/bootstrap.zip
/// ```
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sauron::infrastructure::init_cli_logging;
use sauron::stack::{
    compose, Architecture, DownstreamWiring, HandlerCode, HandlerRuntime, StackConfig,
    StackConfigError, StackError,
};
use tracing::{error, info};

/// コマンドライン引数（環境変数より優先される）
#[derive(Parser, Debug)]
#[command(name = "synth")]
#[command(about = "エコー関数スタックのCloudFormationテンプレートを生成")]
struct CliArgs {
    /// 下流の接続先（log-query / workflow）
    #[arg(long)]
    downstream: Option<DownstreamWiring>,

    /// スタック名
    #[arg(long)]
    stack_name: Option<String>,

    /// Lambda関数名
    #[arg(long)]
    function_name: Option<String>,

    /// Lambdaランタイム（provided.al2023 / provided.al2）
    #[arg(long)]
    runtime: Option<HandlerRuntime>,

    /// アーキテクチャ（arm64 / x86_64）
    #[arg(long)]
    architecture: Option<Architecture>,

    /// メモリサイズ（MB）
    #[arg(long)]
    memory_size: Option<u32>,

    /// タイムアウト（秒）
    #[arg(long)]
    timeout: Option<u32>,

    /// デプロイパッケージのS3バケット（--code-keyと併用）
    #[arg(long, requires = "code_key")]
    code_bucket: Option<String>,

    /// デプロイパッケージのS3キー（--code-bucketと併用）
    #[arg(long, requires = "code_bucket")]
    code_key: Option<String>,

    /// 出力先ファイル（省略時は標準出力）
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

impl CliArgs {
    /// 環境変数由来の設定に引数を上書き適用
    fn apply(&self, mut config: StackConfig) -> StackConfig {
        if let Some(downstream) = self.downstream {
            config.downstream = downstream;
        }
        if let Some(stack_name) = &self.stack_name {
            config.stack_name = stack_name.clone();
        }
        if let Some(function_name) = &self.function_name {
            config.function_name = function_name.clone();
        }
        if let Some(runtime) = self.runtime {
            config.runtime = runtime;
        }
        if let Some(architecture) = self.architecture {
            config.architecture = architecture;
        }
        if let Some(memory_size) = self.memory_size {
            config.memory_size_mb = memory_size;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_seconds = timeout;
        }
        if let (Some(bucket), Some(key)) = (&self.code_bucket, &self.code_key) {
            config.code = HandlerCode::S3 {
                bucket: bucket.clone(),
                key: key.clone(),
            };
        }
        config
    }
}

/// synthの失敗理由
#[derive(Debug, thiserror::Error)]
enum SynthError {
    #[error(transparent)]
    Config(#[from] StackConfigError),

    #[error(transparent)]
    Stack(#[from] StackError),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn main() -> ExitCode {
    init_cli_logging();

    let args = CliArgs::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "テンプレート生成に失敗");
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs) -> Result<(), SynthError> {
    let config = args.apply(StackConfig::from_env()?);
    let rendered = render(&config)?;

    match &args.output {
        Some(path) => {
            fs::write(path, format!("{}\n", rendered)).map_err(|source| SynthError::Write {
                path: path.clone(),
                source,
            })?;
            info!(path = %path.display(), "テンプレートを書き出し");
        }
        None => println!("{}", rendered),
    }

    Ok(())
}

/// 設定からテンプレートJSONを生成
fn render(config: &StackConfig) -> Result<String, StackError> {
    compose(config)?.to_json_pretty()
}
