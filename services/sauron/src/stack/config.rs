/// スタック合成設定
///
/// スタックを構成するリソース名、下流の接続先、ハンドラーのランタイムを保持する。
/// デフォルト値は既存デプロイと同じリソース名を再現する。
///
/// # 環境変数
/// - SAURON_STACK_NAME: スタック名（デフォルト: SauronStack）
/// - SAURON_FUNCTION_NAME: Lambda関数名（デフォルト: SauronLambda）
/// - SAURON_DOWNSTREAM: 下流の接続先 `log-query` / `workflow`（デフォルト: log-query）
/// - SAURON_RUNTIME: `provided.al2023` / `provided.al2`（デフォルト: provided.al2023）
/// - SAURON_ARCHITECTURE: `arm64` / `x86_64`（デフォルト: arm64）
/// - SAURON_MEMORY_SIZE: メモリサイズMB（デフォルト: 128）
/// - SAURON_TIMEOUT: タイムアウト秒（デフォルト: 3）
/// - SAURON_CODE_BUCKET / SAURON_CODE_KEY: デプロイパッケージの場所（両方指定、または両方省略）
/// - SAURON_QUERY_NAME: 保存クエリ名（デフォルト: ListLogs）
/// - SAURON_QUERY_STRING: 保存クエリ文字列
/// - SAURON_WORKFLOW_NAME: ステートマシン名（デフォルト: SauronWorkflow）
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub const DEFAULT_STACK_NAME: &str = "SauronStack";
pub const DEFAULT_FUNCTION_NAME: &str = "SauronLambda";
pub const DEFAULT_QUERY_NAME: &str = "ListLogs";
pub const DEFAULT_QUERY_STRING: &str = "fields @timestamp, @message | sort @timestamp desc";
pub const DEFAULT_WORKFLOW_NAME: &str = "SauronWorkflow";
pub const DEFAULT_MEMORY_SIZE_MB: u32 = 128;
pub const DEFAULT_TIMEOUT_SECONDS: u32 = 3;

const MIN_MEMORY_SIZE_MB: u32 = 128;
const MAX_MEMORY_SIZE_MB: u32 = 10240;
const MAX_TIMEOUT_SECONDS: u32 = 900;
const MAX_FUNCTION_NAME_LEN: usize = 64;
const MAX_STACK_NAME_LEN: usize = 128;
const MAX_WORKFLOW_NAME_LEN: usize = 80;

/// スタック設定のエラー型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidEnvVar { name: String, reason: String },

    #[error("Invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// 列挙値の文字列解析エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}', expected one of: {expected}")]
pub struct ParseVariantError {
    kind: &'static str,
    value: String,
    expected: &'static str,
}

/// ハンドラーの下流に接続するリソース
///
/// 1つのスタックで有効になるのはどちらか一方のみ。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DownstreamWiring {
    /// ハンドラーのロググループに対する保存クエリ
    #[default]
    LogQuery,
    /// ハンドラーを1ステップとして呼び出すステートマシン
    Workflow,
}

impl DownstreamWiring {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownstreamWiring::LogQuery => "log-query",
            DownstreamWiring::Workflow => "workflow",
        }
    }
}

impl FromStr for DownstreamWiring {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "log-query" => Ok(DownstreamWiring::LogQuery),
            "workflow" => Ok(DownstreamWiring::Workflow),
            other => Err(ParseVariantError {
                kind: "downstream",
                value: other.to_string(),
                expected: "log-query, workflow",
            }),
        }
    }
}

impl fmt::Display for DownstreamWiring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ハンドラーのLambdaランタイム（カスタムランタイムのみ）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HandlerRuntime {
    #[default]
    ProvidedAl2023,
    ProvidedAl2,
}

impl HandlerRuntime {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerRuntime::ProvidedAl2023 => "provided.al2023",
            HandlerRuntime::ProvidedAl2 => "provided.al2",
        }
    }
}

impl FromStr for HandlerRuntime {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "provided.al2023" => Ok(HandlerRuntime::ProvidedAl2023),
            "provided.al2" => Ok(HandlerRuntime::ProvidedAl2),
            other => Err(ParseVariantError {
                kind: "runtime",
                value: other.to_string(),
                expected: "provided.al2023, provided.al2",
            }),
        }
    }
}

impl fmt::Display for HandlerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ハンドラーの命令セットアーキテクチャ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Architecture {
    #[default]
    Arm64,
    X86_64,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Arm64 => "arm64",
            Architecture::X86_64 => "x86_64",
        }
    }
}

impl FromStr for Architecture {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "arm64" => Ok(Architecture::Arm64),
            "x86_64" => Ok(Architecture::X86_64),
            other => Err(ParseVariantError {
                kind: "architecture",
                value: other.to_string(),
                expected: "arm64, x86_64",
            }),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// デプロイパッケージ（bootstrapを含むzip）の場所
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HandlerCode {
    /// テンプレートパラメータ経由でデプロイ時に指定する
    #[default]
    Parameters,
    /// 固定のS3オブジェクト
    S3 { bucket: String, key: String },
}

/// スタック合成設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackConfig {
    pub stack_name: String,
    pub function_name: String,
    pub downstream: DownstreamWiring,
    pub runtime: HandlerRuntime,
    pub architecture: Architecture,
    pub memory_size_mb: u32,
    pub timeout_seconds: u32,
    pub code: HandlerCode,
    pub query_name: String,
    pub query_string: String,
    pub workflow_name: String,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            stack_name: DEFAULT_STACK_NAME.to_string(),
            function_name: DEFAULT_FUNCTION_NAME.to_string(),
            downstream: DownstreamWiring::default(),
            runtime: HandlerRuntime::default(),
            architecture: Architecture::default(),
            memory_size_mb: DEFAULT_MEMORY_SIZE_MB,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            code: HandlerCode::default(),
            query_name: DEFAULT_QUERY_NAME.to_string(),
            query_string: DEFAULT_QUERY_STRING.to_string(),
            workflow_name: DEFAULT_WORKFLOW_NAME.to_string(),
        }
    }
}

impl StackConfig {
    /// 環境変数から設定を読み込む
    ///
    /// 未設定・空文字の変数はデフォルト値を使う。
    pub fn from_env() -> Result<Self, StackConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意のキー検索関数から設定を読み込む
    ///
    /// `from_env`の実体。テストでは環境変数の代わりにマップを渡す。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StackConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // 空文字は未設定扱い
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let code = match (get("SAURON_CODE_BUCKET"), get("SAURON_CODE_KEY")) {
            (Some(bucket), Some(key)) => HandlerCode::S3 { bucket, key },
            (None, None) => HandlerCode::Parameters,
            (Some(_), None) => {
                return Err(StackConfigError::MissingEnvVar("SAURON_CODE_KEY".to_string()));
            }
            (None, Some(_)) => {
                return Err(StackConfigError::MissingEnvVar("SAURON_CODE_BUCKET".to_string()));
            }
        };

        Ok(Self {
            stack_name: get("SAURON_STACK_NAME").unwrap_or(defaults.stack_name),
            function_name: get("SAURON_FUNCTION_NAME").unwrap_or(defaults.function_name),
            downstream: parse_var("SAURON_DOWNSTREAM", get("SAURON_DOWNSTREAM"))?
                .unwrap_or(defaults.downstream),
            runtime: parse_var("SAURON_RUNTIME", get("SAURON_RUNTIME"))?
                .unwrap_or(defaults.runtime),
            architecture: parse_var("SAURON_ARCHITECTURE", get("SAURON_ARCHITECTURE"))?
                .unwrap_or(defaults.architecture),
            memory_size_mb: parse_var("SAURON_MEMORY_SIZE", get("SAURON_MEMORY_SIZE"))?
                .unwrap_or(defaults.memory_size_mb),
            timeout_seconds: parse_var("SAURON_TIMEOUT", get("SAURON_TIMEOUT"))?
                .unwrap_or(defaults.timeout_seconds),
            code,
            query_name: get("SAURON_QUERY_NAME").unwrap_or(defaults.query_name),
            query_string: get("SAURON_QUERY_STRING").unwrap_or(defaults.query_string),
            workflow_name: get("SAURON_WORKFLOW_NAME").unwrap_or(defaults.workflow_name),
        })
    }

    /// ハンドラーのロググループ名（Lambdaが自動作成する名前）
    pub fn handler_log_group_name(&self) -> String {
        format!("/aws/lambda/{}", self.function_name)
    }

    /// 設定値を検証する
    ///
    /// CloudFormation/各サービスの命名制約と数値範囲を確認する。
    pub fn validate(&self) -> Result<(), StackConfigError> {
        validate_stack_name(&self.stack_name)?;
        validate_function_name(&self.function_name)?;

        if !(MIN_MEMORY_SIZE_MB..=MAX_MEMORY_SIZE_MB).contains(&self.memory_size_mb) {
            return Err(invalid(
                "memory_size_mb",
                format!(
                    "{} is outside {}..={}",
                    self.memory_size_mb, MIN_MEMORY_SIZE_MB, MAX_MEMORY_SIZE_MB
                ),
            ));
        }

        if !(1..=MAX_TIMEOUT_SECONDS).contains(&self.timeout_seconds) {
            return Err(invalid(
                "timeout_seconds",
                format!("{} is outside 1..={}", self.timeout_seconds, MAX_TIMEOUT_SECONDS),
            ));
        }

        if let HandlerCode::S3 { bucket, key } = &self.code {
            if bucket.trim().is_empty() {
                return Err(invalid("code bucket", "must not be empty".to_string()));
            }
            if key.trim().is_empty() {
                return Err(invalid("code key", "must not be empty".to_string()));
            }
        }

        match self.downstream {
            DownstreamWiring::LogQuery => {
                if self.query_name.trim().is_empty() {
                    return Err(invalid("query_name", "must not be empty".to_string()));
                }
                if self.query_string.trim().is_empty() {
                    return Err(invalid("query_string", "must not be empty".to_string()));
                }
            }
            DownstreamWiring::Workflow => validate_workflow_name(&self.workflow_name)?,
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> StackConfigError {
    StackConfigError::InvalidValue { field, reason }
}

/// 環境変数の値を解析（未設定はNone）
fn parse_var<T>(name: &str, raw: Option<String>) -> Result<Option<T>, StackConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.map(|value| {
        value
            .trim()
            .parse::<T>()
            .map_err(|err| StackConfigError::InvalidEnvVar {
                name: name.to_string(),
                reason: err.to_string(),
            })
    })
    .transpose()
}

/// Lambda関数名: 1-64文字の英数字・ハイフン・アンダースコア
fn validate_function_name(name: &str) -> Result<(), StackConfigError> {
    if name.is_empty() || name.len() > MAX_FUNCTION_NAME_LEN {
        return Err(invalid(
            "function_name",
            format!("length must be 1..={}", MAX_FUNCTION_NAME_LEN),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(invalid(
            "function_name",
            format!("'{}' may only contain [A-Za-z0-9_-]", name),
        ));
    }
    Ok(())
}

/// スタック名: 英字で始まる1-128文字の英数字・ハイフン
fn validate_stack_name(name: &str) -> Result<(), StackConfigError> {
    if name.is_empty() || name.len() > MAX_STACK_NAME_LEN {
        return Err(invalid(
            "stack_name",
            format!("length must be 1..={}", MAX_STACK_NAME_LEN),
        ));
    }
    let starts_with_letter = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    if !starts_with_letter || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(invalid(
            "stack_name",
            format!("'{}' must start with a letter and contain only [A-Za-z0-9-]", name),
        ));
    }
    Ok(())
}

/// ステートマシン名: 1-80文字、空白や制御文字を含まない
fn validate_workflow_name(name: &str) -> Result<(), StackConfigError> {
    if name.is_empty() || name.chars().count() > MAX_WORKFLOW_NAME_LEN {
        return Err(invalid(
            "workflow_name",
            format!("length must be 1..={}", MAX_WORKFLOW_NAME_LEN),
        ));
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid(
            "workflow_name",
            format!("'{}' must not contain whitespace or control characters", name),
        ));
    }
    Ok(())
}
