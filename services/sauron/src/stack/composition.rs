/// スタック合成（コンポジションルート）
///
/// バケット、エコー関数、関数のIAMロールを常に作成し、
/// 設定に応じて保存クエリかステートマシンのどちらか一方を下流に接続する。
///
/// # 生成するリソース
/// - SauronLambdaBucket: S3バケット（削除・置換時も保持）
/// - SauronLambdaHandlerServiceRole: 関数の実行ロール
/// - SauronLambdaHandlerServiceRoleDefaultPolicy: バケットの読み書き権限
/// - SauronLambdaHandler: エコー関数（環境変数BUCKETにバケット名）
/// - ListLogsQuery: 関数ロググループへの保存クエリ（log-queryモード）
/// - SauronWorkflowRole / SauronWorkflow: 関数を呼び出すステートマシン（workflowモード）
use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::{debug, info};

use super::config::{DownstreamWiring, HandlerCode, StackConfig};
use super::error::StackError;
use super::intrinsic::{CfnValue, AWS_PARTITION};
use super::resource::{
    BucketProperties, FunctionCode, FunctionEnvironment, FunctionProperties, InlinePolicy,
    PolicyDocument, PolicyProperties, PolicyStatement, QueryDefinitionProperties, Resource,
    ResourceKind, RoleProperties, StateMachineProperties,
};
use super::template::{Output, Parameter, Template};

// 論理ID
pub const BUCKET_ID: &str = "SauronLambdaBucket";
pub const HANDLER_ID: &str = "SauronLambdaHandler";
pub const HANDLER_ROLE_ID: &str = "SauronLambdaHandlerServiceRole";
pub const HANDLER_POLICY_ID: &str = "SauronLambdaHandlerServiceRoleDefaultPolicy";
pub const QUERY_ID: &str = "ListLogsQuery";
pub const WORKFLOW_ID: &str = "SauronWorkflow";
pub const WORKFLOW_ROLE_ID: &str = "SauronWorkflowRole";

// テンプレートパラメータ
pub const CODE_BUCKET_PARAMETER: &str = "HandlerCodeBucket";
pub const CODE_KEY_PARAMETER: &str = "HandlerCodeKey";

/// カスタムランタイムのハンドラー名（実行ファイルはbootstrap）
pub const CUSTOM_RUNTIME_HANDLER: &str = "bootstrap";

/// 関数に渡すバケット名の環境変数
pub const BUCKET_ENV_VAR: &str = "BUCKET";

/// ステートマシン内の唯一のステート
pub const INVOKE_STATE_NAME: &str = "InvokeHandler";

/// DefinitionSubstitutionsで関数ARNを差し込むキー
const HANDLER_ARN_SUBSTITUTION: &str = "HandlerArn";

const LAMBDA_BASIC_EXECUTION_POLICY: &str = ":iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// バケットの読み書きに必要なS3アクション
pub const BUCKET_READ_WRITE_ACTIONS: [&str; 10] = [
    "s3:GetObject*",
    "s3:GetBucket*",
    "s3:List*",
    "s3:DeleteObject*",
    "s3:PutObject",
    "s3:PutObjectLegalHold",
    "s3:PutObjectRetention",
    "s3:PutObjectTagging",
    "s3:PutObjectVersionTagging",
    "s3:Abort*",
];

/// 設定からスタックのテンプレートを合成する
///
/// # 処理フロー
/// 1. 設定を検証
/// 2. バケット・関数・実行ロールを追加
/// 3. 下流（保存クエリまたはステートマシン）を追加
/// 4. 参照がすべて解決できることを検証
///
/// # エラー
/// - 設定値が不正な場合は`InvalidConfig`
/// - 論理IDの重複や未解決の参照がある場合はそれぞれのエラー
pub fn compose(config: &StackConfig) -> Result<Template, StackError> {
    config.validate()?;

    let mut template = Template::new(format!(
        "{}: echo function wired to {}",
        config.stack_name, config.downstream
    ));

    add_code_parameters(&mut template, &config.code)?;
    add_bucket(&mut template)?;
    add_handler(&mut template, config)?;

    match config.downstream {
        DownstreamWiring::LogQuery => add_log_query(&mut template, config)?,
        DownstreamWiring::Workflow => add_workflow(&mut template, config)?,
    }

    template.validate_references()?;

    info!(
        stack_name = %config.stack_name,
        downstream = %config.downstream,
        resource_count = template.resources().len(),
        "スタック合成完了"
    );

    Ok(template)
}

/// デプロイパッケージの場所をパラメータで受け取る場合はパラメータを宣言
fn add_code_parameters(template: &mut Template, code: &HandlerCode) -> Result<(), StackError> {
    if *code == HandlerCode::Parameters {
        template.add_parameter(
            CODE_BUCKET_PARAMETER,
            Parameter::string("S3 bucket holding the handler deployment package"),
        )?;
        template.add_parameter(
            CODE_KEY_PARAMETER,
            Parameter::string("S3 key of the handler deployment package (zip with bootstrap)"),
        )?;
    }
    Ok(())
}

fn add_bucket(template: &mut Template) -> Result<(), StackError> {
    template.add_resource(
        BUCKET_ID,
        Resource::new(ResourceKind::Bucket(BucketProperties::default())).retained(),
    )?;
    template.add_output(
        "BucketName",
        Output::new("Bucket granted to the handler", CfnValue::reference(BUCKET_ID)),
    )
}

/// 関数本体と実行ロール、バケット権限を追加
fn add_handler(template: &mut Template, config: &StackConfig) -> Result<(), StackError> {
    let role = RoleProperties {
        assume_role_policy_document: PolicyDocument::new(vec![PolicyStatement::assume_role_by(
            "lambda.amazonaws.com",
        )]),
        managed_policy_arns: vec![CfnValue::join(
            "",
            vec![
                CfnValue::literal("arn:"),
                CfnValue::reference(AWS_PARTITION),
                CfnValue::literal(LAMBDA_BASIC_EXECUTION_POLICY),
            ],
        )],
        policies: Vec::new(),
    };
    template.add_resource(HANDLER_ROLE_ID, Resource::new(ResourceKind::Role(role)))?;

    // バケット自体とバケット内の全オブジェクト
    let bucket_arn = CfnValue::get_att(BUCKET_ID, "Arn");
    let bucket_objects = CfnValue::join("", vec![bucket_arn.clone(), CfnValue::literal("/*")]);
    let policy = PolicyProperties {
        policy_name: HANDLER_POLICY_ID.to_string(),
        policy_document: PolicyDocument::new(vec![PolicyStatement::allow(
            BUCKET_READ_WRITE_ACTIONS,
            vec![bucket_arn, bucket_objects],
        )]),
        roles: vec![CfnValue::reference(HANDLER_ROLE_ID)],
    };
    template.add_resource(HANDLER_POLICY_ID, Resource::new(ResourceKind::Policy(policy)))?;

    let code = match &config.code {
        HandlerCode::Parameters => FunctionCode {
            s3_bucket: CfnValue::reference(CODE_BUCKET_PARAMETER),
            s3_key: CfnValue::reference(CODE_KEY_PARAMETER),
        },
        HandlerCode::S3 { bucket, key } => FunctionCode {
            s3_bucket: CfnValue::literal(bucket.as_str()),
            s3_key: CfnValue::literal(key.as_str()),
        },
    };

    let mut variables = BTreeMap::new();
    variables.insert(BUCKET_ENV_VAR.to_string(), CfnValue::reference(BUCKET_ID));

    let function = FunctionProperties {
        function_name: config.function_name.clone(),
        runtime: config.runtime.as_str().to_string(),
        handler: CUSTOM_RUNTIME_HANDLER.to_string(),
        architectures: vec![config.architecture.as_str().to_string()],
        code,
        role: CfnValue::get_att(HANDLER_ROLE_ID, "Arn"),
        memory_size: config.memory_size_mb,
        timeout: config.timeout_seconds,
        environment: FunctionEnvironment { variables },
    };

    // ポリシー適用前に関数が作成されないよう明示的に依存させる
    template.add_resource(
        HANDLER_ID,
        Resource::new(ResourceKind::Function(function))
            .depends_on([HANDLER_POLICY_ID, HANDLER_ROLE_ID]),
    )?;

    template.add_output(
        "HandlerArn",
        Output::new("Echo handler ARN", CfnValue::get_att(HANDLER_ID, "Arn")),
    )?;
    template.add_output(
        "HandlerLogGroupName",
        Output::new(
            "Log group receiving the handler's execution logs",
            CfnValue::literal(config.handler_log_group_name()),
        ),
    )
}

/// 関数ロググループへの保存クエリを追加
fn add_log_query(template: &mut Template, config: &StackConfig) -> Result<(), StackError> {
    debug!(log_group = %config.handler_log_group_name(), "保存クエリを接続");

    let query = QueryDefinitionProperties {
        name: config.query_name.clone(),
        query_string: config.query_string.clone(),
        log_group_names: vec![CfnValue::literal(config.handler_log_group_name())],
    };

    // ロググループは関数の作成後に存在するため、関数に依存させる
    template.add_resource(
        QUERY_ID,
        Resource::new(ResourceKind::QueryDefinition(query)).depends_on([HANDLER_ID]),
    )?;
    template.add_output(
        "QueryDefinitionId",
        Output::new("Saved log query id", CfnValue::reference(QUERY_ID)),
    )
}

/// 関数を1ステップとして呼び出すステートマシンを追加
fn add_workflow(template: &mut Template, config: &StackConfig) -> Result<(), StackError> {
    debug!(workflow_name = %config.workflow_name, "ステートマシンを接続");

    let handler_arn = CfnValue::get_att(HANDLER_ID, "Arn");
    // バージョン・エイリアス修飾付きARNも許可
    let qualified_arns = CfnValue::join("", vec![handler_arn.clone(), CfnValue::literal(":*")]);

    let role = RoleProperties {
        assume_role_policy_document: PolicyDocument::new(vec![PolicyStatement::assume_role_by(
            "states.amazonaws.com",
        )]),
        managed_policy_arns: Vec::new(),
        policies: vec![InlinePolicy {
            policy_name: "InvokeHandler".to_string(),
            policy_document: PolicyDocument::new(vec![PolicyStatement::allow(
                ["lambda:InvokeFunction"],
                vec![handler_arn.clone(), qualified_arns],
            )]),
        }],
    };
    template.add_resource(WORKFLOW_ROLE_ID, Resource::new(ResourceKind::Role(role)))?;

    let mut substitutions = BTreeMap::new();
    substitutions.insert(HANDLER_ARN_SUBSTITUTION.to_string(), handler_arn);

    let state_machine = StateMachineProperties {
        state_machine_name: config.workflow_name.clone(),
        role_arn: CfnValue::get_att(WORKFLOW_ROLE_ID, "Arn"),
        definition: workflow_definition(),
        definition_substitutions: substitutions,
    };
    template.add_resource(
        WORKFLOW_ID,
        Resource::new(ResourceKind::StateMachine(state_machine)).depends_on([WORKFLOW_ROLE_ID]),
    )?;

    template.add_output(
        "WorkflowArn",
        Output::new("State machine invoking the handler", CfnValue::reference(WORKFLOW_ID)),
    )
}

/// ステートマシン定義（Amazon States Language）
///
/// 入力をそのまま関数に渡し、関数のレスポンスをワークフローの出力とする。
pub fn workflow_definition() -> Value {
    json!({
        "Comment": "Invoke the echo handler once and return its response",
        "StartAt": INVOKE_STATE_NAME,
        "States": {
            INVOKE_STATE_NAME: {
                "Type": "Task",
                "Resource": "arn:aws:states:::lambda:invoke",
                "Parameters": {
                    "FunctionName": format!("${{{}}}", HANDLER_ARN_SUBSTITUTION),
                    "Payload.$": "$"
                },
                "OutputPath": "$.Payload",
                "End": true
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::config::{Architecture, HandlerRuntime};

    fn workflow_config() -> StackConfig {
        StackConfig {
            downstream: DownstreamWiring::Workflow,
            ..StackConfig::default()
        }
    }

    fn to_json(template: &Template) -> Value {
        serde_json::to_value(template).unwrap()
    }

    // ==================== 共通リソース ====================

    #[test]
    fn test_default_log_query_resource_set() {
        let template = compose(&StackConfig::default()).unwrap();
        let ids: Vec<&str> = template.resources().keys().map(String::as_str).collect();

        assert_eq!(
            ids,
            vec![
                QUERY_ID,
                BUCKET_ID,
                HANDLER_ID,
                HANDLER_ROLE_ID,
                HANDLER_POLICY_ID,
            ]
        );
    }

    #[test]
    fn test_workflow_resource_set() {
        let template = compose(&workflow_config()).unwrap();
        let ids: Vec<&str> = template.resources().keys().map(String::as_str).collect();

        assert_eq!(
            ids,
            vec![
                BUCKET_ID,
                HANDLER_ID,
                HANDLER_ROLE_ID,
                HANDLER_POLICY_ID,
                WORKFLOW_ID,
                WORKFLOW_ROLE_ID,
            ]
        );
    }

    // 2つの下流は同時に有効にならない
    #[test]
    fn test_downstream_variants_are_exclusive() {
        let log_query = compose(&StackConfig::default()).unwrap();
        assert_eq!(log_query.logical_ids_of_type("AWS::Logs::QueryDefinition").len(), 1);
        assert!(log_query
            .logical_ids_of_type("AWS::StepFunctions::StateMachine")
            .is_empty());
        assert!(log_query.outputs().contains_key("QueryDefinitionId"));
        assert!(!log_query.outputs().contains_key("WorkflowArn"));

        let workflow = compose(&workflow_config()).unwrap();
        assert!(workflow
            .logical_ids_of_type("AWS::Logs::QueryDefinition")
            .is_empty());
        assert_eq!(workflow.logical_ids_of_type("AWS::StepFunctions::StateMachine").len(), 1);
        assert!(workflow.outputs().contains_key("WorkflowArn"));
        assert!(!workflow.outputs().contains_key("QueryDefinitionId"));
    }

    #[test]
    fn test_bucket_is_retained() {
        let json = to_json(&compose(&StackConfig::default()).unwrap());
        let bucket = &json["Resources"][BUCKET_ID];

        assert_eq!(bucket["Type"], "AWS::S3::Bucket");
        assert_eq!(bucket["DeletionPolicy"], "Retain");
        assert_eq!(bucket["UpdateReplacePolicy"], "Retain");
    }

    #[test]
    fn test_handler_properties() {
        let json = to_json(&compose(&StackConfig::default()).unwrap());
        let handler = &json["Resources"][HANDLER_ID];

        assert_eq!(handler["Type"], "AWS::Lambda::Function");
        let props = &handler["Properties"];
        assert_eq!(props["FunctionName"], "SauronLambda");
        assert_eq!(props["Runtime"], "provided.al2023");
        assert_eq!(props["Handler"], "bootstrap");
        assert_eq!(props["Architectures"], json!(["arm64"]));
        assert_eq!(props["MemorySize"], 128);
        assert_eq!(props["Timeout"], 3);
        assert_eq!(
            props["Environment"]["Variables"]["BUCKET"],
            json!({"Ref": BUCKET_ID})
        );
        assert_eq!(
            props["Role"],
            json!({"Fn::GetAtt": [HANDLER_ROLE_ID, "Arn"]})
        );
        assert_eq!(
            handler["DependsOn"],
            json!([HANDLER_POLICY_ID, HANDLER_ROLE_ID])
        );
    }

    #[test]
    fn test_handler_runtime_and_architecture_from_config() {
        let config = StackConfig {
            runtime: HandlerRuntime::ProvidedAl2,
            architecture: Architecture::X86_64,
            memory_size_mb: 512,
            timeout_seconds: 30,
            ..StackConfig::default()
        };
        let json = to_json(&compose(&config).unwrap());
        let props = &json["Resources"][HANDLER_ID]["Properties"];

        assert_eq!(props["Runtime"], "provided.al2");
        assert_eq!(props["Architectures"], json!(["x86_64"]));
        assert_eq!(props["MemorySize"], 512);
        assert_eq!(props["Timeout"], 30);
    }

    #[test]
    fn test_code_from_parameters_by_default() {
        let template = compose(&StackConfig::default()).unwrap();
        let json = to_json(&template);

        assert!(template.parameters().contains_key(CODE_BUCKET_PARAMETER));
        assert!(template.parameters().contains_key(CODE_KEY_PARAMETER));
        assert_eq!(
            json["Resources"][HANDLER_ID]["Properties"]["Code"],
            json!({
                "S3Bucket": {"Ref": CODE_BUCKET_PARAMETER},
                "S3Key": {"Ref": CODE_KEY_PARAMETER}
            })
        );
    }

    #[test]
    fn test_explicit_code_location_has_no_parameters() {
        let config = StackConfig {
            code: HandlerCode::S3 {
                bucket: "artifacts".to_string(),
                key: "echo/bootstrap.zip".to_string(),
            },
            ..StackConfig::default()
        };
        let template = compose(&config).unwrap();
        let json = to_json(&template);

        assert!(template.parameters().is_empty());
        assert!(json.get("Parameters").is_none());
        assert_eq!(
            json["Resources"][HANDLER_ID]["Properties"]["Code"],
            json!({"S3Bucket": "artifacts", "S3Key": "echo/bootstrap.zip"})
        );
    }

    #[test]
    fn test_bucket_read_write_grant() {
        let json = to_json(&compose(&StackConfig::default()).unwrap());
        let policy = &json["Resources"][HANDLER_POLICY_ID]["Properties"];

        assert_eq!(policy["Roles"], json!([{"Ref": HANDLER_ROLE_ID}]));

        let statement = &policy["PolicyDocument"]["Statement"][0];
        assert_eq!(statement["Effect"], "Allow");
        assert_eq!(statement["Action"], json!(BUCKET_READ_WRITE_ACTIONS));
        assert_eq!(
            statement["Resource"],
            json!([
                {"Fn::GetAtt": [BUCKET_ID, "Arn"]},
                {"Fn::Join": ["", [{"Fn::GetAtt": [BUCKET_ID, "Arn"]}, "/*"]]}
            ])
        );
    }

    #[test]
    fn test_handler_role_uses_basic_execution_policy() {
        let json = to_json(&compose(&StackConfig::default()).unwrap());
        let role = &json["Resources"][HANDLER_ROLE_ID]["Properties"];

        assert_eq!(
            role["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]["Service"],
            "lambda.amazonaws.com"
        );
        assert_eq!(
            role["ManagedPolicyArns"],
            json!([{"Fn::Join": ["", [
                "arn:",
                {"Ref": "AWS::Partition"},
                ":iam::aws:policy/service-role/AWSLambdaBasicExecutionRole"
            ]]}])
        );
    }

    // ==================== log-queryモード ====================

    #[test]
    fn test_log_query_targets_handler_log_group() {
        let json = to_json(&compose(&StackConfig::default()).unwrap());
        let query = &json["Resources"][QUERY_ID];

        assert_eq!(query["Type"], "AWS::Logs::QueryDefinition");
        assert_eq!(query["Properties"]["Name"], "ListLogs");
        assert_eq!(
            query["Properties"]["QueryString"],
            "fields @timestamp, @message | sort @timestamp desc"
        );
        assert_eq!(
            query["Properties"]["LogGroupNames"],
            json!(["/aws/lambda/SauronLambda"])
        );
        assert_eq!(query["DependsOn"], json!([HANDLER_ID]));
    }

    #[test]
    fn test_log_query_follows_function_name() {
        let config = StackConfig {
            function_name: "echo-dev".to_string(),
            ..StackConfig::default()
        };
        let json = to_json(&compose(&config).unwrap());

        assert_eq!(
            json["Resources"][QUERY_ID]["Properties"]["LogGroupNames"],
            json!(["/aws/lambda/echo-dev"])
        );
        assert_eq!(json["Outputs"]["HandlerLogGroupName"]["Value"], "/aws/lambda/echo-dev");
    }

    // ==================== workflowモード ====================

    #[test]
    fn test_workflow_invokes_handler() {
        let json = to_json(&compose(&workflow_config()).unwrap());
        let workflow = &json["Resources"][WORKFLOW_ID];

        assert_eq!(workflow["Type"], "AWS::StepFunctions::StateMachine");
        let props = &workflow["Properties"];
        assert_eq!(props["StateMachineName"], "SauronWorkflow");
        assert_eq!(
            props["RoleArn"],
            json!({"Fn::GetAtt": [WORKFLOW_ROLE_ID, "Arn"]})
        );
        assert_eq!(
            props["DefinitionSubstitutions"]["HandlerArn"],
            json!({"Fn::GetAtt": [HANDLER_ID, "Arn"]})
        );

        let state = &props["Definition"]["States"][INVOKE_STATE_NAME];
        assert_eq!(props["Definition"]["StartAt"], INVOKE_STATE_NAME);
        assert_eq!(state["Type"], "Task");
        assert_eq!(state["Resource"], "arn:aws:states:::lambda:invoke");
        assert_eq!(state["Parameters"]["FunctionName"], "${HandlerArn}");
        assert_eq!(state["Parameters"]["Payload.$"], "$");
        assert_eq!(state["OutputPath"], "$.Payload");
        assert_eq!(state["End"], true);
    }

    #[test]
    fn test_workflow_role_can_invoke_handler() {
        let json = to_json(&compose(&workflow_config()).unwrap());
        let role = &json["Resources"][WORKFLOW_ROLE_ID]["Properties"];

        assert_eq!(
            role["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]["Service"],
            "states.amazonaws.com"
        );
        let statement = &role["Policies"][0]["PolicyDocument"]["Statement"][0];
        assert_eq!(statement["Action"], json!(["lambda:InvokeFunction"]));
        assert_eq!(statement["Resource"][0], json!({"Fn::GetAtt": [HANDLER_ID, "Arn"]}));
    }

    // ==================== 検証・決定性 ====================

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = StackConfig {
            function_name: "not valid!".to_string(),
            ..StackConfig::default()
        };

        assert!(matches!(compose(&config), Err(StackError::InvalidConfig(_))));
    }

    #[test]
    fn test_composition_is_deterministic() {
        let first = compose(&workflow_config()).unwrap().to_json_pretty().unwrap();
        let second = compose(&workflow_config()).unwrap().to_json_pretty().unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_all_references_resolve() {
        for config in [StackConfig::default(), workflow_config()] {
            let template = compose(&config).unwrap();
            assert!(template.validate_references().is_ok());
        }
    }

    #[test]
    fn test_rendered_template_header() {
        let rendered = compose(&StackConfig::default()).unwrap().to_json_pretty().unwrap();
        let parsed: Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(parsed["AWSTemplateFormatVersion"], "2010-09-09");
        assert_eq!(
            parsed["Description"],
            "SauronStack: echo function wired to log-query"
        );
    }
}
