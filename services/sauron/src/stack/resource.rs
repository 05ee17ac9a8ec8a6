/// CloudFormation resource model
///
/// Only the resource types and properties this stack emits are modelled.
/// Each property struct serializes to the exact CloudFormation shape.
use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::intrinsic::CfnValue;

/// IAM policy language version
pub const POLICY_VERSION: &str = "2012-10-17";

/// A resource entry under `Resources`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(flatten)]
    pub kind: ResourceKind,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<RetentionPolicy>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<RetentionPolicy>,
}

impl Resource {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            depends_on: Vec::new(),
            deletion_policy: None,
            update_replace_policy: None,
        }
    }

    /// Add explicit `DependsOn` edges
    pub fn depends_on<I, S>(mut self, logical_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on
            .extend(logical_ids.into_iter().map(Into::into));
        self
    }

    /// Keep the physical resource when the stack deletes or replaces it
    pub fn retained(mut self) -> Self {
        self.deletion_policy = Some(RetentionPolicy::Retain);
        self.update_replace_policy = Some(RetentionPolicy::Retain);
        self
    }

    /// CloudFormation type name, e.g. `AWS::S3::Bucket`
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Every logical id this resource points at, through properties or `DependsOn`
    pub fn references(&self) -> Vec<&str> {
        let mut targets = self.kind.references();
        targets.extend(self.depends_on.iter().map(String::as_str));
        targets
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RetentionPolicy {
    Retain,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "Type", content = "Properties")]
pub enum ResourceKind {
    #[serde(rename = "AWS::S3::Bucket")]
    Bucket(BucketProperties),

    #[serde(rename = "AWS::IAM::Role")]
    Role(RoleProperties),

    #[serde(rename = "AWS::IAM::Policy")]
    Policy(PolicyProperties),

    #[serde(rename = "AWS::Lambda::Function")]
    Function(FunctionProperties),

    #[serde(rename = "AWS::Logs::QueryDefinition")]
    QueryDefinition(QueryDefinitionProperties),

    #[serde(rename = "AWS::StepFunctions::StateMachine")]
    StateMachine(StateMachineProperties),
}

impl ResourceKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ResourceKind::Bucket(_) => "AWS::S3::Bucket",
            ResourceKind::Role(_) => "AWS::IAM::Role",
            ResourceKind::Policy(_) => "AWS::IAM::Policy",
            ResourceKind::Function(_) => "AWS::Lambda::Function",
            ResourceKind::QueryDefinition(_) => "AWS::Logs::QueryDefinition",
            ResourceKind::StateMachine(_) => "AWS::StepFunctions::StateMachine",
        }
    }

    fn references(&self) -> Vec<&str> {
        match self {
            ResourceKind::Bucket(_) => Vec::new(),
            ResourceKind::Role(props) => {
                let mut targets: Vec<&str> = props
                    .managed_policy_arns
                    .iter()
                    .flat_map(CfnValue::targets)
                    .collect();
                for policy in &props.policies {
                    targets.extend(policy.policy_document.references());
                }
                targets
            }
            ResourceKind::Policy(props) => {
                let mut targets = props.policy_document.references();
                targets.extend(props.roles.iter().flat_map(CfnValue::targets));
                targets
            }
            ResourceKind::Function(props) => {
                let mut targets = props.role.targets();
                targets.extend(props.code.s3_bucket.targets());
                targets.extend(props.code.s3_key.targets());
                targets.extend(
                    props
                        .environment
                        .variables
                        .values()
                        .flat_map(CfnValue::targets),
                );
                targets
            }
            ResourceKind::QueryDefinition(props) => props
                .log_group_names
                .iter()
                .flat_map(CfnValue::targets)
                .collect(),
            ResourceKind::StateMachine(props) => {
                let mut targets = props.role_arn.targets();
                targets.extend(
                    props
                        .definition_substitutions
                        .values()
                        .flat_map(CfnValue::targets),
                );
                targets
            }
        }
    }
}

// ==================== S3 ====================

/// The bucket takes every default: generated name, no extra configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BucketProperties {}

// ==================== IAM ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: &'static str,
    pub statement: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new(statement: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_VERSION,
            statement,
        }
    }

    fn references(&self) -> Vec<&str> {
        self.statement
            .iter()
            .flat_map(|s| s.resource.iter().flat_map(CfnValue::targets))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub effect: Effect,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<ServicePrincipal>,

    pub action: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<CfnValue>,
}

impl PolicyStatement {
    /// Trust statement letting an AWS service assume the role
    pub fn assume_role_by(service: impl Into<String>) -> Self {
        Self {
            effect: Effect::Allow,
            principal: Some(ServicePrincipal {
                service: service.into(),
            }),
            action: vec!["sts:AssumeRole".to_string()],
            resource: Vec::new(),
        }
    }

    pub fn allow<A, S>(actions: A, resource: Vec<CfnValue>) -> Self
    where
        A: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            effect: Effect::Allow,
            principal: None,
            action: actions.into_iter().map(Into::into).collect(),
            resource,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServicePrincipal {
    pub service: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InlinePolicy {
    pub policy_name: String,
    pub policy_document: PolicyDocument,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoleProperties {
    pub assume_role_policy_document: PolicyDocument,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub managed_policy_arns: Vec<CfnValue>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<InlinePolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyProperties {
    pub policy_name: String,
    pub policy_document: PolicyDocument,
    pub roles: Vec<CfnValue>,
}

// ==================== Lambda ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionProperties {
    pub function_name: String,
    pub runtime: String,
    pub handler: String,
    pub architectures: Vec<String>,
    pub code: FunctionCode,
    pub role: CfnValue,
    pub memory_size: u32,
    pub timeout: u32,
    pub environment: FunctionEnvironment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionCode {
    pub s3_bucket: CfnValue,
    pub s3_key: CfnValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionEnvironment {
    pub variables: BTreeMap<String, CfnValue>,
}

// ==================== CloudWatch Logs ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryDefinitionProperties {
    pub name: String,
    pub query_string: String,
    pub log_group_names: Vec<CfnValue>,
}

// ==================== Step Functions ====================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StateMachineProperties {
    pub state_machine_name: String,
    pub role_arn: CfnValue,
    /// Amazon States Language document
    pub definition: Value,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub definition_substitutions: BTreeMap<String, CfnValue>,
}
