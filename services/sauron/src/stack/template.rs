/// CloudFormationテンプレート
///
/// 論理IDはソート済みマップで保持するため、同じ内容なら常に同じJSONになる。
/// 既存の論理IDへの追加はエラーとし、黙って上書きしない。
use std::collections::BTreeMap;

use serde::Serialize;

use super::error::StackError;
use super::intrinsic::{is_pseudo_parameter, CfnValue};
use super::resource::Resource;

/// テンプレート形式のバージョン（CloudFormationで唯一有効な値）
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// テンプレートパラメータ（デプロイ時にプロビジョニングツールが値を与える）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub parameter_type: String,
    pub description: String,
}

impl Parameter {
    /// String型パラメータを作成
    pub fn string(description: impl Into<String>) -> Self {
        Self {
            parameter_type: "String".to_string(),
            description: description.into(),
        }
    }
}

/// スタック出力
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub description: String,
    pub value: CfnValue,
}

impl Output {
    pub fn new(description: impl Into<String>, value: CfnValue) -> Self {
        Self {
            description: description.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    format_version: &'static str,

    #[serde(rename = "Description")]
    description: String,

    #[serde(rename = "Parameters", skip_serializing_if = "BTreeMap::is_empty")]
    parameters: BTreeMap<String, Parameter>,

    #[serde(rename = "Resources")]
    resources: BTreeMap<String, Resource>,

    #[serde(rename = "Outputs", skip_serializing_if = "BTreeMap::is_empty")]
    outputs: BTreeMap<String, Output>,
}

impl Template {
    /// 空のテンプレートを作成
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            format_version: TEMPLATE_FORMAT_VERSION,
            description: description.into(),
            parameters: BTreeMap::new(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// パラメータを追加
    pub fn add_parameter(
        &mut self,
        logical_id: impl Into<String>,
        parameter: Parameter,
    ) -> Result<(), StackError> {
        insert_unique(&mut self.parameters, "Parameters", logical_id.into(), parameter)
    }

    /// リソースを追加
    ///
    /// # エラー
    /// 同じ論理IDのリソースが既に存在する場合は`DuplicateLogicalId`
    pub fn add_resource(
        &mut self,
        logical_id: impl Into<String>,
        resource: Resource,
    ) -> Result<(), StackError> {
        insert_unique(&mut self.resources, "Resources", logical_id.into(), resource)
    }

    /// 出力を追加
    pub fn add_output(
        &mut self,
        logical_id: impl Into<String>,
        output: Output,
    ) -> Result<(), StackError> {
        insert_unique(&mut self.outputs, "Outputs", logical_id.into(), output)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    pub fn resources(&self) -> &BTreeMap<String, Resource> {
        &self.resources
    }

    pub fn parameters(&self) -> &BTreeMap<String, Parameter> {
        &self.parameters
    }

    pub fn outputs(&self) -> &BTreeMap<String, Output> {
        &self.outputs
    }

    /// 指定した型のリソースの論理ID一覧
    pub fn logical_ids_of_type(&self, type_name: &str) -> Vec<&str> {
        self.resources
            .iter()
            .filter(|(_, resource)| resource.type_name() == type_name)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// すべての参照（Ref / Fn::GetAtt / DependsOn）が解決できることを検証
    ///
    /// 参照先として有効なのはリソース、パラメータ、`AWS::`擬似パラメータのみ。
    pub fn validate_references(&self) -> Result<(), StackError> {
        let resource_refs = self
            .resources
            .iter()
            .flat_map(|(id, resource)| resource.references().into_iter().map(move |t| (id, t)));
        let output_refs = self
            .outputs
            .iter()
            .flat_map(|(id, output)| output.value.targets().into_iter().map(move |t| (id, t)));

        for (from, target) in resource_refs.chain(output_refs) {
            if !self.is_resolvable(target) {
                return Err(StackError::DanglingReference {
                    from: from.clone(),
                    target: target.to_string(),
                });
            }
        }

        Ok(())
    }

    fn is_resolvable(&self, target: &str) -> bool {
        is_pseudo_parameter(target)
            || self.resources.contains_key(target)
            || self.parameters.contains_key(target)
    }

    /// 整形済みJSONとして出力
    pub fn to_json_pretty(&self) -> Result<String, StackError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// 論理IDの重複を拒否して挿入
fn insert_unique<V>(
    map: &mut BTreeMap<String, V>,
    section: &'static str,
    logical_id: String,
    value: V,
) -> Result<(), StackError> {
    if map.contains_key(&logical_id) {
        return Err(StackError::DuplicateLogicalId {
            section,
            logical_id,
        });
    }
    map.insert(logical_id, value);
    Ok(())
}
