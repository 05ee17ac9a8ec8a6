/// CloudFormation property values
///
/// A property is either a literal string or one of the intrinsic functions
/// the stack needs to wire resources together (`Ref`, `Fn::GetAtt`,
/// `Fn::Join`).
use serde::Serialize;

/// Pseudo parameter holding the partition of the target region (`aws`, `aws-cn`, ...)
pub const AWS_PARTITION: &str = "AWS::Partition";

/// Prefix shared by all CloudFormation pseudo parameters
pub const PSEUDO_PARAMETER_PREFIX: &str = "AWS::";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CfnValue {
    /// Plain string
    Literal(String),

    /// `{"Ref": "<LogicalId>"}`
    Ref {
        #[serde(rename = "Ref")]
        logical_id: String,
    },

    /// `{"Fn::GetAtt": ["<LogicalId>", "<Attribute>"]}`
    GetAtt {
        #[serde(rename = "Fn::GetAtt")]
        target: (String, String),
    },

    /// `{"Fn::Join": ["<sep>", [...]]}`
    Join {
        #[serde(rename = "Fn::Join")]
        parts: (String, Vec<CfnValue>),
    },
}

impl CfnValue {
    pub fn literal(value: impl Into<String>) -> Self {
        CfnValue::Literal(value.into())
    }

    pub fn reference(logical_id: impl Into<String>) -> Self {
        CfnValue::Ref {
            logical_id: logical_id.into(),
        }
    }

    pub fn get_att(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        CfnValue::GetAtt {
            target: (logical_id.into(), attribute.into()),
        }
    }

    pub fn join(separator: impl Into<String>, values: Vec<CfnValue>) -> Self {
        CfnValue::Join {
            parts: (separator.into(), values),
        }
    }

    /// Logical ids this value points at, including nested `Fn::Join` parts
    pub fn targets(&self) -> Vec<&str> {
        match self {
            CfnValue::Literal(_) => Vec::new(),
            CfnValue::Ref { logical_id } => vec![logical_id.as_str()],
            CfnValue::GetAtt { target } => vec![target.0.as_str()],
            CfnValue::Join { parts } => parts.1.iter().flat_map(CfnValue::targets).collect(),
        }
    }
}

impl From<&str> for CfnValue {
    fn from(value: &str) -> Self {
        CfnValue::literal(value)
    }
}

impl From<String> for CfnValue {
    fn from(value: String) -> Self {
        CfnValue::Literal(value)
    }
}

/// Whether a logical id names a pseudo parameter such as `AWS::Region`
pub fn is_pseudo_parameter(logical_id: &str) -> bool {
    logical_id.starts_with(PSEUDO_PARAMETER_PREFIX)
}
