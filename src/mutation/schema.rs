//! Payload schemas adapters publish for their create/delete endpoints.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationOp {
    Create,
    Delete,
}

impl MutationOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationOp::Create => "create",
            MutationOp::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    Text,
    Int,
    /// Array of strings, or a comma-separated string.
    TextList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: FieldType,
    pub required: bool,
}

impl FieldSpec {
    pub const fn text(name: &'static str) -> Self {
        Self { name, ty: FieldType::Text, required: true }
    }

    pub const fn int(name: &'static str) -> Self {
        Self { name, ty: FieldType::Int, required: true }
    }

    pub const fn list(name: &'static str) -> Self {
        Self { name, ty: FieldType::TextList, required: true }
    }

    pub const fn optional(self) -> Self {
        Self { required: false, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Shape {
    /// Coerced fields are sent as-is.
    Flat,
    /// `attributeName, attributeType, keySchema, provisionedThroughput` are folded
    /// into DynamoDB's nested create-table request.
    DynamoTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PayloadSchema {
    pub fields: &'static [FieldSpec],
    pub shape: Shape,
}

impl PayloadSchema {
    pub const fn flat(fields: &'static [FieldSpec]) -> Self {
        Self { fields, shape: Shape::Flat }
    }

    pub const fn dynamo_table(fields: &'static [FieldSpec]) -> Self {
        Self { fields, shape: Shape::DynamoTable }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}
