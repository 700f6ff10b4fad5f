use serde_json::{json, Map, Value};

use super::schema::{FieldSpec, FieldType, PayloadSchema, Shape};
use crate::error::AppError;

/// Validate loosely-typed input against `schema`. Only schema fields survive;
/// empty strings and nulls count as absent.
pub fn coerce(schema: &PayloadSchema, params: &Map<String, Value>) -> Result<Map<String, Value>, AppError> {
    let mut out = Map::new();

    for spec in schema.fields {
        let value = params.get(spec.name).filter(|v| !is_blank(v));
        match value {
            Some(value) => {
                out.insert(spec.name.to_string(), coerce_field(spec, value)?);
            }
            None if spec.required => {
                return Err(AppError::validation(spec.name, "is required"));
            }
            None => {}
        }
    }

    Ok(out)
}

/// Apply the schema's shape to already-coerced fields.
pub fn assemble(shape: Shape, fields: Map<String, Value>) -> Result<Map<String, Value>, AppError> {
    match shape {
        Shape::Flat => Ok(fields),
        Shape::DynamoTable => dynamo_table(fields),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn coerce_field(spec: &FieldSpec, value: &Value) -> Result<Value, AppError> {
    match spec.ty {
        FieldType::Text => match value {
            Value::String(s) => Ok(Value::String(s.trim().to_string())),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(AppError::validation(spec.name, "must be text")),
        },
        FieldType::Int => to_int(value)
            .map(Value::from)
            .ok_or_else(|| AppError::validation(spec.name, "must be an integer")),
        FieldType::TextList => to_text_list(value)
            .map(|items| json!(items))
            .ok_or_else(|| AppError::validation(spec.name, "must be a list of text")),
    }
}

/// JSON integers, integral floats, and numeric strings.
pub fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn to_text_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(
            s.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

fn take(fields: &mut Map<String, Value>, name: &str) -> Result<Value, AppError> {
    fields
        .remove(name)
        .ok_or_else(|| AppError::validation(name, "is required"))
}

/// Fold the flat form fields into DynamoDB's create-table request. A single key
/// attribute is both defined and used as the key; one throughput value sets both
/// read and write capacity.
fn dynamo_table(mut fields: Map<String, Value>) -> Result<Map<String, Value>, AppError> {
    let attribute_name = take(&mut fields, "attributeName")?;
    let attribute_type = take(&mut fields, "attributeType")?;
    let key_type = take(&mut fields, "keySchema")?;
    let throughput = take(&mut fields, "provisionedThroughput")?;
    let capacity = to_int(&throughput)
        .ok_or_else(|| AppError::validation("provisionedThroughput", "must be an integer"))?;

    fields.insert(
        "attributeDefinitions".to_string(),
        json!([{ "attributeName": attribute_name, "attributeType": attribute_type }]),
    );
    fields.insert(
        "keySchema".to_string(),
        json!([{ "keyType": key_type, "attributeName": attribute_name }]),
    );
    fields.insert(
        "provisionedThroughput".to_string(),
        json!({ "ReadCapacityUnits": capacity, "WriteCapacityUnits": capacity }),
    );

    Ok(fields)
}
