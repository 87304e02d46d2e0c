//! Conversion between JSON documents and Firestore values.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value as Json};

use jobboard_query::eval::parse_timestamp;
use jobboard_query::Document as JsonDocument;

use super::types::{ArrayValue, Document, MapValue, Value};
use crate::schema::{CollectionSchema, FieldKind};

/// Firestore fields of a JSON document; timestamp fields follow the schema.
pub fn fields_from_json(document: &JsonDocument, schema: &CollectionSchema) -> HashMap<String, Value> {
    document
        .iter()
        .map(|(name, value)| (name.clone(), value_from_json(value, schema.kind_of(name))))
        .collect()
}

pub fn value_from_json(value: &Json, kind: Option<FieldKind>) -> Value {
    match value {
        Json::Null => Value::NullValue(()),
        Json::Bool(flag) => Value::BooleanValue(*flag),
        Json::Number(number) => number_value(number),
        Json::String(text) => match kind {
            Some(FieldKind::Timestamp) => parse_timestamp(text)
                .map(|ts| Value::TimestampValue(format_timestamp(&ts.with_timezone(&Utc))))
                .unwrap_or_else(|| Value::StringValue(text.clone())),
            _ => Value::StringValue(text.clone()),
        },
        Json::Array(items) => Value::ArrayValue(ArrayValue {
            values: Some(items.iter().map(|item| value_from_json(item, None)).collect()),
        }),
        Json::Object(map) => Value::MapValue(MapValue {
            fields: Some(
                map.iter()
                    .map(|(k, v)| (k.clone(), value_from_json(v, None)))
                    .collect(),
            ),
        }),
    }
}

fn number_value(number: &Number) -> Value {
    if let Some(int) = number.as_i64() {
        Value::IntegerValue(int.to_string())
    } else if let Some(uint) = number.as_u64() {
        Value::IntegerValue(uint.to_string())
    } else {
        Value::DoubleValue(number.as_f64().unwrap_or_default())
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn json_from_value(value: Value) -> Json {
    match value {
        Value::NullValue(()) => Json::Null,
        Value::BooleanValue(flag) => Json::Bool(flag),
        Value::IntegerValue(text) => text
            .parse::<i64>()
            .map(Json::from)
            .unwrap_or(Json::String(text)),
        Value::DoubleValue(float) => Number::from_f64(float).map_or(Json::Null, Json::Number),
        Value::TimestampValue(text) => match DateTime::parse_from_rfc3339(&text) {
            Ok(ts) => Json::String(format_timestamp(&ts.with_timezone(&Utc))),
            Err(_) => Json::String(text),
        },
        Value::StringValue(text) | Value::BytesValue(text) | Value::ReferenceValue(text) => {
            Json::String(text)
        }
        Value::GeoPointValue(point) => serde_json::json!({
            "latitude": point.latitude,
            "longitude": point.longitude,
        }),
        Value::ArrayValue(array) => Json::Array(
            array
                .values
                .unwrap_or_default()
                .into_iter()
                .map(json_from_value)
                .collect(),
        ),
        Value::MapValue(map) => Json::Object(fields_to_json(map.fields.unwrap_or_default())),
    }
}

fn fields_to_json(fields: HashMap<String, Value>) -> Map<String, Json> {
    fields
        .into_iter()
        .map(|(name, value)| (name, json_from_value(value)))
        .collect()
}

/// JSON view of a Firestore document.
pub fn document_to_json(document: Document) -> JsonDocument {
    fields_to_json(document.fields.unwrap_or_default())
}

/// Typed Firestore value for a textual filter operand, if it coerces.
pub fn operand_value(operand: &str, kind: FieldKind) -> Option<Value> {
    match kind {
        FieldKind::String | FieldKind::StringArray => Some(Value::StringValue(operand.to_string())),
        FieldKind::Number => {
            let trimmed = operand.trim();
            if let Ok(int) = trimmed.parse::<i64>() {
                Some(Value::IntegerValue(int.to_string()))
            } else {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|float| float.is_finite())
                    .map(Value::DoubleValue)
            }
        }
        FieldKind::Timestamp => parse_timestamp(operand)
            .map(|ts| Value::TimestampValue(format_timestamp(&ts.with_timezone(&Utc)))),
        FieldKind::Boolean => operand.trim().parse().ok().map(Value::BooleanValue),
        FieldKind::ObjectArray | FieldKind::Object => None,
    }
}
