use serde_json::{Map, Value};

use super::error::ClassifierError;

/// Field holding the title of a structured entry, with its legacy alias.
const NAME_FIELDS: [&str; 2] = ["name", "nome"];
/// Field holding the body (abstract, syllabus) of a structured entry, with its legacy alias.
const CONTENT_FIELDS: [&str; 2] = ["content", "conteudo"];

/// Decodes a raw request payload into its top-level JSON object.
///
/// # Errors
/// - `MalformedJson` if the bytes are not a JSON document (truncated, invalid UTF-8, ...)
/// - `TypeMismatch` if the document is valid JSON but not an object
pub fn parse_request(payload: &[u8]) -> Result<Map<String, Value>, ClassifierError> {
    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| ClassifierError::MalformedJson(e.to_string()))?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(ClassifierError::TypeMismatch {
            key: String::new(),
            found: kind_of(&other),
        }),
    }
}

/// Flattens every entry of a request into one text per identifier.
///
/// Accepted shapes per identifier:
/// 1. `"text"`
/// 2. `["text1", "text2", ...]`, joined with single spaces
/// 3. `{"name": "title", "content": "body"}`, joined with a single space
///
/// The output keeps the order in which identifiers appear in the request.
/// A single bad entry fails the whole request; nothing partial is returned.
pub fn normalize_request(request: &Map<String, Value>) -> Result<Vec<(String, String)>, ClassifierError> {
    request
        .iter()
        .map(|(key, value)| normalize_entry(key, value).map(|text| (key.clone(), text)))
        .collect()
}

fn normalize_entry(key: &str, value: &Value) -> Result<String, ClassifierError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Array(items) => {
            let parts = items
                .iter()
                .map(|item| {
                    item.as_str().ok_or_else(|| ClassifierError::TypeMismatch {
                        key: key.to_string(),
                        found: "list with non-string items",
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(parts.join(" "))
        }
        Value::Object(fields) => {
            let name = text_field(key, fields, &NAME_FIELDS)?;
            let content = text_field(key, fields, &CONTENT_FIELDS)?;
            Ok(format!("{} {}", name, content))
        }
        other => Err(ClassifierError::TypeMismatch {
            key: key.to_string(),
            found: kind_of(other),
        }),
    }
}

fn text_field<'a>(
    key: &str,
    fields: &'a Map<String, Value>,
    names: &[&'static str; 2],
) -> Result<&'a str, ClassifierError> {
    names
        .iter()
        .find_map(|name| fields.get(*name))
        .and_then(Value::as_str)
        .ok_or_else(|| ClassifierError::MissingField {
            key: key.to_string(),
            field: names[0],
        })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
