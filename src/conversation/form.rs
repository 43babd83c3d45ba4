//! Forms the agent attaches when it needs structured input

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Submitted field values, keyed by field name
pub type FormValues = Map<String, Value>;

/// Form payload carried by an artifact data part tagged `form`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Prefilled values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_data: Option<FormValues>,
    #[serde(default)]
    pub form: FormSchema,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormSchema {
    #[serde(default)]
    pub properties: BTreeMap<String, FieldSpec>,
    #[serde(default)]
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Field-level validation failures, keyed by field name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} required field(s) missing", .fields.len())]
pub struct FormValidationError {
    pub fields: BTreeMap<String, String>,
}

impl FormSpec {
    /// Merge `submitted` over the prefilled values and check required fields.
    ///
    /// A required field is missing when absent, null, or a blank string.
    pub fn validate(&self, submitted: FormValues) -> Result<FormValues, FormValidationError> {
        let mut values = self.form_data.clone().unwrap_or_default();
        values.extend(submitted);

        let fields: BTreeMap<String, String> = self
            .form
            .required
            .iter()
            .filter(|key| is_blank(values.get(key.as_str())))
            .map(|key| (key.clone(), format!("{} is required", self.field_title(key))))
            .collect();

        if fields.is_empty() {
            Ok(values)
        } else {
            Err(FormValidationError { fields })
        }
    }

    fn field_title<'a>(&'a self, key: &'a str) -> &'a str {
        self.form
            .properties
            .get(key)
            .map(|field| field.title.as_str())
            .filter(|title| !title.is_empty())
            .unwrap_or(key)
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}
