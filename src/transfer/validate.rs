//! Structural pre-check for imported data
//!
//! A fast sanity pass run before handing data to the business-schema
//! validators (an external collaborator): collections present with the
//! right shape, records carrying an identifying field. All problems are
//! collected and reported together, not first-error-wins.

use serde_json::Value;

/// Outcome of a structural validation pass
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Structurally validate an imported data object
pub fn validate(data: &Value) -> ValidationReport {
    let mut errors = Vec::new();

    let obj = match data.as_object() {
        Some(obj) => obj,
        None => {
            return ValidationReport {
                valid: false,
                errors: vec!["Data must be a JSON object".to_string()],
            }
        }
    };

    for collection in ["accounts", "transactions"] {
        match obj.get(collection) {
            None => errors.push(format!("Missing collection '{}'", collection)),
            Some(Value::Array(items)) => {
                for (index, item) in items.iter().enumerate() {
                    let has_id = item
                        .get("id")
                        .map_or(false, |id| id.is_string() || id.is_number());
                    if !has_id {
                        errors.push(format!(
                            "'{}' entry {} is missing an 'id' field",
                            collection, index
                        ));
                    }
                }
            }
            Some(_) => errors.push(format!("'{}' must be an array", collection)),
        }
    }

    if obj.get("categories").is_none() {
        errors.push("Missing collection 'categories'".to_string());
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}
