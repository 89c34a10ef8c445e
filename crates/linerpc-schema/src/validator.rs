use jsonschema::Validator;
use serde_json::Value;

use crate::error::{Result, SchemaError};

/// Most violations reported in one error message.
const MAX_REPORTED_ERRORS: usize = 4;

pub(crate) fn validate_args(channel: &str, args: &[Value], validator: &Validator) -> Result<()> {
    let instance = Value::Array(args.to_vec());

    let messages: Vec<String> = validator
        .iter_errors(&instance)
        .take(MAX_REPORTED_ERRORS)
        .map(|err| err.to_string())
        .collect();

    if messages.is_empty() {
        return Ok(());
    }

    Err(SchemaError::ValidationFailed {
        channel: channel.to_string(),
        message: messages.join("; "),
    })
}
