//! Structural validation of payload values.
//!
//! [`validate`] walks a [`PayloadType`] tree against a decoded
//! [`serde_json::Value`]; [`check_transfer`] is the per-step entry
//! point used by the mediator, which first enforces that both parties
//! declared the same type. Both are pure functions.

use serde_json::Value;

use crate::error::{Result, StpError};

use super::PayloadType;

/// Short rendering of a value for error messages. Truncation counts
/// characters, not bytes, so multibyte content never splits.
fn render(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > 60 {
        let head: String = text.chars().take(57).collect();
        format!("{head}...")
    } else {
        text
    }
}

fn mismatch(expected: impl Into<String>, got: &Value) -> StpError {
    StpError::Validation {
        expected: expected.into(),
        got: render(got),
    }
}

/// Check `value` against `ty`, reporting the first deviation found.
///
/// Errors carry the expected type (with location context for
/// containers) and a rendering of the offending value.
pub fn validate(value: &Value, ty: &PayloadType) -> Result<()> {
    match ty {
        PayloadType::Number => {
            if value.is_number() {
                Ok(())
            } else {
                Err(mismatch(ty.to_string(), value))
            }
        }
        PayloadType::Str => {
            if value.is_string() {
                Ok(())
            } else {
                Err(mismatch(ty.to_string(), value))
            }
        }
        PayloadType::Bool => {
            if value.is_boolean() {
                Ok(())
            } else {
                Err(mismatch(ty.to_string(), value))
            }
        }
        PayloadType::Null => {
            if value.is_null() {
                Ok(())
            } else {
                Err(mismatch(ty.to_string(), value))
            }
        }
        // Any admits every kind the wire can carry except keyed
        // structures.
        PayloadType::Any => {
            if value.is_null()
                || value.is_string()
                || value.is_boolean()
                || value.is_number()
                || value.is_array()
            {
                Ok(())
            } else {
                Err(mismatch(ty.to_string(), value))
            }
        }
        PayloadType::Array(elem) => {
            let items = value
                .as_array()
                .ok_or_else(|| mismatch(ty.to_string(), value))?;
            for (i, item) in items.iter().enumerate() {
                validate(item, elem)
                    .map_err(|_| mismatch(format!("{elem} at index {i}"), item))?;
            }
            Ok(())
        }
        PayloadType::Tuple(types) => {
            let items = value
                .as_array()
                .ok_or_else(|| mismatch(ty.to_string(), value))?;
            // Length mismatch is reported distinctly from an element
            // type mismatch.
            if items.len() != types.len() {
                return Err(mismatch(
                    format!("tuple of {} elements", types.len()),
                    value,
                ));
            }
            for (i, (item, item_ty)) in items.iter().zip(types).enumerate() {
                validate(item, item_ty)
                    .map_err(|_| mismatch(format!("{item_ty} at tuple index {i}"), item))?;
            }
            Ok(())
        }
        PayloadType::Union(options) => {
            for option in options {
                if validate(value, option).is_ok() {
                    return Ok(());
                }
            }
            let tried: Vec<String> = options.iter().map(ToString::to_string).collect();
            Err(mismatch(format!("one of [{}]", tried.join(", ")), value))
        }
        PayloadType::Record(types) => {
            let fields = value
                .as_object()
                .ok_or_else(|| mismatch(ty.to_string(), value))?;
            // Key set must match the declared field count exactly; the
            // names themselves come from the value (field types are
            // positional in the declaration).
            if fields.len() != types.len() {
                return Err(mismatch(format!("record of {} fields", types.len()), value));
            }
            for ((name, field), field_ty) in fields.iter().zip(types) {
                validate(field, field_ty)
                    .map_err(|_| mismatch(format!("{field_ty} at field '{name}'"), field))?;
            }
            Ok(())
        }
        PayloadType::Def { payload, .. } => {
            let fields = value
                .as_object()
                .ok_or_else(|| mismatch(ty.to_string(), value))?;
            match fields.iter().next() {
                Some((name, inner)) if fields.len() == 1 => validate(inner, payload)
                    .map_err(|_| mismatch(format!("{payload} at field '{name}'"), inner)),
                _ => Err(mismatch("single-key object", value)),
            }
        }
    }
}

/// The duality invariant at payload-type granularity: both parties
/// must have declared the same type for one step. Checked before any
/// payload data is read.
pub fn declared_types_match(sender: &PayloadType, receiver: &PayloadType) -> Result<()> {
    if sender == receiver {
        Ok(())
    } else {
        Err(StpError::TypeMismatchBetweenParties {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
        })
    }
}

/// Validate one mediated transfer: the declarations must agree, then
/// the value is checked against the sender's declaration.
pub fn check_transfer(value: &Value, sender: &PayloadType, receiver: &PayloadType) -> Result<()> {
    declared_types_match(sender, receiver)?;
    validate(value, sender)
}
