//! Script result envelope.
//!
//! Every page script returns `{ok, data?, error_code?, error_message?}`.
//! Scripts that `JSON.stringify` their result hand back a string, which is
//! parsed before decoding.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, ErrorCode, Result};
use crate::identifiers::ChartId;

/// Decoded script envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptEnvelope {
    /// Whether the script succeeded.
    pub ok: bool,
    /// Payload on success.
    #[serde(default)]
    pub data: Option<Value>,
    /// Stable error code on failure.
    #[serde(default)]
    pub error_code: Option<String>,
    /// Human-readable failure text.
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ScriptEnvelope {
    /// Reads an envelope from an evaluation result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EvaluationFailed`] if the value is not an envelope.
    pub fn from_value(value: Value) -> Result<Self> {
        let value = match value {
            Value::String(text) => serde_json::from_str(&text).map_err(|e| {
                Error::evaluation_caused_by("Script returned a non-JSON string", e.into())
            })?,
            other => other,
        };

        if value.get("ok").and_then(Value::as_bool).is_none() {
            return Err(Error::evaluation(format!(
                "Script returned a non-envelope value: {}",
                preview(&value)
            )));
        }

        serde_json::from_value(value)
            .map_err(|e| Error::evaluation_caused_by("Malformed script envelope", e.into()))
    }

    /// Returns the payload, or the error the script reported.
    ///
    /// # Errors
    ///
    /// For `ok: false`, the error matching `error_code`: page-api-unavailable,
    /// validation and chart-not-found map onto their own variants; anything
    /// else is an evaluation failure.
    pub fn into_data(self, chart_id: &ChartId) -> Result<Value> {
        if self.ok {
            return Ok(self.data.unwrap_or(Value::Null));
        }

        let message = self
            .error_message
            .unwrap_or_else(|| "Script reported failure".to_string());
        let code = self.error_code.as_deref().and_then(ErrorCode::from_envelope);

        Err(match code {
            Some(ErrorCode::PageApiUnavailable) => Error::page_api_unavailable(message),
            Some(ErrorCode::Validation) => Error::validation(message),
            Some(ErrorCode::ChartNotFound) => Error::chart_not_found(chart_id.clone()),
            _ => match self.error_code {
                Some(code) => Error::evaluation(format!("{code}: {message}")),
                None => Error::evaluation(message),
            },
        })
    }
}

/// Decodes an evaluation result into the envelope's payload.
///
/// # Errors
///
/// See [`ScriptEnvelope::from_value`] and [`ScriptEnvelope::into_data`].
pub fn decode_envelope(chart_id: &ChartId, value: Value) -> Result<Value> {
    ScriptEnvelope::from_value(value)?.into_data(chart_id)
}

fn preview(value: &Value) -> String {
    let mut text = value.to_string();
    if text.len() > 120 {
        let mut end = 120;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
        text.push('…');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn chart() -> ChartId {
        ChartId::from("abc123")
    }

    #[test]
    fn test_ok_returns_data() {
        let data = decode_envelope(&chart(), json!({"ok": true, "data": {"v": 1}})).unwrap();
        assert_eq!(data, json!({"v": 1}));
    }

    #[test]
    fn test_ok_without_data_is_null() {
        assert_eq!(
            decode_envelope(&chart(), json!({"ok": true})).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_string_result_is_parsed() {
        let data = decode_envelope(&chart(), json!(r#"{"ok":true,"data":[1,2]}"#)).unwrap();
        assert_eq!(data, json!([1, 2]));
    }

    #[test]
    fn test_error_codes_are_mapped() {
        let err = decode_envelope(
            &chart(),
            json!({"ok": false, "error_code": "page_api_unavailable", "error_message": "no api"}),
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PageApiUnavailable);

        let err = decode_envelope(
            &chart(),
            json!({"ok": false, "error_code": "VALIDATION", "error_message": "bad symbol"}),
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Validation);
        assert!(err.to_string().contains("bad symbol"));

        let err = decode_envelope(
            &chart(),
            json!({"ok": false, "error_code": "widget_missing", "error_message": "gone"}),
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::EvaluationFailure);
        assert!(err.to_string().contains("widget_missing"));
    }

    #[test]
    fn test_non_envelope_is_evaluation_failure() {
        let err = decode_envelope(&chart(), json!(42)).unwrap_err();
        assert!(matches!(err, Error::EvaluationFailed { .. }));

        let err = decode_envelope(&chart(), json!("not json")).unwrap_err();
        assert!(matches!(err, Error::EvaluationFailed { .. }));
    }
}
