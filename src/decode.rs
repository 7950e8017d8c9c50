use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Structured failure raised at the wire boundary. Everything past this
/// module works on typed records and stays total.
#[derive(Debug, Clone, Serialize)]
pub struct DecodeError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl DecodeError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Response wrapper used by every backend endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiEnvelope {
    pub code: String,
    pub data: Value,
    pub message: String,
    pub status: String,
}

impl ApiEnvelope {
    pub fn is_success(&self) -> bool {
        self.status == "SUCCESS"
    }
}

/// One job-card row, one test parameter within a report.
///
/// Wire names follow the backend exactly. Two of them are misspelled on the
/// wire (`isTechanicianChecked`, `paremeterType`); the corrected spelling is
/// accepted on input but the legacy one is what gets written back out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JobCardRecord {
    pub id: i64,
    pub parameter_name: String,
    pub unit: String,
    pub result_value: String,
    pub detection_limit: String,
    pub specification_limit: String,
    pub protocol_used: String,
    pub complies: bool,
    pub remarks: String,
    #[serde(rename = "isTechanicianChecked", alias = "isTechnicianChecked")]
    pub is_technician_checked: bool,
    pub is_quality_checked: bool,
    pub report_no: String,
    pub paremeter_type: String,
    pub analyst_name: String,
    pub is_nabl: bool,
    pub is_approved: bool,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lab_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_number: Option<String>,
}

/// Sample metadata fetched by report number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SampleRecord {
    pub report_number: String,
    pub sample_number: Option<String>,
    #[serde(alias = "description")]
    pub sample_description: Option<String>,
    pub project_name: Option<String>,
    pub lab_name: Option<String>,
}

fn parse_envelope(raw: &Value) -> Result<ApiEnvelope, DecodeError> {
    serde_json::from_value(raw.clone())
        .map_err(|e| DecodeError::new("decode_failed", format!("bad response envelope: {e}")))
}

/// Decode the job-card listing payload: either the full envelope or a bare
/// array. The data not being a list is a caller bug and fails fast.
pub fn decode_job_cards(raw: &Value) -> Result<Vec<JobCardRecord>, DecodeError> {
    let data = match raw {
        Value::Array(_) => raw.clone(),
        Value::Object(_) => {
            let envelope = parse_envelope(raw)?;
            if !envelope.is_success() {
                let message = if envelope.message.trim().is_empty() {
                    "job card request failed".to_string()
                } else {
                    envelope.message
                };
                return Err(DecodeError::new("backend_error", message));
            }
            envelope.data
        }
        _ => {
            return Err(DecodeError::new(
                "invalid_input",
                "job card payload must be a list or a response envelope",
            ))
        }
    };

    let Value::Array(items) = data else {
        return Err(DecodeError::new(
            "invalid_input",
            "job card payload is not a list",
        ));
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let record: JobCardRecord = serde_json::from_value(item.clone()).map_err(|e| {
            DecodeError::new("decode_failed", format!("bad job card row: {e}"))
                .with_details(serde_json::json!({ "index": index }))
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Decode one sample-lookup payload. The backend answers this endpoint in
/// three shapes: a bare list, a paginated object carrying `content`, or a
/// single sample object. `null` (a lookup that failed upstream) and error
/// envelopes both decode to "no samples" rather than an error.
pub fn decode_samples(raw: &Value) -> Result<Vec<SampleRecord>, DecodeError> {
    if raw.is_null() {
        return Ok(Vec::new());
    }

    let data = match raw {
        Value::Array(_) => raw.clone(),
        Value::Object(obj) if obj.contains_key("status") || obj.contains_key("data") => {
            let envelope = parse_envelope(raw)?;
            if !envelope.is_success() {
                return Ok(Vec::new());
            }
            envelope.data
        }
        Value::Object(_) => raw.clone(),
        _ => {
            return Err(DecodeError::new(
                "invalid_input",
                "sample payload must be a list, an object, or null",
            ))
        }
    };

    let items: Vec<Value> = match data {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        Value::Object(obj) => {
            if let Some(content) = obj.get("content") {
                match content {
                    Value::Array(items) => items.clone(),
                    _ => {
                        return Err(DecodeError::new(
                            "invalid_input",
                            "sample page content is not a list",
                        ))
                    }
                }
            } else {
                vec![Value::Object(obj)]
            }
        }
        _ => {
            return Err(DecodeError::new(
                "invalid_input",
                "sample data must be a list or an object",
            ))
        }
    };

    let mut samples = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let sample: SampleRecord = serde_json::from_value(item.clone()).map_err(|e| {
            DecodeError::new("decode_failed", format!("bad sample row: {e}"))
                .with_details(serde_json::json!({ "index": index }))
        })?;
        // A sample without its join key can never be matched; drop it.
        if sample.report_number.trim().is_empty() {
            continue;
        }
        samples.push(sample);
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_cards_decode_from_envelope_and_bare_array() {
        let row = json!({
            "id": 7,
            "reportNo": "R1",
            "parameterName": "pH",
            "isApproved": true,
            "isTechanicianChecked": false,
            "isQualityChecked": false,
            "analystName": "Asha",
            "createdAt": "2024-01-02"
        });
        let envelope = json!({
            "code": "200",
            "status": "SUCCESS",
            "message": "",
            "data": [row.clone()]
        });

        let from_envelope = decode_job_cards(&envelope).expect("decode envelope");
        let from_array = decode_job_cards(&json!([row])).expect("decode bare array");
        assert_eq!(from_envelope, from_array);
        assert_eq!(from_envelope.len(), 1);
        assert_eq!(from_envelope[0].id, 7);
        assert_eq!(from_envelope[0].report_no, "R1");
        assert!(from_envelope[0].is_approved);
        assert!(!from_envelope[0].is_technician_checked);
    }

    #[test]
    fn job_cards_accept_corrected_technician_spelling() {
        let records = decode_job_cards(&json!([
            { "id": 1, "reportNo": "R1", "isTechnicianChecked": true }
        ]))
        .expect("decode");
        assert!(records[0].is_technician_checked);

        // Round-trip writes the legacy wire spelling back.
        let out = serde_json::to_value(&records[0]).expect("serialize");
        assert!(out.get("isTechanicianChecked").is_some());
        assert!(out.get("isTechnicianChecked").is_none());
    }

    #[test]
    fn job_cards_error_envelope_carries_backend_message() {
        let raw = json!({ "status": "ERROR", "message": "no session", "data": null });
        let err = decode_job_cards(&raw).expect_err("must fail");
        assert_eq!(err.code, "backend_error");
        assert_eq!(err.message, "no session");
    }

    #[test]
    fn job_cards_non_list_data_fails_fast() {
        for raw in [json!(42), json!("rows"), json!({ "status": "SUCCESS", "data": 3 })] {
            let err = decode_job_cards(&raw).expect_err("must fail");
            assert_eq!(err.code, "invalid_input", "payload: {raw}");
        }
    }

    #[test]
    fn job_cards_bad_row_reports_index() {
        let raw = json!([{ "id": 1 }, { "id": "not-a-number" }]);
        let err = decode_job_cards(&raw).expect_err("must fail");
        assert_eq!(err.code, "decode_failed");
        assert_eq!(err.details.unwrap()["index"], 1);
    }

    #[test]
    fn samples_decode_all_three_backend_shapes() {
        let one = json!({ "reportNumber": "R1", "sampleNumber": "S-001" });
        let bare_list = json!({ "status": "SUCCESS", "data": [one.clone()] });
        let paginated = json!({ "status": "SUCCESS", "data": { "content": [one.clone()], "totalElements": 1 } });
        let single = json!({ "status": "SUCCESS", "data": one });

        for raw in [bare_list, paginated, single] {
            let samples = decode_samples(&raw).expect("decode");
            assert_eq!(samples.len(), 1, "payload: {raw}");
            assert_eq!(samples[0].report_number, "R1");
            assert_eq!(samples[0].sample_number.as_deref(), Some("S-001"));
        }
    }

    #[test]
    fn samples_null_and_error_envelopes_mean_no_match() {
        assert!(decode_samples(&Value::Null).expect("null").is_empty());
        let failed = json!({ "status": "ERROR", "message": "not found", "data": null });
        assert!(decode_samples(&failed).expect("error envelope").is_empty());
        let empty_data = json!({ "status": "SUCCESS", "data": null });
        assert!(decode_samples(&empty_data).expect("null data").is_empty());
    }

    #[test]
    fn samples_accept_description_alias_and_skip_keyless_rows() {
        let raw = json!({ "status": "SUCCESS", "data": [
            { "reportNumber": "R2", "description": "Ground water" },
            { "sampleNumber": "orphan" }
        ]});
        let samples = decode_samples(&raw).expect("decode");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].sample_description.as_deref(), Some("Ground water"));
    }
}
