//! Data Transfer Objects - request/response types for the API.

use serde::{Deserialize, Serialize};

/// Request to login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Browser CSP violation report (`application/csp-report`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CspReportEnvelope {
    #[serde(rename = "csp-report")]
    pub report: CspReport,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CspReport {
    pub document_uri: Option<String>,
    pub violated_directive: Option<String>,
    pub effective_directive: Option<String>,
    pub blocked_uri: Option<String>,
    pub source_file: Option<String>,
    pub line_number: Option<u32>,
}

/// Client-side error report sent by the front ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientErrorReport {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csp_report_parses_browser_payload() {
        let body = r#"{
            "csp-report": {
                "document-uri": "https://app.example.com/fields",
                "violated-directive": "script-src-elem",
                "blocked-uri": "inline",
                "line-number": 12,
                "disposition": "enforce"
            }
        }"#;

        let envelope: CspReportEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(
            envelope.report.violated_directive.as_deref(),
            Some("script-src-elem")
        );
        assert_eq!(envelope.report.line_number, Some(12));
        assert!(envelope.report.source_file.is_none());
    }

    #[test]
    fn test_error_report_optional_fields() {
        let report: ClientErrorReport =
            serde_json::from_str(r#"{"message":"map tile failed"}"#).unwrap();
        assert_eq!(report.message, "map tile failed");
        assert!(report.stack.is_none());
    }
}
