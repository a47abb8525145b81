//! Data Transfer Objects
//!
//! Request and response types of the backend API.
//! Chart and recommendation payloads stay as raw JSON; they are passed
//! through to the rendering layer untouched.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================
// AUTH DTOs
// ============================================

/// Login request body
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Successful login response
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Current user as returned by `/api/auth/me`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CurrentUser {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

impl CurrentUser {
    /// Name to greet the user with
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or("unknown user")
    }
}

// ============================================
// PATIENT DTOs
// ============================================

/// Patient as listed in the sidebar and shown in the detail header
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Patient {
    pub id: i64,
    pub full_name: String,
    #[serde(default)]
    pub doctor_id: Option<i64>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub contact_info: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Time-series payload backing the glucose/carbs/insulin chart
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ComprehensiveData {
    #[serde(default)]
    pub glucose: Value,
    #[serde(default)]
    pub carbs: Value,
    #[serde(default)]
    pub insulin: Value,
}

/// Optional time window for comprehensive data
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DataWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DataWindow {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// Query string including the leading `?`, empty when unbounded
    pub fn query_string(&self) -> String {
        let mut params = Vec::new();
        if let Some(start) = self.start {
            params.push(format!(
                "start_datetime={}",
                urlencoding::encode(&start.to_rfc3339())
            ));
        }
        if let Some(end) = self.end {
            params.push(format!(
                "end_datetime={}",
                urlencoding::encode(&end.to_rfc3339())
            ));
        }

        if params.is_empty() {
            String::new()
        } else {
            format!("?{}", params.join("&"))
        }
    }
}

/// Stored free-text recommendations of a patient
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RecommendationList {
    #[serde(default)]
    pub recommendations: Vec<String>,
}

// ============================================
// RECOMMENDATION DTOs
// ============================================

/// Interpret request body
#[derive(Debug, Clone, Serialize)]
pub struct InterpretRequest {
    pub text: String,
}

/// Structured interpretation of a recommendation
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Interpretation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basal_changes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carb_ratio_changes: Option<Value>,
    /// Any other fields the parser returns
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Interpretation {
    /// Whether the parser recognized anything
    pub fn is_empty(&self) -> bool {
        let empty = |v: &Option<Value>| match v {
            None | Some(Value::Null) => true,
            Some(Value::Array(items)) => items.is_empty(),
            Some(_) => false,
        };
        empty(&self.basal_changes) && empty(&self.carb_ratio_changes)
    }
}

// ============================================
// INGEST DTOs
// ============================================

/// One measurement pushed from a device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestPoint {
    pub timestamp: DateTime<Utc>,
    /// e.g. "glucose", "insulin", "carbs"
    pub record_type: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Batch ingest request
#[derive(Debug, Clone, Serialize)]
pub struct IngestRequest {
    pub patient_id: i64,
    pub data_points: Vec<IngestPoint>,
}

/// Generic `{message}` acknowledgement
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}
