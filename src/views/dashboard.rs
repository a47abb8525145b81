//! Dashboard view controller
//!
//! Receives the session token from the coordinator after the view reports
//! it has loaded, then drives the patient list, patient detail, the
//! recommendation interpreter and the free-form API console.

use crate::api::{
    ApiClient, ClientError, ClientResult, ComprehensiveData, DataWindow, Interpretation, Method,
    Patient, PendingRequest,
};
use crate::bridge::{BridgeError, DashboardBridge};
use crate::storage::{LayoutPrefs, SessionToken};
use crate::views::{StatusLine, StatusMessage};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, RwLock};

/// Everything shown for the selected patient
#[derive(Debug, Clone, Serialize)]
pub struct PatientOverview {
    pub patient: Patient,
    pub data: ComprehensiveData,
    pub recommendations: Vec<String>,
}

pub struct DashboardController {
    client: ApiClient,
    bridge: DashboardBridge,
    prefs: LayoutPrefs,
    patients: RwLock<Vec<Patient>>,
    status: StatusLine,
}

impl DashboardController {
    pub fn new(client: ApiClient, bridge: DashboardBridge) -> Arc<Self> {
        let prefs = LayoutPrefs::new(client.tokens().durable().clone());
        Arc::new(Self {
            client,
            bridge,
            prefs,
            patients: RwLock::new(Vec::new()),
            status: StatusLine::default(),
        })
    }

    /// Register for the token and report the view as loaded
    pub fn attach(self: &Arc<Self>) -> Result<(), BridgeError> {
        let this = Arc::clone(self);
        self.bridge.on_token_delivered(move |token| async move {
            if let Err(e) = this.accept_token(token).await {
                tracing::warn!(view = %this.bridge.id(), error = %e, "Initial patient load failed");
            }
        })?;
        self.bridge.notify_loaded()
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Patients from the last successful list load
    pub fn patients(&self) -> Vec<Patient> {
        self.patients
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Keep the delivered token for this view and load the patient list
    pub async fn accept_token(&self, token: SessionToken) -> ClientResult<Vec<Patient>> {
        tracing::info!(view = %self.bridge.id(), token = %token, "Session token received");
        self.client.tokens().hold(token);
        self.load_patients().await
    }

    pub async fn load_patients(&self) -> ClientResult<Vec<Patient>> {
        let patients = self.report(self.client.patients().await)?;
        tracing::debug!(count = patients.len(), "Patient list loaded");
        *self.patients.write().unwrap_or_else(|e| e.into_inner()) = patients.clone();
        Ok(patients)
    }

    /// Detail, time series and recommendations for one patient
    pub async fn select_patient(&self, id: i64, window: DataWindow) -> ClientResult<PatientOverview> {
        let overview = async {
            let patient = self.client.patient(id).await?;
            let data = self.client.comprehensive_data(id, window).await?;
            let recommendations = self.client.recommendations(id).await?;
            Ok::<_, ClientError>(PatientOverview {
                patient,
                data,
                recommendations,
            })
        }
        .await;

        self.report(overview)
    }

    /// Parse free-text therapy advice into structured changes
    pub async fn interpret(&self, text: &str) -> ClientResult<Interpretation> {
        let result = if text.trim().is_empty() {
            Err(ClientError::Validation(
                "Recommendation text is empty".to_string(),
            ))
        } else {
            self.client.interpret(text).await
        };

        let interpretation = self.report(result)?;
        if interpretation.is_empty() {
            self.status
                .set(StatusMessage::info("No changes recognised in the text"));
        }
        Ok(interpretation)
    }

    /// Free-form request from the API console. The body is checked before
    /// anything is sent; malformed JSON never reaches the network.
    pub async fn console(&self, method: &str, path: &str, raw_body: &str) -> ClientResult<Value> {
        let request = method
            .parse::<Method>()
            .and_then(|method| PendingRequest::from_raw(method, path, raw_body));

        let result = match request {
            Ok(request) => self.client.send(&request).await,
            Err(e) => Err(e),
        };
        self.report(result)
    }

    /// Forget the session and go back to the login view
    pub fn logout(&self) -> Result<(), BridgeError> {
        if let Err(e) = self.client.tokens().clear() {
            tracing::warn!(error = %e, "Failed to clear token on logout");
        }
        *self.patients.write().unwrap_or_else(|e| e.into_inner()) = Vec::new();
        self.status.clear();
        self.bridge.request_logout()
    }

    pub fn sidebar_width(&self) -> u32 {
        self.prefs.sidebar_width()
    }

    /// Store a dragged sidebar width; returns the clamped value applied
    pub fn set_sidebar_width(&self, width: i64) -> u32 {
        match self.prefs.set_sidebar_width(width) {
            Ok(width) => width,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to save sidebar width");
                self.prefs.sidebar_width()
            }
        }
    }

    /// Mirror a failed result into the status line
    fn report<T>(&self, result: ClientResult<T>) -> ClientResult<T> {
        match &result {
            Ok(_) => self.status.clear(),
            Err(e) => {
                tracing::debug!(error = %e, "Dashboard request failed");
                self.status.set(StatusMessage::from(e));
            }
        }
        result
    }
}

/// Console output: pretty JSON on success, the error text otherwise
pub fn render_console(result: &ClientResult<Value>) -> String {
    match result {
        Ok(Value::Null) => "(empty response)".to_string(),
        Ok(value) => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
        Err(e) => format!("Error: {}", e),
    }
}
