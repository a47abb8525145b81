//! Typed backend endpoints
//!
//! Thin wrappers over [`ApiClient::send_as`], one per backend route.

use crate::api::client::ApiClient;
use crate::api::dto::*;
use crate::api::error::ClientResult;
use crate::api::request::{Method, PendingRequest};
use crate::storage::SessionToken;

impl ApiClient {
    /// `POST /api/auth/login`. Does not store the token; that is the
    /// caller's decision (remember-me).
    pub async fn login(&self, username: &str, password: &str) -> ClientResult<SessionToken> {
        let request = PendingRequest::post("/api/auth/login").json(&LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })?;

        let response: LoginResponse = self.send_as(&request).await?;
        tracing::info!(username = %username, "Login accepted");
        Ok(SessionToken::new(response.access_token))
    }

    /// `GET /api/auth/me`
    pub async fn current_user(&self) -> ClientResult<CurrentUser> {
        self.send_as(&PendingRequest::get("/api/auth/me")).await
    }

    /// `GET /api/patients/`
    pub async fn patients(&self) -> ClientResult<Vec<Patient>> {
        self.send_as(&PendingRequest::get("/api/patients/")).await
    }

    /// `GET /api/patients/{id}`
    pub async fn patient(&self, id: i64) -> ClientResult<Patient> {
        self.send_as(&PendingRequest::get(format!("/api/patients/{}", id)))
            .await
    }

    /// `DELETE /api/patients/{id}`
    pub async fn delete_patient(&self, id: i64) -> ClientResult<()> {
        self.send(&PendingRequest::new(
            Method::Delete,
            format!("/api/patients/{}", id),
        ))
        .await?;
        Ok(())
    }

    /// `GET /api/patients/{id}/comprehensive_data`, optionally bounded in time
    pub async fn comprehensive_data(
        &self,
        id: i64,
        window: DataWindow,
    ) -> ClientResult<ComprehensiveData> {
        let path = format!(
            "/api/patients/{}/comprehensive_data{}",
            id,
            window.query_string()
        );
        self.send_as(&PendingRequest::get(path)).await
    }

    /// `GET /api/patients/{id}/recommendations`
    pub async fn recommendations(&self, id: i64) -> ClientResult<Vec<String>> {
        let list: RecommendationList = self
            .send_as(&PendingRequest::get(format!(
                "/api/patients/{}/recommendations",
                id
            )))
            .await?;
        Ok(list.recommendations)
    }

    /// `POST /api/recommendations/interpret`
    pub async fn interpret(&self, text: &str) -> ClientResult<Interpretation> {
        let request = PendingRequest::post("/api/recommendations/interpret").json(
            &InterpretRequest {
                text: text.to_string(),
            },
        )?;
        self.send_as(&request).await
    }

    /// `POST /api/ingest/`
    pub async fn ingest(&self, patient_id: i64, points: Vec<IngestPoint>) -> ClientResult<String> {
        let request = PendingRequest::post("/api/ingest/").json(&IngestRequest {
            patient_id,
            data_points: points,
        })?;
        let response: MessageResponse = self.send_as(&request).await?;
        Ok(response.message)
    }
}
