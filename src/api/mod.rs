//! Backend API Client
//!
//! Every call the shell makes to the clinical backend goes through
//! [`ApiClient`].
//!
//! ## Endpoints
//!
//! ### Auth
//! - `POST /api/auth/login` - Exchange credentials for a bearer token
//! - `GET /api/auth/me` - Current user
//!
//! ### Patients
//! - `GET /api/patients/` - Patient list
//! - `GET /api/patients/{id}` - Patient detail
//! - `DELETE /api/patients/{id}` - Remove a patient
//! - `GET /api/patients/{id}/comprehensive_data` - Glucose, carbs, insulin
//! - `GET /api/patients/{id}/recommendations` - Stored recommendations
//!
//! ### Recommendations
//! - `POST /api/recommendations/interpret` - Structured parse of free text
//!
//! ### Ingest
//! - `POST /api/ingest/` - Device measurements

mod client;
pub mod dto;
mod endpoints;
mod error;
mod request;

pub use client::ApiClient;
pub use dto::{
    ComprehensiveData, CurrentUser, DataWindow, IngestPoint, Interpretation, Patient,
};
pub use error::{ClientError, ClientResult, NetworkErrorKind};
pub use request::{Method, PendingRequest};
