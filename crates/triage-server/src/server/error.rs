use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

/// A failed submission, rendered as a JSON failure body with a status code per
/// error kind.
#[derive(Debug)]
pub struct ApiError {
    pub error: triage::Error,
    pub request_id: String,
}

impl ApiError {
    pub fn new(error: triage::Error, request_id: Option<&str>) -> Self {
        Self {
            error,
            request_id: request_id.unwrap_or_default().to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.error {
            triage::Error::Validation { .. } => StatusCode::BAD_REQUEST,
            triage::Error::Rejected { .. } | triage::Error::Shutdown => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            triage::Error::Cancelled => StatusCode::REQUEST_TIMEOUT,
            triage::Error::Upstream(_)
            | triage::Error::ShutdownTimeout { .. }
            | triage::Error::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(triage::Response::failure(
            self.error.to_string(),
            &self.request_id,
        ));

        if status == StatusCode::SERVICE_UNAVAILABLE {
            (status, [(header::RETRY_AFTER, "1")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}
