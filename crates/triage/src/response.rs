use crate::record::Record;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

/// The reusable result container handed back to a submitter.
///
/// Containers may come from a [`ResponsePool`](crate::ResponsePool), so a
/// value is only meaningful between delivery and the matching
/// [`WorkerPool::recycle`](crate::WorkerPool::recycle) call.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub success: bool,
    #[serde(rename = "data", skip_serializing_if = "Option::is_none")]
    pub record: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Unix milliseconds at which the outcome was produced.
    pub timestamp: u64,
    pub request_id: String,
}

impl Response {
    /// Resets every field, including the record payload.
    ///
    /// The correlation id keeps its allocation so recycled containers do not
    /// reallocate it.
    pub fn clear(&mut self) {
        self.success = false;
        self.record = None;
        self.error = None;
        self.timestamp = 0;
        self.request_id.clear();
    }

    /// Fills the container with a successful outcome.
    pub fn fill_success(&mut self, record: Record, request_id: &str) {
        self.success = true;
        self.record = Some(record);
        self.error = None;
        self.timestamp = unix_millis();
        self.request_id.clear();
        self.request_id.push_str(request_id);
    }

    /// Builds a standalone failure response. Used by the HTTP layer for error
    /// bodies; failures never travel through a pooled container.
    pub fn failure(error: impl Into<String>, request_id: &str) -> Self {
        Self {
            success: false,
            record: None,
            error: Some(error.into()),
            timestamp: unix_millis(),
            request_id: request_id.to_string(),
        }
    }

    /// `true` if every field holds its default value.
    pub fn is_cleared(&self) -> bool {
        !self.success
            && self.record.is_none()
            && self.error.is_none()
            && self.timestamp == 0
            && self.request_id.is_empty()
    }
}

/// Milliseconds since the Unix epoch, or `0` if the clock is before it.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_resets_every_field() {
        let mut response = Response::default();
        response.fill_success(Record::generate("P7"), "req-1");
        assert!(response.success);
        assert!(response.timestamp > 0);

        response.clear();
        assert!(response.is_cleared());
        assert_eq!(response, Response::default());
    }

    #[test]
    fn failure_serializes_without_data() {
        let response = Response::failure("boom", "req-2");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "boom");
        assert_eq!(json["request_id"], "req-2");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn success_serializes_record_as_data() {
        let mut response = Response::default();
        response.fill_success(Record::generate("P7"), "req-3");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["data"]["id"], "P7");
        assert!(json.get("error").is_none());
    }
}
