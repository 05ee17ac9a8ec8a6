/// Echo request/response messages
///
/// Both are created per invocation and dropped once the handler returns.
use serde::{Deserialize, Serialize};

use super::status::status_for_body;

/// Structured input of the echo function
///
/// Only `body` is read. Any other key in the payload is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EchoRequest {
    pub body: String,
}

impl EchoRequest {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

/// Structured output of the echo function
///
/// Serialized as `{"statusCode": <u16>, "body": <string>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoResponse {
    pub status_code: u16,
    pub body: String,
}

impl EchoResponse {
    /// Build the response for a request
    ///
    /// The body is copied verbatim; only the status depends on it.
    pub fn for_request(request: &EchoRequest) -> Self {
        Self {
            status_code: status_for_body(&request.body),
            body: request.body.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_ignores_extra_fields() {
        let request: EchoRequest = serde_json::from_value(json!({
            "body": "hello",
            "headers": {"x": "y"},
            "statusCode": 500
        }))
        .unwrap();

        assert_eq!(request, EchoRequest::new("hello"));
    }

    #[test]
    fn test_request_without_body_fails() {
        let result = serde_json::from_value::<EchoRequest>(json!({"other": "value"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_response_wire_format() {
        let response = EchoResponse::for_request(&EchoRequest::new("hello"));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"statusCode": 200, "body": "hello"})
        );
    }

    #[test]
    fn test_response_for_trigger_body() {
        let response = EchoResponse::for_request(&EchoRequest::new("erro"));
        assert_eq!(response.status_code, 404);
        assert_eq!(response.body, "erro");
    }

    // Unicode and multi-line bodies are echoed byte for byte
    #[test]
    fn test_response_body_is_verbatim() {
        let body = "  line one\nライン二 🚀\t";
        let response = EchoResponse::for_request(&EchoRequest::new(body));
        assert_eq!(response.body, body);
        assert_eq!(response.status_code, 200);
    }
}
