//! Small JSON request/response helpers shared by every handler.

use bytes::Bytes;

use crate::body::ResponseBody;
use crate::error::{HttpError, HttpResult};

/// Parse a JSON request body into `T`, mapping malformed input to
/// [`HttpError::InvalidInput`].
pub fn parse_json<T: serde::de::DeserializeOwned>(body: &Bytes) -> HttpResult<T> {
    serde_json::from_slice(body).map_err(|e| HttpError::InvalidInput(format!("malformed JSON body: {e}")))
}

/// Build a JSON response with the given status code.
pub fn json_response(status: http::StatusCode, value: &impl serde::Serialize) -> http::Response<ResponseBody> {
    let body = ResponseBody::json(value).unwrap_or_else(|_| ResponseBody::from_bytes(Bytes::from_static(b"{}")));
    http::Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(body)
        .expect("json response is always well-formed")
}

/// Build an empty response with the given status code.
pub fn empty_response(status: http::StatusCode) -> http::Response<ResponseBody> {
    http::Response::builder().status(status).body(ResponseBody::empty()).expect("empty response is always well-formed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize, serde::Serialize, PartialEq, Debug)]
    struct Sample {
        value: u32,
    }

    #[test]
    fn test_should_parse_valid_json() {
        let body = Bytes::from_static(br#"{"value": 42}"#);
        let parsed: Sample = parse_json(&body).unwrap();
        assert_eq!(parsed, Sample { value: 42 });
    }

    #[test]
    fn test_should_reject_malformed_json() {
        let body = Bytes::from_static(b"not json");
        let err = parse_json::<Sample>(&body).unwrap_err();
        assert!(matches!(err, HttpError::InvalidInput(_)));
    }

    #[test]
    fn test_should_build_json_response_with_status() {
        let resp = json_response(http::StatusCode::CREATED, &Sample { value: 1 });
        assert_eq!(resp.status(), http::StatusCode::CREATED);
    }
}
