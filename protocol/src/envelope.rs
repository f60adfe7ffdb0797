use serde::Deserialize;
use serde::Serialize;
use serde_with::base64::Base64;
use serde_with::serde_as;

/// Content type of every envelope POSTed to the remote API path.
pub const RPC_MIME_TYPE: &str = "application/json";

/// Header (and its value) the remote API handler requires on every request.
pub const API_VERSION_HEADER: &str = "X-appcfg-api-version";
pub const API_VERSION: &str = "1";

/// Outer message wrapping a single service call.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub service_name: String,
    pub method: String,
    /// Serialized service-specific request.
    #[serde_as(as = "Base64")]
    pub request: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

impl Request {
    pub fn new(
        service_name: impl Into<String>,
        method: impl Into<String>,
        transaction_id: Option<&str>,
        request: Vec<u8>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            method: method.into(),
            request,
            transaction_id: transaction_id
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationError {
    pub code: i32,
    #[serde(default)]
    pub detail: String,
}

/// Either the serialized service response or the application error raised
/// by the remote handler.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Response {
    #[serde_as(as = "Option<Base64>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_error: Option<ApplicationError>,
}

impl Response {
    pub fn ok(response: Vec<u8>) -> Self {
        Self {
            response: Some(response),
            application_error: None,
        }
    }

    pub fn error(code: i32, detail: impl Into<String>) -> Self {
        Self {
            response: None,
            application_error: Some(ApplicationError {
                code,
                detail: detail.into(),
            }),
        }
    }
}
