use serde::Deserialize;
use serde::Serialize;
use serde_with::base64::Base64;
use serde_with::serde_as;

pub const URLFETCH_SERVICE: &str = "urlfetch";
pub const FETCH_METHOD: &str = "Fetch";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FetchMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub key: String,
    pub value: String,
}

impl Header {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub method: FetchMethod,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde_as(as = "Option<Base64>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,
    pub follow_redirects: bool,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub status_code: u16,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde_as(as = "Base64")]
    #[serde(default)]
    pub content: Vec<u8>,
    #[serde(default)]
    pub content_was_truncated: bool,
}

impl FetchResponse {
    /// Case-insensitive lookup of the first header named `key`.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.key.eq_ignore_ascii_case(key))
            .map(|header| header.value.as_str())
    }
}
