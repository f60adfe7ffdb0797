use std::collections::HashMap;
use std::sync::OnceLock;

use regex_lite::Regex;
use remote_api_client::TransportClient;
use tracing::debug;

use crate::RemoteApiError;
use crate::Result;

fn pair_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();

    #[expect(clippy::unwrap_used)]
    RE.get_or_init(|| Regex::new(r"^([a-z0-9_-]+): +([~a-z0-9_-]+)$").unwrap())
}

/// Parses the flat `{key: value, key: value}` map the remote API handler
/// answers a GET with. Anything that isn't such a map yields no pairs.
pub fn parse_yaml_map(input: &str) -> HashMap<String, String> {
    let input = input.trim();
    let Some(inner) = input
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
    else {
        return HashMap::new();
    };

    inner
        .split(',')
        .map(str::trim)
        .filter_map(|pair| pair_regex().captures(pair))
        .filter_map(|captures| {
            let key = captures.get(1)?.as_str().to_string();
            let value = captures.get(2)?.as_str().to_string();
            Some((key, value))
        })
        .collect()
}

/// Asks the remote API handler which application it serves.
pub fn discover_app_id(transport: &TransportClient, remote_api_path: &str) -> Result<String> {
    let response = transport.get(remote_api_path)?;
    if response.status() != 200 {
        return Err(RemoteApiError::Protocol(format!(
            "can't get appId from remote api; status code = {}",
            response.status()
        )));
    }
    let body = response.body_as_string();
    let mut props = parse_yaml_map(&body);
    let app_id = props.remove("app_id").ok_or_else(|| {
        RemoteApiError::Protocol(format!("unexpected response from remote api: {body}"))
    })?;
    debug!("remote API serves app {app_id}");
    Ok(app_id)
}
