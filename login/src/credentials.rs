use std::collections::HashMap;

use crate::Cookie;
use crate::LoginError;
use crate::Result;

/// An authenticated session: who logged in, where, and the cookies that
/// prove it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub host: String,
    pub email: String,
    pub cookies: Vec<Cookie>,
}

impl Credentials {
    pub fn new(host: impl Into<String>, email: impl Into<String>, cookies: Vec<Cookie>) -> Self {
        Self {
            host: host.into(),
            email: email.into(),
            cookies,
        }
    }

    /// Flat `key=value` form accepted by [`Credentials::parse`].
    ///
    /// Anyone holding this string can act as the logged-in user until the
    /// cookies expire, so it must be stored privately.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("host={}\n", self.host));
        out.push_str(&format!("email={}\n", self.email));
        for cookie in &self.cookies {
            out.push_str(&format!("cookie={}={}\n", cookie.name, cookie.value));
        }
        out
    }

    /// Parses serialized credentials, checking that they were issued to
    /// `expected_email` for `expected_host`.
    pub fn parse(expected_email: &str, expected_host: &str, serialized: &str) -> Result<Self> {
        let props = parse_properties(serialized);
        let email = single_property(&props, "email")?;
        if email != expected_email {
            return Err(LoginError::Credentials(
                "credentials don't match current user email".to_string(),
            ));
        }
        let host = single_property(&props, "host")?;
        if host != expected_host {
            return Err(LoginError::Credentials(
                "credentials don't match current host".to_string(),
            ));
        }

        let cookies = props
            .get("cookie")
            .map(|lines| {
                lines
                    .iter()
                    .map(|line| parse_cookie(line, host))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();
        if cookies.is_empty() {
            return Err(LoginError::Credentials(
                "invalid credential file (should have at least one cookie)".to_string(),
            ));
        }

        Ok(Self::new(host, email, cookies))
    }
}

fn parse_properties(serialized: &str) -> HashMap<&str, Vec<&str>> {
    let mut props: HashMap<&str, Vec<&str>> = HashMap::new();
    for line in serialized.lines().map(str::trim) {
        if line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            props.entry(key).or_default().push(value);
        }
    }
    props
}

fn single_property<'a>(props: &HashMap<&str, Vec<&'a str>>, key: &str) -> Result<&'a str> {
    match props.get(key).map(Vec::as_slice) {
        Some([value]) => Ok(*value),
        _ => Err(LoginError::Credentials(format!(
            "invalid credential file (should have one property named '{key}')"
        ))),
    }
}

fn parse_cookie(line: &str, host: &str) -> Result<Cookie> {
    match line.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok(Cookie::new(host, name, value)),
        _ => Err(LoginError::Credentials(
            "invalid cookie in credentials".to_string(),
        )),
    }
}
