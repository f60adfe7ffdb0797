use std::collections::HashMap;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use tracing::debug;
use tracing::info;

use crate::Cookie;
use crate::Credentials;
use crate::LoginError;
use crate::Result;
use crate::ServerAddress;
use crate::make_dev_appserver_cookie;

pub const CLIENT_LOGIN_URL: &str = "https://www.google.com/accounts/ClientLogin";

/// Identifies this client to the identity endpoint.
pub const CLIENT_SOURCE: &str = "remote_api-rust-1.0";

const LOGIN_PATH: &str = "/_ah/login";
const CONTINUE_URL: &str = "http://localhost/";

/// Exchanges an email and password for session cookies of a remote
/// application.
///
/// Logging in takes two requests: a token request to the identity endpoint
/// and a token-for-cookies exchange with the application itself. A
/// development server on `localhost` is logged into without any traffic.
#[derive(Debug, Clone)]
pub struct AuthenticationClient {
    http: Client,
    identity_endpoint: String,
}

impl AuthenticationClient {
    pub fn new() -> Result<Self> {
        Self::with_identity_endpoint(CLIENT_LOGIN_URL)
    }

    pub fn with_identity_endpoint(identity_endpoint: impl Into<String>) -> Result<Self> {
        let identity_endpoint = identity_endpoint.into();
        // Redirects carry the session cookies and must reach us untouched.
        let http = Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(|err| LoginError::transport(&identity_endpoint, err))?;
        Ok(Self {
            http,
            identity_endpoint,
        })
    }

    pub fn login(
        &self,
        server: &ServerAddress,
        email: &str,
        password: &str,
    ) -> Result<Credentials> {
        if email.is_empty() {
            return Err(LoginError::InvalidArgument("email not set".to_string()));
        }
        if server.is_localhost() {
            debug!("using development server login for {email}");
            let cookie = make_dev_appserver_cookie(&server.host, email);
            return Ok(Credentials::new(&server.host, email, vec![cookie]));
        }
        if password.is_empty() {
            return Err(LoginError::InvalidArgument("password not set".to_string()));
        }

        let token = self.request_auth_token(email, password)?;
        let url = format!(
            "{}?auth={}&continue={}",
            server.url_for(LOGIN_PATH)?,
            urlencoding::encode(&token),
            urlencoding::encode(CONTINUE_URL),
        );
        let cookies = self.exchange_token_for_cookies(&url)?;
        info!(host = %server.host, "logged in as {email}");
        Ok(Credentials::new(&server.host, email, cookies))
    }

    fn request_auth_token(&self, email: &str, password: &str) -> Result<String> {
        let params = [
            ("Email", email),
            ("Passwd", password),
            ("service", "ah"),
            ("source", CLIENT_SOURCE),
            ("accountType", "HOSTED_OR_GOOGLE"),
        ];
        let response = self
            .http
            .post(&self.identity_endpoint)
            .form(&params)
            .send()
            .map_err(|err| LoginError::transport(&self.identity_endpoint, err))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| LoginError::transport(&self.identity_endpoint, err))?;
        process_auth_response(status, &body, email)
    }

    fn exchange_token_for_cookies(&self, url: &str) -> Result<Vec<Cookie>> {
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|err| LoginError::transport(url, err))?;
        let status = response.status();
        if status != StatusCode::FOUND {
            return Err(LoginError::Failure(format!(
                "unexpected response from login exchange: {}",
                status.as_u16()
            )));
        }
        let host = response.url().host_str().unwrap_or_default().to_string();
        let cookies = response
            .cookies()
            .map(|cookie| Cookie {
                name: cookie.name().to_string(),
                value: cookie.value().to_string(),
                domain: cookie.domain().unwrap_or(&host).to_string(),
                path: cookie.path().unwrap_or("/").to_string(),
            })
            .collect();
        Ok(cookies)
    }
}

/// Interprets the identity endpoint's answer, returning the auth token.
fn process_auth_response(status: StatusCode, body: &str, email: &str) -> Result<String> {
    match status {
        StatusCode::OK => {
            let mut fields = parse_key_value_lines(body);
            fields.remove("Auth").ok_or_else(|| {
                LoginError::Failure("Login failed. Reason: no Auth token in response".to_string())
            })
        }
        StatusCode::FORBIDDEN => {
            let fields = parse_key_value_lines(body);
            let mut reason = fields.get("Error").cloned().unwrap_or_default();
            if reason == "BadAuthentication"
                && let Some(info) = fields.get("Info").filter(|info| !info.is_empty())
            {
                reason = format!("{reason} {info}");
            }
            Err(LoginError::Failure(format!("Login failed. Reason: {reason}")))
        }
        StatusCode::UNAUTHORIZED => Err(LoginError::Failure(format!(
            "Email \"{email}\" and password do not match."
        ))),
        other => Err(LoginError::Failure(format!(
            "Bad authentication response: {}",
            other.as_u16()
        ))),
    }
}

/// Parses newline-delimited `key=value` pairs. Lines without a key are
/// ignored; later duplicates win.
pub fn parse_key_value_lines(body: &str) -> HashMap<String, String> {
    body.lines()
        .filter_map(|line| line.split_once('='))
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
