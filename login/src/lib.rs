//! Authentication against a remote application: ClientLogin token exchange,
//! the development-server shortcut, and the textual credential format that
//! lets a session be reused without logging in again.

mod client_login;
mod cookie;
mod credential_store;
mod credentials;
mod dev_server;
mod error;
mod server;

pub use client_login::AuthenticationClient;
pub use client_login::CLIENT_LOGIN_URL;
pub use client_login::CLIENT_SOURCE;
pub use client_login::parse_key_value_lines;
pub use cookie::Cookie;
pub use cookie::cookie_header;
pub use credential_store::read_credentials_file;
pub use credential_store::write_credentials_file;
pub use credentials::Credentials;
pub use dev_server::DEV_APPSERVER_COOKIE;
pub use dev_server::encode_email_as_user_id;
pub use dev_server::make_dev_appserver_cookie;
pub use error::LoginError;
pub use error::Result;
pub use server::LOCALHOST;
pub use server::ServerAddress;
