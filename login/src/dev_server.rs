use md5::Digest;
use md5::Md5;

use crate::Cookie;

/// Cookie the development server reads to decide who is logged in.
pub const DEV_APPSERVER_COOKIE: &str = "dev_appserver_login";

const USER_ID_LEN: usize = 21;

/// Builds the login cookie a development server accepts without any
/// password exchange: `<email>:true:<user id>` (the `true` marks an admin).
pub fn make_dev_appserver_cookie(host: &str, email: &str) -> Cookie {
    let value = format!("{email}:true:{}", encode_email_as_user_id(email));
    Cookie::new(host, DEV_APPSERVER_COOKIE, value)
}

/// Numeric user id the development server derives from the lower-cased
/// email: `1` followed by every MD5 byte in decimal, cut to 21 digits.
pub fn encode_email_as_user_id(email: &str) -> String {
    let digest = Md5::digest(email.to_lowercase().as_bytes());
    let mut id = String::from("1");
    for byte in digest {
        id.push_str(&format!("{byte:02}"));
    }
    id.truncate(USER_ID_LEN);
    id
}
