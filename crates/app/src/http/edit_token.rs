use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::Response;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

/// Mirror of `Set-Cookie` for clients that cannot read cross-origin cookies.
pub const X_SET_COOKIE: HeaderName = HeaderName::from_static("x-set-cookie");

/// Signs the right to edit comment `id` while its text is `text`.
pub fn issue(session_key: &str, id: i64, text: &str) -> String {
    format!("{id}.{}", URL_SAFE_NO_PAD.encode(signature(session_key, id, text)))
}

/// A token only verifies for the comment's current text: an edit revokes
/// every token issued before it.
pub fn verify(session_key: &str, id: i64, text: &str, token: &str) -> bool {
    let Some((token_id, sig)) = token.split_once('.') else {
        return false;
    };
    if token_id.parse::<i64>().ok() != Some(id) {
        return false;
    }
    let Ok(sig) = URL_SAFE_NO_PAD.decode(sig.as_bytes()) else {
        return false;
    };
    mac(session_key, id, text).verify_slice(&sig).is_ok()
}

/// Token for `id` from the `Cookie` header, under `{id}` or `isso-{id}`.
pub fn extract(headers: &HeaderMap, id: i64) -> Option<String> {
    let plain = id.to_string();
    let prefixed = format!("isso-{id}");
    for header in headers.get_all(COOKIE) {
        let Ok(header) = header.to_str() else {
            continue;
        };
        for part in header.split(';') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key == plain || key == prefixed {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

/// Sets the edit cookie on `response` and mirrors it in `X-Set-Cookie`.
pub fn attach(mut response: Response, id: i64, token: &str, max_age_secs: u64, secure: bool) -> Response {
    let cookie = build_cookie_value(&id.to_string(), token, max_age_secs, secure);
    let mirrored = build_cookie_value(&format!("isso-{id}"), token, max_age_secs, secure);
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        headers.append(SET_COOKIE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&mirrored) {
        headers.append(X_SET_COOKIE, value);
    }
    response
}

/// Clears the edit cookie after a delete.
pub fn expire(response: Response, id: i64, secure: bool) -> Response {
    attach(response, id, "", 0, secure)
}

fn build_cookie_value(name: &str, value: &str, max_age_secs: u64, secure: bool) -> String {
    let mut cookie = format!("{name}={value}; Path=/; Max-Age={max_age_secs}; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn signature(session_key: &str, id: i64, text: &str) -> Vec<u8> {
    mac(session_key, id, text).finalize().into_bytes().to_vec()
}

fn mac(session_key: &str, id: i64, text: &str) -> Hmac<Sha256> {
    let mut mac = Hmac::<Sha256>::new_from_slice(session_key.as_bytes())
        .expect("hmac can take key of any size");
    mac.update(id.to_string().as_bytes());
    mac.update(b":");
    mac.update(hex::encode(Sha256::digest(text.as_bytes())).as_bytes());
    mac
}
