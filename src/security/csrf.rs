use rand::RngCore;
use subtle::ConstantTimeEq;

pub const CSRF_HEADER: &str = "X-CSRF-Token";
pub const CSRF_COOKIE: &str = "csrf_token";

const TOKEN_BYTES: usize = 32;

/// 32 random bytes, hex-encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Constant-time comparison of two CSRF tokens. Empty tokens never match.
pub fn tokens_match(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Methods that change state and therefore carry the CSRF token.
pub fn is_mutating(method: &str) -> bool {
    matches!(
        method.to_ascii_uppercase().as_str(),
        "POST" | "PUT" | "PATCH" | "DELETE"
    )
}

/// Per-session CSRF token held by the client runtime.
///
/// The same value goes into the `csrf_token` cookie and the `X-CSRF-Token` header
/// (double submit); the server guard checks that both are present and equal.
#[derive(Debug, Clone)]
pub struct CsrfSession {
    token: String,
}

impl CsrfSession {
    pub fn new() -> Self {
        Self {
            token: generate_token(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Replaces the token, e.g. after login or logout.
    pub fn rotate(&mut self) {
        self.token = generate_token();
    }

    /// Header to attach to a request, `None` for safe methods.
    pub fn header_for(&self, method: &str) -> Option<(&'static str, String)> {
        is_mutating(method).then(|| (CSRF_HEADER, self.token.clone()))
    }

    pub fn cookie(&self) -> String {
        format!("{}={}; Path=/; SameSite=Strict", CSRF_COOKIE, self.token)
    }
}

impl Default for CsrfSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_unique_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_tokens_match() {
        let token = generate_token();
        assert!(tokens_match(&token, &token.clone()));
        assert!(!tokens_match(&token, &generate_token()));
        assert!(!tokens_match(&token, &token[..10]));
        assert!(!tokens_match("", ""));
    }

    #[test]
    fn test_session_header_only_for_mutating_methods() {
        let mut session = CsrfSession::new();
        assert!(session.header_for("GET").is_none());
        assert!(session.header_for("options").is_none());

        let (name, value) = session.header_for("post").unwrap();
        assert_eq!(name, CSRF_HEADER);
        assert_eq!(value, session.token());

        let before = session.token().to_string();
        session.rotate();
        assert_ne!(before, session.token());
        assert!(session.cookie().starts_with("csrf_token="));
    }
}
