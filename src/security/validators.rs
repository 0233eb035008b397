//! Pure input validators shared by the client runtime and the registration flow.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use url::Url;

use lazy_static::lazy_static;

pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const NAME_MIN_LENGTH: usize = 2;
pub const NAME_MAX_LENGTH: usize = 50;
pub const ADMIN_CODE_LENGTH: usize = 8;

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}$").unwrap();
    // Letters (including accented), spaces, apostrophes, periods and hyphens.
    pub(crate) static ref NAME_REGEX: Regex = Regex::new(r"^\p{L}[\p{L}\s'.\-]*$").unwrap();
    static ref ADMIN_CODE_REGEX: Regex = Regex::new(r"^[A-Za-z0-9]+$").unwrap();
    static ref PHONE_SEPARATORS: Regex = Regex::new(r"[\s\-.()]").unwrap();
    static ref DEFAULT_PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9]{7,15}$").unwrap();
}

pub fn validate_email(email: &str) -> bool {
    let email = email.trim();
    email.len() <= 254 && EMAIL_REGEX.is_match(email)
}

/// Phone number pattern, matched after spaces, dashes, dots and parentheses are
/// removed from the input.
#[derive(Debug, Clone)]
pub struct PhonePattern(Regex);

impl PhonePattern {
    /// A regional pattern, e.g. `^\+?351?9[1236][0-9]{7}$`.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(PhonePattern)
    }
}

impl Default for PhonePattern {
    /// Optional leading `+` followed by 7 to 15 digits.
    fn default() -> Self {
        PhonePattern(DEFAULT_PHONE_REGEX.clone())
    }
}

pub fn validate_phone(phone: &str, pattern: &PhonePattern) -> bool {
    let compact = PHONE_SEPARATORS.replace_all(phone.trim(), "");
    !compact.is_empty() && pattern.0.is_match(&compact)
}

/// A single password-strength requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordRule {
    MinLength,
    Uppercase,
    Lowercase,
    Digit,
    Symbol,
}

impl PasswordRule {
    pub fn message(&self) -> &'static str {
        match self {
            PasswordRule::MinLength => "Password must be at least 8 characters long",
            PasswordRule::Uppercase => "Password must contain an uppercase letter",
            PasswordRule::Lowercase => "Password must contain a lowercase letter",
            PasswordRule::Digit => "Password must contain a digit",
            PasswordRule::Symbol => "Password must contain a special character",
        }
    }
}

impl fmt::Display for PasswordRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Checks every strength rule and reports all of the violated ones.
pub fn validate_password_strength(password: &str) -> Result<(), Vec<PasswordRule>> {
    let mut violations = Vec::new();

    if password.chars().count() < PASSWORD_MIN_LENGTH {
        violations.push(PasswordRule::MinLength);
    }
    if !password.chars().any(char::is_uppercase) {
        violations.push(PasswordRule::Uppercase);
    }
    if !password.chars().any(char::is_lowercase) {
        violations.push(PasswordRule::Lowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push(PasswordRule::Digit);
    }
    if !password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
    {
        violations.push(PasswordRule::Symbol);
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

pub fn validate_name(name: &str) -> bool {
    let name = name.trim();
    let len = name.chars().count();
    (NAME_MIN_LENGTH..=NAME_MAX_LENGTH).contains(&len) && NAME_REGEX.is_match(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextLengthError {
    TooShort { min: usize },
    TooLong { max: usize },
}

impl fmt::Display for TextLengthError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TextLengthError::TooShort { min } => write!(f, "must be at least {} characters", min),
            TextLengthError::TooLong { max } => write!(f, "must be at most {} characters", max),
        }
    }
}

/// Length bounds in characters, measured on the trimmed text.
pub fn validate_text_length(text: &str, min: usize, max: usize) -> Result<(), TextLengthError> {
    let len = text.trim().chars().count();
    if len < min {
        Err(TextLengthError::TooShort { min })
    } else if len > max {
        Err(TextLengthError::TooLong { max })
    } else {
        Ok(())
    }
}

/// Which URLs are acceptable.
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    pub schemes: Vec<String>,
    /// When set, the host must equal one of these or be a subdomain of one.
    pub allowed_hosts: Option<Vec<String>>,
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self {
            schemes: vec!["https".into(), "http".into()],
            allowed_hosts: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    Malformed,
    SchemeNotAllowed(String),
    MissingHost,
    HostNotAllowed(String),
}

impl fmt::Display for UrlError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UrlError::Malformed => write!(f, "malformed URL"),
            UrlError::SchemeNotAllowed(s) => write!(f, "scheme '{}' is not allowed", s),
            UrlError::MissingHost => write!(f, "URL has no host"),
            UrlError::HostNotAllowed(h) => write!(f, "host '{}' is not allowed", h),
        }
    }
}

pub fn validate_url(input: &str, policy: &UrlPolicy) -> Result<Url, UrlError> {
    let url = Url::parse(input.trim()).map_err(|_| UrlError::Malformed)?;

    if !policy.schemes.iter().any(|s| s == url.scheme()) {
        return Err(UrlError::SchemeNotAllowed(url.scheme().to_string()));
    }

    let host = url.host_str().ok_or(UrlError::MissingHost)?.to_lowercase();
    if let Some(allowed) = &policy.allowed_hosts {
        let permitted = allowed.iter().any(|a| {
            let a = a.to_lowercase();
            host == a || host.ends_with(&format!(".{}", a))
        });
        if !permitted {
            return Err(UrlError::HostNotAllowed(host));
        }
    }

    Ok(url)
}

/// Admin invitation codes are exactly eight ASCII letters or digits.
pub fn validate_admin_code(code: &str) -> bool {
    code.len() == ADMIN_CODE_LENGTH && ADMIN_CODE_REGEX.is_match(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_email_format() {
        assert!(validate_email("client@garden.pt"));
        assert!(validate_email(" first.last+tag@sub.example.com "));
        assert!(!validate_email("testexample.com"));
        assert!(!validate_email("a@b"));
        assert!(!validate_email("a@-bad.com"));
        assert!(!validate_email(""));
    }

    #[test]
    fn test_phone_default_and_regional() {
        let default = PhonePattern::default();
        assert!(validate_phone("+351 912 345 678", &default));
        assert!(validate_phone("(555) 123-4567", &default));
        assert!(!validate_phone("12345", &default));
        assert!(!validate_phone("call me", &default));

        let portugal = PhonePattern::new(r"^(\+351)?9[1236][0-9]{7}$").unwrap();
        assert!(validate_phone("912 345 678", &portugal));
        assert!(!validate_phone("+1 555 123 4567", &portugal));
    }

    #[test]
    fn test_password_reports_every_violation() {
        assert_eq!(validate_password_strength("Str0ng!pass"), Ok(()));

        assert_eq!(
            validate_password_strength("abc"),
            Err(vec![
                PasswordRule::MinLength,
                PasswordRule::Uppercase,
                PasswordRule::Digit,
                PasswordRule::Symbol,
            ])
        );
        assert_eq!(
            validate_password_strength(""),
            Err(vec![
                PasswordRule::MinLength,
                PasswordRule::Uppercase,
                PasswordRule::Lowercase,
                PasswordRule::Digit,
                PasswordRule::Symbol,
            ])
        );
    }

    #[test]
    fn test_password_missing_single_class() {
        let cases = [
            ("lowercase1!", PasswordRule::Uppercase),
            ("UPPERCASE1!", PasswordRule::Lowercase),
            ("NoDigits!!", PasswordRule::Digit),
            ("NoSymbol12", PasswordRule::Symbol),
            ("Sh0rt!", PasswordRule::MinLength),
        ];
        for (password, rule) in cases {
            assert_eq!(validate_password_strength(password), Err(vec![rule]), "{}", password);
        }
    }

    #[test]
    fn test_name_charset() {
        assert!(validate_name("João Silva"));
        assert!(validate_name("Mary-Jane O'Neil"));
        assert!(!validate_name("J"));
        assert!(!validate_name("Robert'); DROP TABLE"));
        assert!(!validate_name("<b>Eve</b>"));
        assert!(!validate_name(&"a".repeat(51)));
    }

    #[test]
    fn test_text_length_bounds() {
        assert_eq!(validate_text_length("  hi  ", 2, 10), Ok(()));
        assert_eq!(
            validate_text_length("h", 2, 10),
            Err(TextLengthError::TooShort { min: 2 })
        );
        assert_eq!(
            validate_text_length("hello world!", 2, 10),
            Err(TextLengthError::TooLong { max: 10 })
        );
    }

    #[test]
    fn test_url_policy() {
        let policy = UrlPolicy::default();
        assert!(validate_url("https://garden.example.com/path", &policy).is_ok());
        assert_eq!(
            validate_url("javascript:alert(1)", &policy),
            Err(UrlError::SchemeNotAllowed("javascript".into()))
        );
        assert_eq!(validate_url("not a url", &policy), Err(UrlError::Malformed));

        let restricted = UrlPolicy {
            schemes: vec!["https".into()],
            allowed_hosts: Some(vec!["example.com".into()]),
        };
        assert!(validate_url("https://cdn.example.com/a.png", &restricted).is_ok());
        assert_eq!(
            validate_url("https://evil-example.com", &restricted),
            Err(UrlError::HostNotAllowed("evil-example.com".into()))
        );
        assert_eq!(
            validate_url("http://example.com", &restricted),
            Err(UrlError::SchemeNotAllowed("http".into()))
        );
    }

    #[test]
    fn test_admin_code_format() {
        assert!(validate_admin_code("GARDEN24"));
        assert!(validate_admin_code("a1b2c3d4"));
        assert!(!validate_admin_code("GARDEN2"));
        assert!(!validate_admin_code("GARDEN-24"));
        assert!(!validate_admin_code("GÅRDEN24"));
    }
}
