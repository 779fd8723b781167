use lazy_static::lazy_static;
use regex::Regex;

use crate::store::DEFAULT_REDIRECT;

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    }
    !email.is_empty() && EMAIL_RE.is_match(email)
}

/// Only same-site absolute paths are allowed as post-login destinations.
///
/// The result always fits in a `Location` header: control characters are
/// rejected along with off-site targets.
pub fn normalize_redirect(value: Option<&str>) -> String {
    match value {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path.to_string()
        }
        _ => DEFAULT_REDIRECT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("a.b+c@sub.domain.io"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("missing@tld"));
    }

    #[test]
    fn redirects_stay_on_site() {
        assert_eq!(normalize_redirect(None), "/user");
        assert_eq!(normalize_redirect(Some("/admin/jobs/1")), "/admin/jobs/1");
        assert_eq!(normalize_redirect(Some("https://evil.example")), "/user");
        assert_eq!(normalize_redirect(Some("//evil.example")), "/user");
        assert_eq!(normalize_redirect(Some("/\\evil.example")), "/user");
        assert_eq!(normalize_redirect(Some("")), "/user");
    }

    #[test]
    fn redirects_with_control_characters_fall_back() {
        assert_eq!(normalize_redirect(Some("/user\n")), "/user");
        assert_eq!(normalize_redirect(Some("/jobs\r\nSet-Cookie: x=1")), "/user");
        assert_eq!(normalize_redirect(Some("/a\tb")), "/user");
        assert_eq!(normalize_redirect(Some("/a\u{7f}")), "/user");
        assert_eq!(normalize_redirect(Some("/lowongan/ü")), "/lowongan/ü");
    }
}
