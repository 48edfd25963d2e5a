use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;

/// Look up `name` in a `Cookie` header style string (`a=1; b=2`).
///
/// Returns the percent-decoded value of the first matching pair, or `None`
/// when the string is empty or has no such key.
pub fn get_cookie(cookie_header: &str, name: &str) -> Option<String> {
    if cookie_header.is_empty() {
        return None;
    }

    cookie_header
        .split(';')
        .map(str::trim)
        .find_map(|pair| {
            let value = pair.strip_prefix(name)?.strip_prefix('=')?;
            Some(match urlencoding::decode(value) {
                Ok(decoded) => decoded.into_owned(),
                Err(e) => {
                    tracing::warn!("Cookie {} is not valid UTF-8 once decoded: {}", name, e);
                    value.to_string()
                }
            })
        })
}

/// Source of the anti-forgery token echoed back on every exchange.
pub trait TokenProvider: Send + Sync {
    fn csrf_token(&self) -> Option<String>;
}

/// Reads the token from the cookie jar shared with the HTTP client.
pub struct CookieTokenProvider {
    jar: Arc<Jar>,
    url: Url,
    cookie_name: String,
}

impl CookieTokenProvider {
    pub fn new(jar: Arc<Jar>, url: Url, cookie_name: &str) -> Self {
        Self {
            jar,
            url,
            cookie_name: cookie_name.to_string(),
        }
    }
}

impl TokenProvider for CookieTokenProvider {
    fn csrf_token(&self) -> Option<String> {
        let header = self.jar.cookies(&self.url)?;
        let header = header.to_str().ok()?;
        get_cookie(header, &self.cookie_name)
    }
}

/// A fixed token, e.g. one passed on the command line.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl TokenProvider for StaticToken {
    fn csrf_token(&self) -> Option<String> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_cookie_finds_middle_pair() {
        let store = "foo=bar; csrftoken=abc123; baz=qux";
        assert_eq!(get_cookie(store, "csrftoken"), Some("abc123".to_string()));
    }

    #[test]
    fn test_get_cookie_missing() {
        assert_eq!(get_cookie("foo=bar", "csrftoken"), None);
        assert_eq!(get_cookie("", "csrftoken"), None);
    }

    #[test]
    fn test_get_cookie_requires_exact_key() {
        // a key that merely starts with the name must not match
        let store = "csrftokenx=nope; xcsrftoken=nope";
        assert_eq!(get_cookie(store, "csrftoken"), None);
    }

    #[test]
    fn test_get_cookie_first_match_wins() {
        let store = "csrftoken=first;csrftoken=second";
        assert_eq!(get_cookie(store, "csrftoken"), Some("first".to_string()));
    }

    #[test]
    fn test_get_cookie_decodes_value() {
        let store = "  name=hello%20world%3B  ";
        assert_eq!(get_cookie(store, "name"), Some("hello world;".to_string()));
    }

    #[test]
    fn test_get_cookie_empty_value() {
        assert_eq!(get_cookie("csrftoken=", "csrftoken"), Some(String::new()));
    }

    #[test]
    fn test_cookie_token_provider_reads_jar() {
        let url = Url::parse("http://127.0.0.1:8000/").unwrap();
        let jar = Arc::new(Jar::default());
        let provider = CookieTokenProvider::new(jar.clone(), url.clone(), "csrftoken");

        assert_eq!(provider.csrf_token(), None);

        jar.add_cookie_str("sessionid=s1; Path=/", &url);
        jar.add_cookie_str("csrftoken=tok42; Path=/", &url);
        assert_eq!(provider.csrf_token(), Some("tok42".to_string()));
    }

    #[test]
    fn test_static_token() {
        assert_eq!(StaticToken(Some("t".into())).csrf_token(), Some("t".to_string()));
        assert_eq!(StaticToken::default().csrf_token(), None);
    }
}
