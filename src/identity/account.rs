use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// One registered account. `shared_files` holds the fully qualified keys of
/// objects other owners have granted to this account, in grant order, with
/// no duplicates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    pub password_hash: String,
    #[serde(default)]
    pub shared_files: Vec<String>,
}

impl Account {
    pub fn new(username: &str, password_hash: String) -> Self {
        Self { username: username.to_string(), password_hash, shared_files: Vec::new() }
    }
}

/// Usernames double as object-key prefixes, so the charset stays narrow.
pub fn valid_username(name: &str) -> bool {
    USERNAME_RE.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_charset() {
        assert!(valid_username("alice"));
        assert!(valid_username("Bob_2-0"));
        assert!(!valid_username(""));
        assert!(!valid_username("a b"));
        assert!(!valid_username("a/b"));
        assert!(!valid_username("a.b"));
        assert!(!valid_username("né"));
    }
}
