use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// One active session: an opaque bearer token bound to its owning account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub username: String,
}

/// 128-bit random session token, hex-encoded.
pub fn generate_token() -> Result<String> {
    let mut buf = [0u8; 16];
    getrandom::getrandom(&mut buf).map_err(|e| anyhow!(e.to_string()))?;
    let mut out = String::with_capacity(32);
    use std::fmt::Write as _;
    for b in &buf {
        let _ = write!(&mut out, "{:02x}", b);
    }
    Ok(out)
}
