//! Environment variable configuration helpers.
//!
//! Each service builds an explicit `Config` struct in its `from_env()`; these
//! helpers keep the error messages uniform. There are deliberately no global
//! config singletons: every handle is threaded through constructors.

use std::{env, str::FromStr};

use anyhow::Context;

/// Load a `.env` file into the process env for local development, without
/// overriding variables that are already set. Missing files are fine.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

/// Read a required env var, with a uniform error message if it is unset.
pub fn req_var(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("{key} was not set"))
}

/// Read an optional env var. Unset and empty are both [`None`].
pub fn opt_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

/// Read `PORT` from env, falling back to the service's default.
pub fn port_or(default: u16) -> anyhow::Result<u16> {
    match opt_var("PORT") {
        Some(value) =>
            u16::from_str(&value).context("PORT was not a valid port number"),
        None => Ok(default),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // Process env is shared across test threads, so only read vars that this
    // test owns and never unset anything.
    #[test]
    fn port_parses() {
        std::env::set_var("PORT", "8099");
        assert_eq!(port_or(1234).unwrap(), 8099);
        std::env::set_var("PORT", "not-a-port");
        assert!(port_or(1234).is_err());
        std::env::remove_var("PORT");
        assert_eq!(port_or(1234).unwrap(), 1234);
    }
}
