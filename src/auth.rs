use std::fmt;

use anyhow::{bail, Context, Result};
use console::Term;

/// API access token.
///
/// `Debug` is redacted so tokens never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> String {
        format!("token {}", self.0)
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Token(value.trim().to_string())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Token::from(value.as_str())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

/// Returns true when a token prompt can be shown.
pub fn can_prompt() -> bool {
    Term::stdout().is_term() && Term::stderr().is_term()
}

/// Reads a token from the terminal without echoing it.
pub fn prompt_token(host: &str) -> Result<Token> {
    eprintln!("Paste an access token for {host}.");
    eprintln!("Tokens can be created at https://{host}/settings/oauth/token");
    let raw = rpassword::prompt_password("Token: ").context("Failed to read token")?;
    let token = Token::from(raw);
    if token.as_str().is_empty() {
        bail!("No token entered");
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_redacted() {
        let token = Token::from("secret-value");
        assert_eq!(format!("{token:?}"), "Token(***)");
    }

    #[test]
    fn header_uses_token_scheme() {
        let token = Token::from("  abc123\n");
        assert_eq!(token.as_str(), "abc123");
        assert_eq!(token.header_value(), "token abc123");
    }
}
