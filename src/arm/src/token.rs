//! Bearer token sources

use crate::error::{ArmError, Result};

/// Supplies the bearer token for one audience (Resource Manager or Graph)
pub trait TokenSource: Send + Sync {
    fn token(&self) -> Result<String>;
}

/// Reads the token from an environment variable on every call, so a
/// wrapper script can refresh it between runs
#[derive(Debug, Clone)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    pub fn var(&self) -> &str {
        &self.var
    }
}

impl TokenSource for EnvToken {
    fn token(&self) -> Result<String> {
        let value = std::env::var(&self.var)
            .map_err(|_| ArmError::Token(format!("environment variable {} is not set", self.var)))?;
        let value = value.trim();
        if value.is_empty() {
            return Err(ArmError::Token(format!("environment variable {} is empty", self.var)));
        }
        Ok(value.to_string())
    }
}

/// A fixed token
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(..)")
    }
}

impl TokenSource for StaticToken {
    fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_env_token() {
        let source = EnvToken::new("APIM_ACCESS_TEST_TOKEN_THAT_IS_NEVER_SET");
        let err = source.token().unwrap_err();
        assert!(matches!(err, ArmError::Token(_)));
        assert!(err.to_string().contains("APIM_ACCESS_TEST_TOKEN_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn test_static_token_is_not_printed() {
        let token = StaticToken::new("secret");
        assert_eq!(token.token().unwrap(), "secret");
        assert!(!format!("{:?}", token).contains("secret"));
    }
}
