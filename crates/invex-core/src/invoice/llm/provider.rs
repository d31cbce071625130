//! LLM providers and the credentials used to reach them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google Gemini via `generateContent`.
    #[default]
    Google,
    /// OpenAI via `chat/completions`.
    #[serde(rename = "openai")]
    OpenAi,
}

impl Provider {
    /// Token used on the command line and in configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::OpenAi => "openai",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Google => "Google",
            Provider::OpenAi => "OpenAI",
        }
    }

    /// Environment variable consulted at the boundary for this provider's key.
    pub fn env_var(self) -> &'static str {
        match self {
            Provider::Google => "GOOGLE_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unknown provider token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown LLM provider '{0}' (expected 'google' or 'openai')")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Provider::Google),
            "openai" => Ok(Provider::OpenAi),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// API credentials for one provider.
///
/// Resolved once by the caller and passed down explicitly.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub provider: Provider,
    api_key: String,
}

impl Credentials {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Resolve credentials: explicit key first, then `lookup(provider.env_var())`.
    ///
    /// Blank keys count as missing. `lookup` is normally `std::env::var(..).ok()`.
    pub fn resolve<F>(provider: Provider, explicit: Option<&str>, lookup: F) -> Option<Self>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let key = explicit
            .map(str::to_string)
            .filter(|k| !k.trim().is_empty())
            .or_else(|| lookup(provider.env_var()).filter(|k| !k.trim().is_empty()))?;

        Some(Self::new(provider, key.trim()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_tokens() {
        assert_eq!("google".parse::<Provider>().unwrap(), Provider::Google);
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert!("anthropic".parse::<Provider>().is_err());
        assert_eq!(Provider::OpenAi.to_string(), "openai");
    }

    #[test]
    fn test_provider_serde() {
        assert_eq!(serde_json::to_string(&Provider::OpenAi).unwrap(), r#""openai""#);
        assert_eq!(serde_json::from_str::<Provider>(r#""google""#).unwrap(), Provider::Google);
    }

    #[test]
    fn test_resolve_prefers_explicit_key() {
        let creds = Credentials::resolve(Provider::Google, Some("explicit"), |_| Some("env".into())).unwrap();
        assert_eq!(creds.api_key(), "explicit");
    }

    #[test]
    fn test_resolve_falls_back_to_lookup() {
        let creds = Credentials::resolve(Provider::OpenAi, None, |var| {
            assert_eq!(var, "OPENAI_API_KEY");
            Some("sk-test".into())
        })
        .unwrap();
        assert_eq!(creds.api_key(), "sk-test");

        assert!(Credentials::resolve(Provider::OpenAi, Some("  "), |_| None).is_none());
    }

    #[test]
    fn test_debug_redacts_key() {
        let creds = Credentials::new(Provider::Google, "secret-key");
        assert!(!format!("{:?}", creds).contains("secret-key"));
    }
}
