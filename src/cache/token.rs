use serde::{Deserialize, Serialize};

pub const TOKEN_VALUE_STUB: &str = "";

/// Access/refresh tokens, always replaced together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// The "no session" value.
    pub fn empty() -> Self {
        Self::new(TOKEN_VALUE_STUB, TOKEN_VALUE_STUB)
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_empty()
    }
}
