//! Caller-supplied settings for opening a container.

use std::fmt;

use super::error::{MdictError, Result};

/// Registration code plus the user identifier it was issued for.
///
/// Needed only for containers whose `Encrypted` attribute has bit 0 set.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    reg_code: Vec<u8>,
    user_id: String,
}

impl Credential {
    pub fn new(reg_code: impl Into<Vec<u8>>, user_id: impl Into<String>) -> Self {
        Self {
            reg_code: reg_code.into(),
            user_id: user_id.into(),
        }
    }

    /// Builds a credential from a hex registration code (32 hex chars).
    pub fn from_hex(reg_code_hex: &str, user_id: impl Into<String>) -> Result<Self> {
        let reg_code = hex::decode(reg_code_hex.trim())
            .map_err(|e| MdictError::InvalidCredential(format!("Invalid regcode hex: {}", e)))?;
        Ok(Self::new(reg_code, user_id))
    }

    pub fn reg_code(&self) -> &[u8] {
        &self.reg_code
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

// Keep registration codes out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("reg_code", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Options for [`MdictReader::open`](crate::MdictReader::open).
#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub(crate) credential: Option<Credential>,
    pub(crate) encoding: Option<String>,
    pub(crate) substitute_styles: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            credential: None,
            encoding: None,
            substitute_styles: true,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credential used to decrypt the key index header.
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Overrides the text encoding declared in the header (ignored for MDD files).
    pub fn encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = Some(label.into());
        self
    }

    /// Enables or disables stylesheet substitution for MDX records. On by default.
    pub fn substitute_styles(mut self, enabled: bool) -> Self {
        self.substitute_styles = enabled;
        self
    }
}
