//! Hosted bot launch credentials.

/// Credential triple for one hosted bot, discovered by index.
///
/// Issued when a trainer requests hosted deployment and immutable
/// afterwards; revocation happens by rotating the secrets, not by
/// mutating this value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// 1-based discovery index.
    pub index: u32,
    /// Unique reference to the trained model blob.
    pub model_uid: String,
    /// Key used to decrypt the model.
    pub model_key: String,
    /// Chat platform session token.
    pub bot_token: String,
}

impl Identity {
    /// Name of the settings blob for this identity in the config store.
    #[must_use]
    pub fn settings_blob_name(&self) -> String {
        format!("hosted_config_{}.json", self.model_uid)
    }
}
