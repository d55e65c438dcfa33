//! Interactive password prompts.

use anyhow::{Result, anyhow};
use inquire::validator::Validation;
use inquire::{CustomUserError, Password, PasswordDisplayMode};

use crate::password::PasswordPolicy;

/// Password prompts backed by `inquire`.
pub struct Prompt {
    /// Strength rules for newly chosen passwords.
    policy: PasswordPolicy,
}

impl Prompt {
    pub fn new(policy: PasswordPolicy) -> Self {
        Self { policy }
    }

    /// Asks for a new password twice and enforces the strength policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal interaction fails or is cancelled.
    pub fn prompt_new_password(&self) -> Result<String> {
        let policy = self.policy.clone();
        let validator = move |input: &str| -> Result<Validation, CustomUserError> {
            Ok(match policy.validate(input) {
                Ok(()) => Validation::Valid,
                Err(e) => Validation::Invalid(e.to_string().into()),
            })
        };

        Password::new("Enter a password to protect the API key")
            .with_display_mode(PasswordDisplayMode::Masked)
            .with_validator(validator)
            .with_custom_confirmation_message("Confirm password")
            .with_custom_confirmation_error_message("passwords do not match")
            .prompt()
            .map_err(|e| anyhow!("password input failed: {e}"))
    }

    /// Asks once for the password protecting a stored key.
    ///
    /// No strength check: a wrong password is detected by decryption.
    pub fn prompt_unlock_password(&self) -> Result<String> {
        Password::new("Enter the API key password")
            .with_display_mode(PasswordDisplayMode::Masked)
            .without_confirmation()
            .prompt()
            .map_err(|e| anyhow!("password input failed: {e}"))
    }
}

impl Default for Prompt {
    fn default() -> Self {
        Self::new(PasswordPolicy::default())
    }
}
