//! Delivery of phone and email confirmations.

use crate::{VerificationError, VerificationKind, VerificationResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;
use wasel_auth::{AuthError, SupabaseBackend};

/// Sends the code or link the user needs to confirm a contact method.
#[async_trait]
pub trait ConfirmationChannel: Send + Sync {
    async fn send_phone_code(&self, phone: &str) -> VerificationResult<()>;

    async fn send_email_confirmation(&self, email: &str) -> VerificationResult<()>;
}

/// Confirmations through Supabase auth (SMS OTP and signup email resend).
pub struct SupabaseConfirmationChannel {
    backend: Arc<SupabaseBackend>,
}

impl SupabaseConfirmationChannel {
    pub fn new(backend: Arc<SupabaseBackend>) -> Self {
        Self { backend }
    }
}

fn confirmation_error(error: AuthError) -> VerificationError {
    if error.is_transient() {
        VerificationError::Network(error.to_string())
    } else {
        VerificationError::Confirmation(error.user_message())
    }
}

#[async_trait]
impl ConfirmationChannel for SupabaseConfirmationChannel {
    async fn send_phone_code(&self, phone: &str) -> VerificationResult<()> {
        self.backend
            .send_phone_otp(phone)
            .await
            .map_err(confirmation_error)
    }

    async fn send_email_confirmation(&self, email: &str) -> VerificationResult<()> {
        self.backend
            .resend_email_confirmation(email)
            .await
            .map_err(confirmation_error)
    }
}

/// Channel that records confirmations instead of sending them.
#[derive(Default)]
pub struct SimulatedConfirmationChannel {
    sent: Mutex<Vec<(VerificationKind, String)>>,
}

impl SimulatedConfirmationChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Confirmations sent so far, oldest first.
    pub fn sent(&self) -> Vec<(VerificationKind, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl ConfirmationChannel for SimulatedConfirmationChannel {
    async fn send_phone_code(&self, phone: &str) -> VerificationResult<()> {
        info!(phone, "Simulated phone verification code sent");
        self.sent
            .lock()
            .push((VerificationKind::Phone, phone.to_string()));
        Ok(())
    }

    async fn send_email_confirmation(&self, email: &str) -> VerificationResult<()> {
        info!(email, "Simulated email confirmation sent");
        self.sent
            .lock()
            .push((VerificationKind::Email, email.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_error_mapping() {
        assert!(matches!(
            confirmation_error(AuthError::Network("offline".to_string())),
            VerificationError::Network(_)
        ));
        assert!(matches!(
            confirmation_error(AuthError::auth("Email rate limit exceeded", None)),
            VerificationError::Confirmation(_)
        ));
    }

    #[tokio::test]
    async fn test_simulated_channel_records() {
        let channel = SimulatedConfirmationChannel::new();
        channel.send_phone_code("+971501234567").await.unwrap();
        channel
            .send_email_confirmation("rider@example.com")
            .await
            .unwrap();

        assert_eq!(
            channel.sent(),
            vec![
                (VerificationKind::Phone, "+971501234567".to_string()),
                (VerificationKind::Email, "rider@example.com".to_string()),
            ]
        );
    }
}
