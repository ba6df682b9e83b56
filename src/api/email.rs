//! Email delivery abstraction for OTP codes.
//!
//! The credential service hands a generated code to an [`EmailSender`] and
//! reports a delivery failure to the caller; the code stays persisted, so
//! re-requesting is always a safe retry. The default sender for local dev is
//! [`LogEmailSender`], which logs instead of sending. A real transport (SMTP,
//! provider API) implements the same trait.

use anyhow::Result;
use tracing::info;

#[derive(Clone, Debug)]
pub struct OtpMessage {
    pub to_email: String,
    pub code: String,
}

/// Delivery contract; implementations must be safe to retry with the same
/// message.
pub trait EmailSender: Send + Sync {
    /// Deliver the code or return an error so the caller can report it.
    ///
    /// # Errors
    /// Returns an error when the underlying transport rejects the message.
    fn send(&self, message: &OtpMessage) -> Result<()>;
}

/// Local dev sender that logs the code instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &OtpMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            code = %message.code,
            "otp email send stub"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sender_always_succeeds() {
        let sender = LogEmailSender;
        let message = OtpMessage {
            to_email: "a@x.com".to_string(),
            code: "123456".to_string(),
        };
        assert!(sender.send(&message).is_ok());
        // Retrying the same message is fine.
        assert!(sender.send(&message).is_ok());
    }
}
