use tracing::info;

/// Delivery of password reset links.
pub trait ResetMailer: Send + Sync {
    fn send_reset_link(&self, username: &str, email: &str, link: &str) -> anyhow::Result<()>;
}

/// Writes the link to the log instead of sending mail. Fine for development
/// and for deployments where an operator relays links by hand.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl ResetMailer for LogMailer {
    fn send_reset_link(&self, username: &str, email: &str, link: &str) -> anyhow::Result<()> {
        info!("Password reset for {} <{}>: {}", username, email, link);
        Ok(())
    }
}
