use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::error::NotifyError;

#[cfg(feature = "web")]
use lettre::message::Mailbox;
#[cfg(feature = "web")]
use lettre::transport::smtp::authentication::Credentials;
#[cfg(feature = "web")]
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// A guardian alert for one absence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsenceNotice {
    pub address: String,
    pub student_name: String,
    pub date: String,
}

impl AbsenceNotice {
    pub fn new(address: &str, student_name: &str, date: &str) -> Self {
        AbsenceNotice {
            address: address.to_string(),
            student_name: student_name.to_string(),
            date: date.to_string(),
        }
    }

    pub fn subject(&self) -> &'static str {
        "Attendance Alert"
    }

    pub fn body(&self) -> String {
        format!(
            "Dear Parent, your child {} was marked absent on {}. Please check their attendance.",
            self.student_name, self.date
        )
    }
}

/// Delivers absence notices to guardians.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notice: &AbsenceNotice) -> Result<(), NotifyError>;
}

/// Send `notice` on a detached task. The outcome is only logged; dropping the
/// returned handle does not cancel delivery.
pub fn dispatch(notifier: Arc<dyn Notifier>, notice: AbsenceNotice) -> JoinHandle<()> {
    tokio::spawn(async move {
        match notifier.send(&notice).await {
            Ok(()) => log::info!(
                "absence notice for {} sent to {}",
                notice.student_name,
                notice.address
            ),
            Err(e) => log::error!(
                "failed to send absence notice for {} to {}: {}",
                notice.student_name,
                notice.address,
                e
            ),
        }
    })
}

/// Used when no mail account is configured: notices are only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notice: &AbsenceNotice) -> Result<(), NotifyError> {
        log::warn!(
            "no mail account configured; would notify {}: {}",
            notice.address,
            notice.body()
        );
        Ok(())
    }
}

#[cfg(feature = "web")]
pub struct Mailer {
    smtp: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

#[cfg(feature = "web")]
impl Mailer {
    /// SMTP over implicit TLS with the given account.
    pub fn new(host: &str, port: u16, user: &str, password: &str) -> Result<Self, NotifyError> {
        let from: Mailbox = user.parse().map_err(|e: lettre::address::AddressError| {
            NotifyError::Address {
                address: user.to_string(),
                reason: e.to_string(),
            }
        })?;
        let creds = Credentials::new(user.to_string(), password.to_string());

        let smtp = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .credentials(creds)
            .port(port)
            .build();

        Ok(Mailer { smtp, from })
    }

    fn message(&self, notice: &AbsenceNotice) -> Result<Message, NotifyError> {
        let to: Mailbox = notice.address.parse().map_err(|e: lettre::address::AddressError| {
            NotifyError::Address {
                address: notice.address.clone(),
                reason: e.to_string(),
            }
        })?;
        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(notice.subject())
            .body(notice.body())
            .map_err(|e| NotifyError::Message(e.to_string()))
    }
}

#[cfg(feature = "web")]
#[async_trait]
impl Notifier for Mailer {
    async fn send(&self, notice: &AbsenceNotice) -> Result<(), NotifyError> {
        let email = self.message(notice)?;
        let response = self
            .smtp
            .send(email)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        log::debug!("smtp response: {:?}", response);
        Ok(())
    }
}
