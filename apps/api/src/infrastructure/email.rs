//! Transactional email.
//!
//! Uses SMTP via lettre when configured; otherwise messages are written to
//! the log so flows such as password reset still work in development.

use async_trait::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::{authentication::Credentials, Error as SmtpError},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::config::EmailConfig;
use crate::domain::order::{Order, OrderStatus};

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// A plain-text message ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError>;
}

/// SMTP delivery with STARTTLS
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// Create a new SMTP mailer from configuration.
    pub fn new(config: &EmailConfig) -> Result<Self, EmailError> {
        let credentials =
            Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(email
                .to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(email.to.clone()))?)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)?;

        self.transport.send(message).await?;
        tracing::info!(to = %email.to, "Email sent");
        Ok(())
    }
}

/// Writes messages to the log instead of sending them
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            body = %email.body,
            "SMTP not configured, email logged instead of sent"
        );
        Ok(())
    }
}

pub fn password_reset_email(to: &str, name: &str, reset_link: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "Đặt lại mật khẩu".to_string(),
        body: format!(
            "Xin chào {},\n\n\
             Chúng tôi nhận được yêu cầu đặt lại mật khẩu cho tài khoản của bạn.\n\
             Mở liên kết sau trong vòng 15 phút để đặt mật khẩu mới:\n\n{}\n\n\
             Nếu bạn không yêu cầu, hãy bỏ qua email này.",
            name, reset_link
        ),
    }
}

pub fn order_confirmation_email(to: &str, order: &Order) -> OutgoingEmail {
    let lines: Vec<String> = order
        .items()
        .iter()
        .map(|item| {
            format!(
                "- {} x {}: {}",
                item.name,
                item.quantity,
                format_vnd(item.line_total())
            )
        })
        .collect();

    OutgoingEmail {
        to: to.to_string(),
        subject: format!("Xác nhận đơn hàng #{}", short_id(order)),
        body: format!(
            "Cảm ơn {} đã đặt hàng!\n\n{}\n\n\
             Tiền hàng: {}\nPhí vận chuyển: {}\nTổng cộng: {}\n\n\
             Giao đến: {}",
            order.shipping_address().recipient_name,
            lines.join("\n"),
            format_vnd(order.items_price()),
            format_vnd(order.shipping_fee()),
            format_vnd(order.total_price()),
            order.shipping_address().location.full_text()
        ),
    }
}

pub fn order_status_email(to: &str, order: &Order) -> OutgoingEmail {
    let status = match order.status() {
        OrderStatus::Pending => "đang chờ xử lý",
        OrderStatus::Confirmed => "đã được xác nhận",
        OrderStatus::Shipping => "đang được giao",
        OrderStatus::Delivered => "đã giao thành công",
        OrderStatus::Cancelled => "đã bị hủy",
    };

    OutgoingEmail {
        to: to.to_string(),
        subject: format!("Cập nhật đơn hàng #{}", short_id(order)),
        body: format!("Đơn hàng #{} của bạn {}.", short_id(order), status),
    }
}

fn short_id(order: &Order) -> String {
    order.id().simple().to_string()[..8].to_uppercase()
}

/// `1234567` -> `1.234.567 ₫`
pub fn format_vnd(amount: Decimal) -> String {
    let whole = amount.round().normalize().to_string();
    let (sign, digits) = match whole.strip_prefix('-') {
        Some(rest) => ("-", rest.to_string()),
        None => ("", whole),
    };

    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    format!("{}{} ₫", sign, grouped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vnd_grouping() {
        assert_eq!(format_vnd(Decimal::new(0, 0)), "0 ₫");
        assert_eq!(format_vnd(Decimal::new(999, 0)), "999 ₫");
        assert_eq!(format_vnd(Decimal::new(30_000, 0)), "30.000 ₫");
        assert_eq!(format_vnd(Decimal::new(1_234_567, 0)), "1.234.567 ₫");
    }

    #[test]
    fn reset_email_contains_link() {
        let email = password_reset_email("a@b.vn", "Lan", "http://localhost:3000/reset?token=x");
        assert_eq!(email.to, "a@b.vn");
        assert!(email.body.contains("http://localhost:3000/reset?token=x"));
        assert!(email.body.contains("Lan"));
    }

    #[tokio::test]
    async fn log_mailer_never_fails() {
        let email = password_reset_email("a@b.vn", "Lan", "link");
        assert!(LogMailer.send(email).await.is_ok());
    }
}
