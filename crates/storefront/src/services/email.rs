//! Transactional email delivery.
//!
//! Uses SMTP via lettre. Order notifications are best-effort by contract:
//! [`Notifier`] logs and discards every failure so a mail outage can never
//! fail a checkout that already persisted its order.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use thiserror::Error;

use opaline_core::{Email, OrderId, PaymentMethod, Price};

use crate::config::EmailConfig;
use crate::models::NewOrderItem;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// Everything the order emails need, captured at checkout time.
#[derive(Debug, Clone)]
pub struct OrderNotification {
    pub order_id: OrderId,
    pub customer_name: String,
    pub customer_email: Email,
    pub shipping_address: String,
    pub contact_no: String,
    pub payment_method: PaymentMethod,
    pub total_amount: Decimal,
    pub items: Vec<NewOrderItem>,
    pub is_new_account: bool,
    pub temp_password: Option<String>,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    operator_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            operator_address: config.operator_address.clone(),
        })
    }

    /// Send the buyer's order confirmation, including one-time credentials
    /// for a freshly provisioned account.
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be built or sent.
    pub async fn send_order_confirmation(
        &self,
        notification: &OrderNotification,
    ) -> Result<(), EmailError> {
        let subject = format!("Order Confirmation - #{} - Opaline", notification.order_id);
        let body = customer_body(notification);

        self.send_plain_text(notification.customer_email.as_str(), &subject, &body)
            .await
    }

    /// Send the operator's new-order notification.
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be built or sent.
    pub async fn send_operator_notification(
        &self,
        notification: &OrderNotification,
    ) -> Result<(), EmailError> {
        let subject = format!(
            "New Order #{} - {}",
            notification.order_id,
            format_amount(notification.total_amount)
        );
        let body = operator_body(notification);

        self.send_plain_text(&self.operator_address, &subject, &body)
            .await
    }

    /// Send a plain text email.
    async fn send_plain_text(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

/// Best-effort notification boundary.
///
/// Holds an optional [`EmailService`]: deployments without SMTP configured
/// get logged no-ops. `order_placed` never returns an error - delivery
/// failures are visible only in logs, by design of the checkout contract.
#[derive(Clone)]
pub struct Notifier {
    service: Option<EmailService>,
}

impl Notifier {
    /// Wrap an email service, or `None` to disable outbound mail.
    #[must_use]
    pub const fn new(service: Option<EmailService>) -> Self {
        Self { service }
    }

    /// Send both order emails, ignoring failures.
    pub async fn order_placed(&self, notification: &OrderNotification) {
        let Some(service) = &self.service else {
            tracing::info!(
                order_id = %notification.order_id,
                "Email not configured; skipping order notifications"
            );
            return;
        };

        if let Err(e) = service.send_order_confirmation(notification).await {
            tracing::error!(
                order_id = %notification.order_id,
                error = %e,
                "Failed to send customer confirmation email"
            );
        }

        if let Err(e) = service.send_operator_notification(notification).await {
            tracing::error!(
                order_id = %notification.order_id,
                error = %e,
                "Failed to send operator notification email"
            );
        }
    }
}

/// Format a money amount in the store currency.
fn format_amount(amount: Decimal) -> String {
    Price::from_amount(amount).display()
}

/// One "  name xN - price" line per item.
fn items_block(items: &[NewOrderItem]) -> String {
    items
        .iter()
        .map(|item| {
            format!(
                "  {} x{} - {}",
                item.product_name,
                item.quantity,
                format_amount(item.line_total())
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the buyer's confirmation body.
fn customer_body(n: &OrderNotification) -> String {
    let mut body = format!(
        "Dear {name},\n\n\
         Thank you for your order! We're excited to confirm that we've received\n\
         your order and it's being processed.\n\n\
         Order ID: {order_id}\n\
         Payment Method: {payment}\n\n\
         Order Details:\n{items}\n\
         Total: {total}\n\n\
         Shipping Address:\n{address}\nPhone: {contact}\n",
        name = n.customer_name,
        order_id = n.order_id,
        payment = n.payment_method.label(),
        items = items_block(&n.items),
        total = format_amount(n.total_amount),
        address = n.shipping_address,
        contact = n.contact_no,
    );

    if n.is_new_account
        && let Some(temp_password) = &n.temp_password
    {
        body.push_str(&format!(
            "\nYour account has been created. You can sign in with:\n\
             Username: {email}\n\
             Temporary Password: {temp_password}\n\
             For security reasons, we recommend changing your password after logging in.\n",
            email = n.customer_email,
        ));
    }

    body.push_str(
        "\nWe'll notify you when your order ships. If you have any questions,\n\
         please don't hesitate to contact us.\n\n\
         Opaline\n",
    );

    body
}

/// Render the operator's notification body.
fn operator_body(n: &OrderNotification) -> String {
    format!(
        "New order received.\n\n\
         Order: #{order_id}\n\
         Total: {total}\n\n\
         Customer:\n\
         Name: {name}\n\
         Email: {email}\n\
         Phone: {contact}\n\
         Payment: {payment}\n\n\
         Shipping Address:\n{address}\n\n\
         Items:\n{items}\n",
        order_id = n.order_id,
        total = format_amount(n.total_amount),
        name = n.customer_name,
        email = n.customer_email,
        contact = n.contact_no,
        payment = n.payment_method.label(),
        address = n.shipping_address,
        items = items_block(&n.items),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use opaline_core::ProductId;

    fn notification(is_new_account: bool, temp_password: Option<String>) -> OrderNotification {
        OrderNotification {
            order_id: OrderId::new(42),
            customer_name: "Asha Rao".to_owned(),
            customer_email: Email::parse("asha@example.com").unwrap(),
            shipping_address: "12 Lake View Road, Pune".to_owned(),
            contact_no: "9876543210".to_owned(),
            payment_method: PaymentMethod::Upi,
            total_amount: Decimal::new(229_900, 2),
            items: vec![NewOrderItem {
                product_id: ProductId::from("P1"),
                product_name: "Opal pendant".to_owned(),
                product_image: None,
                unit_price: Decimal::new(50000, 2),
                quantity: 2,
            }],
            is_new_account,
            temp_password,
        }
    }

    #[test]
    fn test_customer_body_includes_order_and_items() {
        let body = customer_body(&notification(false, None));
        assert!(body.contains("Order ID: 42"));
        assert!(body.contains("Opal pendant x2 - ₹1000.00"));
        assert!(body.contains("Total: ₹2299.00"));
        assert!(body.contains("Payment Method: UPI"));
        assert!(!body.contains("Temporary Password"));
    }

    #[test]
    fn test_customer_body_includes_temp_credentials_for_new_account() {
        let body = customer_body(&notification(true, Some("abcDEF2345!1".to_owned())));
        assert!(body.contains("Username: asha@example.com"));
        assert!(body.contains("Temporary Password: abcDEF2345!1"));
    }

    #[test]
    fn test_operator_body_summarizes_order() {
        let body = operator_body(&notification(false, None));
        assert!(body.contains("Order: #42"));
        assert!(body.contains("Email: asha@example.com"));
        assert!(body.contains("12 Lake View Road, Pune"));
        // The operator never sees buyer credentials.
        assert!(!body.contains("Temporary Password"));
    }

    #[tokio::test]
    async fn test_notifier_without_service_is_a_noop() {
        let notifier = Notifier::new(None);
        notifier.order_placed(&notification(true, Some("pw".to_owned()))).await;
    }
}
