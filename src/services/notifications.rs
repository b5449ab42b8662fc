use crate::config::SmtpConfig;
use crate::entities::{order, order_item};
use crate::errors::ServiceError;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, instrument};

/// Order-confirmation email over async SMTP. Strictly best-effort: the paid
/// transition is committed before this runs and is never affected by
/// delivery failure.
pub struct NotificationService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl NotificationService {
    pub fn new(cfg: &SmtpConfig) -> Result<Self, ServiceError> {
        let credentials = Credentials::new(cfg.username.clone(), cfg.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .map_err(|e| ServiceError::Internal(format!("smtp relay setup failed: {e}")))?
            .port(cfg.port)
            .credentials(credentials)
            .build();

        let from = cfg
            .from_address
            .parse::<Mailbox>()
            .map_err(|e| ServiceError::Internal(format!("invalid from address: {e}")))?;

        Ok(Self { mailer, from })
    }

    #[instrument(skip(self, order, items), fields(order_id = %order.id))]
    pub async fn send_order_confirmation(
        &self,
        order: &order::Model,
        items: &[order_item::Model],
    ) -> Result<(), ServiceError> {
        let to = order
            .email
            .parse::<Mailbox>()
            .map_err(|e| ServiceError::Internal(format!("invalid recipient address: {e}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(format!("Your order {} is confirmed", order.gateway_reference))
            .header(ContentType::TEXT_HTML)
            .body(render_confirmation(order, items))
            .map_err(|e| ServiceError::Internal(format!("failed to build email: {e}")))?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| ServiceError::Internal(format!("smtp send failed: {e}")))?;

        info!("order confirmation email sent");
        Ok(())
    }
}

fn render_confirmation(order: &order::Model, items: &[order_item::Model]) -> String {
    let rows: String = items
        .iter()
        .map(|item| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{} {}</td></tr>",
                item.name, item.quantity, order.currency, item.unit_price
            )
        })
        .collect();

    format!(
        "<h2>Thank you for your order, {name}!</h2>\
         <p>Reference: <strong>{reference}</strong></p>\
         <table><tr><th>Item</th><th>Qty</th><th>Price</th></tr>{rows}</table>\
         <p>Total (incl. delivery): <strong>{currency} {total}</strong></p>\
         <p>Delivery to: {address}</p>",
        name = order.customer_name,
        reference = order.gateway_reference,
        rows = rows,
        currency = order.currency,
        total = order.total_price,
        address = order.delivery_address,
    )
}
