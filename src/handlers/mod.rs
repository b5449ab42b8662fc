use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::services::{
    CartService, CatalogService, CheckoutService, OrderService, PaymentGateway,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub mod carts;
pub mod checkout;
pub mod common;
pub mod orders;

/// Services shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: CatalogService,
    pub cart: CartService,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub gateway: Arc<PaymentGateway>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        config: &AppConfig,
    ) -> Result<Self, ServiceError> {
        let catalog = CatalogService::new(db.clone());
        let orders = OrderService::new(db.clone());
        let gateway = Arc::new(PaymentGateway::new(&config.gateway)?);
        let cart = CartService::new(db.clone(), catalog.clone(), event_sender.clone());
        let checkout = CheckoutService::new(
            db,
            catalog.clone(),
            orders.clone(),
            gateway.clone(),
            event_sender,
            config.delivery_fee,
            config.currency.clone(),
            config.order_expiry_hours,
        );

        Ok(Self {
            catalog,
            cart,
            checkout,
            orders,
            gateway,
        })
    }
}
