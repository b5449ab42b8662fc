pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod gateway;
pub mod notifications;
pub mod orders;

pub use cart::CartService;
pub use catalog::CatalogService;
pub use checkout::{CheckoutService, ConfirmationOutcome};
pub use gateway::PaymentGateway;
pub use notifications::NotificationService;
pub use orders::OrderService;
