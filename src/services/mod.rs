pub mod customers;
pub mod notifications;
pub mod order_status;
pub mod orders;
pub mod products;
