pub mod common;
pub mod customers;
pub mod orders;
pub mod products;

use std::sync::Arc;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::customers::CustomerService;
use crate::services::notifications::WhatsAppNotifier;
use crate::services::orders::OrderService;
use crate::services::products::ProductService;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub customers: Arc<CustomerService>,
    pub products: Arc<ProductService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        notifier: Arc<WhatsAppNotifier>,
    ) -> Self {
        let orders = Arc::new(OrderService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
            notifier,
        ));
        let customers = Arc::new(CustomerService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
        ));
        let products = Arc::new(ProductService::new(db_pool, Some(event_sender)));

        Self {
            orders,
            customers,
            products,
        }
    }
}
