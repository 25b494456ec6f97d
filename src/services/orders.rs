use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::customer::Entity as CustomerEntity,
    entities::order::{self, ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel},
    entities::order_item::{self, ActiveModel as OrderItemActiveModel, Entity as OrderItemEntity, Model as OrderItemModel},
    entities::product::Entity as ProductEntity,
    errors::ServiceError,
    events::{Event, EventSender},
    services::notifications::{OrderLine, WhatsAppNotifier},
    services::order_status::OrderStatus,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    pub notes: Option<String>,
    #[validate(
        length(min = 1, message = "Order must contain at least one item"),
        custom = "validate_item_quantities"
    )]
    pub items: Vec<CreateOrderItemRequest>,
}

fn validate_item_quantities(
    items: &[CreateOrderItemRequest],
) -> Result<(), validator::ValidationError> {
    if items.iter().any(|item| item.quantity < 1) {
        return Err(validator::ValidationError::new("quantity_positive"));
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItemResponse>,
    pub version: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Filters for order listing.
#[derive(Debug, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub customer_id: Option<Uuid>,
}

/// Service owning the order aggregate: creation with price snapshotting,
/// total computation, and the status workflow.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    notifier: Arc<WhatsAppNotifier>,
}

impl OrderService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        notifier: Arc<WhatsAppNotifier>,
    ) -> Self {
        Self {
            db,
            event_sender,
            notifier,
        }
    }

    /// Creates an order together with its items in a single transaction.
    ///
    /// Each item snapshots the current product price as `unit_price`;
    /// `total_amount` is the sum of the item subtotals. Stock is not
    /// touched (inventory is informational in this system). The WhatsApp
    /// confirmation is dispatched after commit and never fails the call.
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let customer = CustomerEntity::find_by_id(request.customer_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                warn!(customer_id = %request.customer_id, "Customer not found for order creation");
                ServiceError::NotFound(format!("Customer {} not found", request.customer_id))
            })?;

        let mut total_amount = Decimal::ZERO;
        let mut item_models = Vec::with_capacity(request.items.len());
        let mut message_lines = Vec::with_capacity(request.items.len());

        for item in &request.items {
            let product = ProductEntity::find_by_id(item.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;

            if !product.is_active {
                return Err(ServiceError::ValidationError(format!(
                    "Product {} is not available",
                    product.name
                )));
            }

            let unit_price = product.price;
            let subtotal = unit_price * Decimal::from(item.quantity);
            total_amount += subtotal;

            item_models.push(OrderItemActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                quantity: Set(item.quantity),
                unit_price: Set(unit_price),
                subtotal: Set(subtotal),
                created_at: Set(now),
            });

            message_lines.push(OrderLine {
                product_name: product.name,
                quantity: item.quantity,
            });
        }

        let order_model = OrderActiveModel {
            id: Set(order_id),
            customer_id: Set(request.customer_id),
            status: Set(OrderStatus::New.as_str().to_string()),
            total_amount: Set(total_amount),
            notes: Set(request.notes),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            delivered_at: Set(None),
            version: Set(1),
        }
        .insert(&txn)
        .await?;

        OrderItemEntity::insert_many(item_models).exec(&txn).await?;

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, total_amount = %total_amount, "Order created");

        self.emit(Event::OrderCreated(order_id)).await;

        // Best-effort confirmation; a gateway failure must never undo the order.
        let notifier = self.notifier.clone();
        let customer_name = customer.name.clone();
        let customer_phone = customer.phone.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier
                .send_order_confirmation(
                    &customer_name,
                    &customer_phone,
                    order_id,
                    &message_lines,
                    total_amount,
                )
                .await
            {
                warn!(error = %e, order_id = %order_id, "Order confirmation notification failed");
            }
        });

        Self::model_to_response(order_model, items)
    }

    /// Retrieves an order with its items.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(db)
            .await?;

        Self::model_to_response(order, items)
    }

    /// Lists orders newest first with optional status/customer filters.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
        filter: OrderFilter,
    ) -> Result<OrderListResponse, ServiceError> {
        let db = &*self.db;

        let mut query = OrderEntity::find().order_by_desc(order::Column::CreatedAt);
        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status.as_str()));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(order::Column::CustomerId.eq(customer_id));
        }

        let paginator = query.paginate(db, per_page.max(1));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        let responses = self.attach_items(orders).await?;

        Ok(OrderListResponse {
            orders: responses,
            total,
            page,
            per_page,
        })
    }

    /// Returns a customer's order history, newest first.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn list_customer_orders(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<OrderResponse>, ServiceError> {
        let db = &*self.db;

        CustomerEntity::find_by_id(customer_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))?;

        let orders = OrderEntity::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(db)
            .await?;

        self.attach_items(orders).await
    }

    /// Applies a status transition under optimistic locking.
    ///
    /// Illegal transitions (terminal states, same-state requests,
    /// anything targeting `new`, skipping delivery) fail with
    /// `InvalidTransition`. Two racing transitions from the same prior
    /// state are decided by a version-guarded update: the loser observes
    /// zero affected rows and gets `Conflict` — re-read and retry is the
    /// caller's call.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db;
        let now = Utc::now();

        let txn = db.begin().await?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let current = OrderStatus::parse(&order.status).map_err(|_| {
            ServiceError::InternalError(format!(
                "Order {} carries unknown status '{}'",
                order_id, order.status
            ))
        })?;

        if !current.can_transition_to(new_status) {
            return Err(ServiceError::InvalidTransition {
                from: current.as_str().to_string(),
                to: new_status.as_str().to_string(),
            });
        }

        let mut update = OrderEntity::update_many()
            .col_expr(order::Column::Status, Expr::value(new_status.as_str()))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .col_expr(order::Column::Version, Expr::value(order.version + 1))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Version.eq(order.version));

        if new_status == OrderStatus::Completed {
            // delivered_at is written exactly once, here, and never cleared.
            update = update.col_expr(order::Column::DeliveredAt, Expr::value(now));
        }

        let result = update.exec(&txn).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "Order {} was modified concurrently; re-read and retry",
                order_id
            )));
        }

        txn.commit().await?;

        info!(
            order_id = %order_id,
            old_status = %current,
            new_status = %new_status,
            "Order status updated"
        );

        self.emit(Event::OrderStatusChanged {
            order_id,
            old_status: current.as_str().to_string(),
            new_status: new_status.as_str().to_string(),
        })
        .await;

        match new_status {
            OrderStatus::Completed => {
                self.emit(Event::OrderCompleted(order_id)).await;
                self.notify_delivery(order.customer_id, order_id).await;
            }
            OrderStatus::Cancelled => self.emit(Event::OrderCancelled(order_id)).await,
            _ => {}
        }

        self.get_order(order_id).await
    }

    /// Marks an order delivered; only valid from `in_delivery`.
    pub async fn complete_order(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        self.update_order_status(order_id, OrderStatus::Completed)
            .await
    }

    /// Cancels an order; only valid from `new` or `in_delivery`.
    pub async fn cancel_order(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        self.update_order_status(order_id, OrderStatus::Cancelled)
            .await
    }

    /// Replaces the free-text notes. Status, totals and delivery
    /// timestamps are untouched.
    #[instrument(skip(self, notes), fields(order_id = %order_id))]
    pub async fn update_notes(
        &self,
        order_id: Uuid,
        notes: Option<String>,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let version = order.version;
        let mut active: OrderActiveModel = order.into();
        active.notes = Set(notes);
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);
        active.update(db).await?;

        self.get_order(order_id).await
    }

    /// Hard-deletes an order and its items. Administrative override, not
    /// part of the normal lifecycle.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await?;

        OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        OrderItemEntity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        OrderEntity::delete_by_id(order_id).exec(&txn).await?;

        txn.commit().await?;

        info!(order_id = %order_id, "Order deleted");
        self.emit(Event::OrderDeleted(order_id)).await;

        Ok(())
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send event");
            }
        }
    }

    async fn notify_delivery(&self, customer_id: Uuid, order_id: Uuid) {
        let customer = match CustomerEntity::find_by_id(customer_id).one(&*self.db).await {
            Ok(Some(customer)) => customer,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, order_id = %order_id, "Failed to load customer for delivery notification");
                return;
            }
        };

        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier
                .send_delivery_confirmation(&customer.name, &customer.phone, order_id)
                .await
            {
                warn!(error = %e, order_id = %order_id, "Delivery confirmation notification failed");
            }
        });
    }

    async fn attach_items(
        &self,
        orders: Vec<OrderModel>,
    ) -> Result<Vec<OrderResponse>, ServiceError> {
        let db = &*self.db;

        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.is_in(ids))
            .all(db)
            .await?;

        let mut by_order: HashMap<Uuid, Vec<OrderItemModel>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item);
        }

        orders
            .into_iter()
            .map(|order| {
                let items = by_order.remove(&order.id).unwrap_or_default();
                Self::model_to_response(order, items)
            })
            .collect()
    }

    fn model_to_response(
        order: OrderModel,
        items: Vec<OrderItemModel>,
    ) -> Result<OrderResponse, ServiceError> {
        let status = OrderStatus::parse(&order.status)?;
        Ok(OrderResponse {
            id: order.id,
            customer_id: order.customer_id,
            status,
            total_amount: order.total_amount,
            notes: order.notes,
            created_at: order.created_at,
            updated_at: order.updated_at,
            delivered_at: order.delivered_at,
            items: items
                .into_iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    subtotal: item.subtotal,
                })
                .collect(),
            version: order.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn model_to_response_preserves_totals_and_items() {
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let customer_id = Uuid::new_v4();
        let product_id = Uuid::new_v4();

        let order = OrderModel {
            id: order_id,
            customer_id,
            status: "new".to_string(),
            total_amount: dec!(220.00),
            notes: Some("leave at the gate".to_string()),
            created_at: now,
            updated_at: Some(now),
            delivered_at: None,
            version: 1,
        };
        let items = vec![OrderItemModel {
            id: Uuid::new_v4(),
            order_id,
            product_id,
            quantity: 2,
            unit_price: dec!(110.00),
            subtotal: dec!(220.00),
            created_at: now,
        }];

        let response = OrderService::model_to_response(order, items).unwrap();

        assert_eq!(response.id, order_id);
        assert_eq!(response.status, OrderStatus::New);
        assert_eq!(response.total_amount, dec!(220.00));
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0].unit_price, dec!(110.00));
        assert_eq!(response.items[0].subtotal, dec!(220.00));
        assert_eq!(
            response.total_amount,
            response.items.iter().map(|i| i.subtotal).sum()
        );
    }

    #[test]
    fn model_to_response_rejects_unknown_status() {
        let order = OrderModel {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            status: "shipped".to_string(),
            total_amount: dec!(0),
            notes: None,
            created_at: Utc::now(),
            updated_at: None,
            delivered_at: None,
            version: 1,
        };
        assert!(OrderService::model_to_response(order, Vec::new()).is_err());
    }

    #[test]
    fn create_request_rejects_empty_items() {
        let request = CreateOrderRequest {
            customer_id: Uuid::new_v4(),
            notes: None,
            items: Vec::new(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn create_request_rejects_non_positive_quantity() {
        let request = CreateOrderRequest {
            customer_id: Uuid::new_v4(),
            notes: None,
            items: vec![CreateOrderItemRequest {
                product_id: Uuid::new_v4(),
                quantity: 0,
            }],
        };
        assert!(request.validate().is_err());
    }
}
