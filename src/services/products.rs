use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::order_item,
    entities::product::{self, ActiveModel as ProductActiveModel, Entity as ProductEntity, Model as ProductModel},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// The two goods the business delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Gas,
    Water,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Gas => "gas",
            ProductType::Water => "water",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ServiceError> {
        match value {
            "gas" => Ok(ProductType::Gas),
            "water" => Ok(ProductType::Water),
            other => Err(ServiceError::InvalidInput(format!(
                "Unknown product type: {other}"
            ))),
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub product_type: ProductType,
    /// Informational only; orders never decrement it.
    #[serde(default)]
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock_quantity: i32,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

fn default_is_active() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub product_type: Option<ProductType>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock_quantity: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub product_type: ProductType,
    pub stock_quantity: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductListResponse {
    pub products: Vec<ProductResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Filters for product listing.
#[derive(Debug, Default)]
pub struct ProductFilter {
    pub product_type: Option<ProductType>,
    pub is_active: Option<bool>,
}

/// Product catalog service.
#[derive(Clone)]
pub struct ProductService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl ProductService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request.validate()?;
        ensure_positive_price(request.price)?;

        let now = Utc::now();
        let model = ProductActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            description: Set(request.description),
            price: Set(request.price),
            product_type: Set(request.product_type.as_str().to_string()),
            stock_quantity: Set(request.stock_quantity),
            is_active: Set(request.is_active),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&*self.db)
        .await?;

        info!(product_id = %model.id, "Product created");
        self.emit(Event::ProductCreated(model.id)).await;

        Self::model_to_response(model)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductResponse, ServiceError> {
        let model = ProductEntity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;
        Self::model_to_response(model)
    }

    /// Lists products ordered by name with optional type/active filters.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        page: u64,
        per_page: u64,
        filter: ProductFilter,
    ) -> Result<ProductListResponse, ServiceError> {
        let db = &*self.db;

        let mut query = ProductEntity::find().order_by_asc(product::Column::Name);
        if let Some(product_type) = filter.product_type {
            query = query.filter(product::Column::ProductType.eq(product_type.as_str()));
        }
        if let Some(is_active) = filter.is_active {
            query = query.filter(product::Column::IsActive.eq(is_active));
        }

        let paginator = query.paginate(db, per_page.max(1));
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(ProductListResponse {
            products: products
                .into_iter()
                .map(Self::model_to_response)
                .collect::<Result<_, _>>()?,
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self, request), fields(product_id = %product_id))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request.validate()?;
        if let Some(price) = request.price {
            ensure_positive_price(price)?;
        }

        let db = &*self.db;

        let model = ProductEntity::find_by_id(product_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let mut active: ProductActiveModel = model.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = request.price {
            // Existing order items keep their snapshotted unit_price.
            active.price = Set(price);
        }
        if let Some(product_type) = request.product_type {
            active.product_type = Set(product_type.as_str().to_string());
        }
        if let Some(stock_quantity) = request.stock_quantity {
            active.stock_quantity = Set(stock_quantity);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await?;

        info!(product_id = %product_id, "Product updated");
        self.emit(Event::ProductUpdated(product_id)).await;

        Self::model_to_response(updated)
    }

    /// Deletes a product. Products referenced by order items cannot be
    /// deleted; their price snapshots must stay resolvable.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let referencing = order_item::Entity::find()
            .filter(order_item::Column::ProductId.eq(product_id))
            .count(&*self.db)
            .await?;
        if referencing > 0 {
            return Err(ServiceError::Conflict(format!(
                "Product {} is referenced by existing orders",
                product_id
            )));
        }

        let result = ProductEntity::delete_by_id(product_id)
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                product_id
            )));
        }

        info!(product_id = %product_id, "Product deleted");
        self.emit(Event::ProductDeleted(product_id)).await;

        Ok(())
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send event");
            }
        }
    }

    fn model_to_response(model: ProductModel) -> Result<ProductResponse, ServiceError> {
        let product_type = ProductType::parse(&model.product_type)?;
        Ok(ProductResponse {
            id: model.id,
            name: model.name,
            description: model.description,
            price: model.price,
            product_type,
            stock_quantity: model.stock_quantity,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

fn ensure_positive_price(price: Decimal) -> Result<(), ServiceError> {
    if price <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Price must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
