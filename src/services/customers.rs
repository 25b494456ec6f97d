use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
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
    entities::customer::{self, ActiveModel as CustomerActiveModel, Entity as CustomerEntity, Model as CustomerModel},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Digits only, 10-11 characters (area code + number).
pub static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{10,11}$").expect("phone regex is valid"));

fn default_consumption_days() -> i32 {
    30
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: String,
    #[validate(regex(path = "PHONE_RE", message = "Phone must be 10-11 digits"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Address cannot be empty"))]
    pub address: String,
    /// Advisory refill interval hint in days.
    #[serde(default = "default_consumption_days")]
    #[validate(range(min = 1, max = 365, message = "Consumption pattern must be 1-365 days"))]
    pub consumption_pattern_days: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(regex(path = "PHONE_RE", message = "Phone must be 10-11 digits"))]
    pub phone: Option<String>,
    #[validate(length(min = 1, message = "Address cannot be empty"))]
    pub address: Option<String>,
    #[validate(range(min = 1, max = 365, message = "Consumption pattern must be 1-365 days"))]
    pub consumption_pattern_days: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CustomerResponse {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub consumption_pattern_days: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<CustomerModel> for CustomerResponse {
    fn from(model: CustomerModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            phone: model.phone,
            address: model.address,
            consumption_pattern_days: model.consumption_pattern_days,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CustomerListResponse {
    pub customers: Vec<CustomerResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Customer registry service.
#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl CustomerService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, request), fields(phone = %request.phone))]
    pub async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<CustomerResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db;

        let existing = CustomerEntity::find()
            .filter(customer::Column::Phone.eq(request.phone.as_str()))
            .one(db)
            .await?;
        if existing.is_some() {
            warn!("Rejected customer creation with duplicate phone");
            return Err(ServiceError::BadRequest(
                "Phone number already registered".to_string(),
            ));
        }

        let now = Utc::now();
        let model = CustomerActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            phone: Set(request.phone),
            address: Set(request.address),
            consumption_pattern_days: Set(request.consumption_pattern_days),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(db)
        .await?;

        info!(customer_id = %model.id, "Customer created");
        self.emit(Event::CustomerCreated(model.id)).await;

        Ok(model.into())
    }

    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn get_customer(&self, customer_id: Uuid) -> Result<CustomerResponse, ServiceError> {
        let model = CustomerEntity::find_by_id(customer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))?;
        Ok(model.into())
    }

    /// Lists customers ordered by name, optionally filtered by a name
    /// fragment (substring match; case handling follows the database
    /// collation).
    #[instrument(skip(self))]
    pub async fn list_customers(
        &self,
        page: u64,
        per_page: u64,
        name_contains: Option<String>,
    ) -> Result<CustomerListResponse, ServiceError> {
        let db = &*self.db;

        let mut query = CustomerEntity::find().order_by_asc(customer::Column::Name);
        if let Some(fragment) = name_contains.filter(|s| !s.trim().is_empty()) {
            query = query.filter(customer::Column::Name.contains(fragment.trim()));
        }

        let paginator = query.paginate(db, per_page.max(1));
        let total = paginator.num_items().await?;
        let customers = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(CustomerListResponse {
            customers: customers.into_iter().map(Into::into).collect(),
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self, request), fields(customer_id = %customer_id))]
    pub async fn update_customer(
        &self,
        customer_id: Uuid,
        request: UpdateCustomerRequest,
    ) -> Result<CustomerResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db;

        let model = CustomerEntity::find_by_id(customer_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))?;

        if let Some(phone) = &request.phone {
            let taken = CustomerEntity::find()
                .filter(customer::Column::Phone.eq(phone.as_str()))
                .filter(customer::Column::Id.ne(customer_id))
                .one(db)
                .await?;
            if taken.is_some() {
                return Err(ServiceError::BadRequest(
                    "Phone number already registered".to_string(),
                ));
            }
        }

        let mut active: CustomerActiveModel = model.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(phone) = request.phone {
            active.phone = Set(phone);
        }
        if let Some(address) = request.address {
            active.address = Set(address);
        }
        if let Some(days) = request.consumption_pattern_days {
            active.consumption_pattern_days = Set(days);
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await?;

        info!(customer_id = %customer_id, "Customer updated");
        self.emit(Event::CustomerUpdated(customer_id)).await;

        Ok(updated.into())
    }

    /// Deletes a customer. Order history rows keep their customer_id;
    /// referential cleanup is the operator's responsibility.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn delete_customer(&self, customer_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db;

        let result = CustomerEntity::delete_by_id(customer_id).exec(db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Customer {} not found",
                customer_id
            )));
        }

        info!(customer_id = %customer_id, "Customer deleted");
        self.emit(Event::CustomerDeleted(customer_id)).await;

        Ok(())
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateCustomerRequest {
        CreateCustomerRequest {
            name: "Maria Silva".into(),
            phone: "27999990000".into(),
            address: "Rua das Flores 12".into(),
            consumption_pattern_days: 30,
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn phone_must_be_digits() {
        let mut request = valid_request();
        request.phone = "27 99999-0000".into();
        assert!(request.validate().is_err());

        request.phone = "123".into();
        assert!(request.validate().is_err());

        request.phone = "2799999000011".into();
        assert!(request.validate().is_err());
    }

    #[test]
    fn consumption_days_bounds() {
        let mut request = valid_request();
        request.consumption_pattern_days = 0;
        assert!(request.validate().is_err());
        request.consumption_pattern_days = 366;
        assert!(request.validate().is_err());
        request.consumption_pattern_days = 365;
        assert!(request.validate().is_ok());
    }

    #[test]
    fn partial_update_validates_present_fields_only() {
        let request = UpdateCustomerRequest {
            name: None,
            phone: None,
            address: None,
            consumption_pattern_days: None,
        };
        assert!(request.validate().is_ok());

        let request = UpdateCustomerRequest {
            name: Some(String::new()),
            phone: None,
            address: None,
            consumption_pattern_days: None,
        };
        assert!(request.validate().is_err());
    }
}
