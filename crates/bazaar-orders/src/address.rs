//! Address book. Orders keep their own copy, so edits here never reach
//! placed orders.

use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use bazaar_core::validation::{validate_phone, validate_pincode};
use bazaar_core::Address;
use bazaar_db::Database;

use crate::error::{OrderError, OrderResult};

#[derive(Debug, Clone, Deserialize)]
pub struct NewAddress {
    pub address_type: String,
    pub name: String,
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub landmark: Option<String>,
    pub state: String,
    pub pincode: String,
    pub phone: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone)]
pub struct AddressService {
    db: Database,
}

impl AddressService {
    pub fn new(db: Database) -> Self {
        AddressService { db }
    }

    pub async fn add(&self, user_id: &str, input: NewAddress) -> OrderResult<Address> {
        let required = [
            ("address type", &input.address_type),
            ("name", &input.name),
            ("street", &input.street),
            ("city", &input.city),
            ("state", &input.state),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(OrderError::validation(format!("{field} is required")));
        }
        validate_pincode(input.pincode.trim())?;
        validate_phone(input.phone.trim())?;

        let address = Address {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            address_type: input.address_type.trim().to_string(),
            name: input.name.trim().to_string(),
            street: input.street.trim().to_string(),
            city: input.city.trim().to_string(),
            landmark: input
                .landmark
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
            state: input.state.trim().to_string(),
            pincode: input.pincode.trim().to_string(),
            phone: input.phone.trim().to_string(),
            is_default: input.is_default,
            created_at: Utc::now(),
        };
        self.db.addresses().insert(&address).await?;

        info!(user_id = %user_id, address_id = %address.id, "Address saved");
        Ok(address)
    }

    /// Default address first.
    pub async fn list(&self, user_id: &str) -> OrderResult<Vec<Address>> {
        Ok(self.db.addresses().list_for_user(user_id).await?)
    }

    pub async fn delete(&self, user_id: &str, address_id: &str) -> OrderResult<()> {
        self.db.addresses().delete(user_id, address_id).await?;
        Ok(())
    }
}
