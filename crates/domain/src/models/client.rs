//! Client (counterparty) domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A client stored in the local ERP database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub full_name: Option<String>,
    /// Taxpayer identification number.
    pub inn: Option<String>,
    /// Tax registration reason code.
    pub kpp: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub comment: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// Returns the syncable fields of this client.
    pub fn to_input(&self) -> ClientInput {
        ClientInput {
            name: self.name.clone(),
            full_name: self.full_name.clone(),
            inn: self.inn.clone(),
            kpp: self.kpp.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            address: self.address.clone(),
            comment: self.comment.clone(),
            is_active: self.is_active,
        }
    }
}

/// Syncable client fields, used for create and update.
///
/// Absent optional values are `None`, never empty strings, so that two inputs
/// describing the same client compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClientInput {
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub inn: Option<String>,
    #[serde(default)]
    pub kpp: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl ClientInput {
    /// Creates an active client input with only a name set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            full_name: None,
            inn: None,
            kpp: None,
            phone: None,
            email: None,
            address: None,
            comment: None,
            is_active: true,
        }
    }
}
