//! Product records served by the listing endpoint.

use serde::{Deserialize, Serialize};

/// An item that is sold.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Product {
    pub name: String,
    pub cost: u32,
    pub quantity: u32,
}

impl Product {
    pub fn new(name: impl Into<String>, cost: u32, quantity: u32) -> Self {
        Self {
            name: name.into(),
            cost,
            quantity,
        }
    }
}
