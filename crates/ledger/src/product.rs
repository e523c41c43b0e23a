use serde::{Deserialize, Serialize};

use stockledger_core::{AggregateRoot, Entity, LedgerError, LedgerResult, ProductId};

/// Availability derived from the current balance.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Available,
    OutOfStock,
}

/// Catalog data needed to register a product with the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    pub unit: String,
    pub min_stock: i64,
    /// Recorded as an opening IN transaction when non-zero.
    #[serde(default)]
    pub opening_stock: i64,
}

impl NewProduct {
    pub fn validate(&self) -> LedgerResult<()> {
        if self.code.trim().is_empty() {
            return Err(LedgerError::validation("product code cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(LedgerError::validation("product name cannot be empty"));
        }
        if self.unit.trim().is_empty() {
            return Err(LedgerError::validation("unit cannot be empty"));
        }
        if self.min_stock < 0 {
            return Err(LedgerError::validation("minimum stock cannot be negative"));
        }
        if self.opening_stock < 0 {
            return Err(LedgerError::InvalidQuantity(self.opening_stock));
        }
        Ok(())
    }
}

/// Aggregate root: Product, as far as the ledger is concerned.
///
/// Catalog fields are read-only here; `current_stock` changes only through a
/// committed ledger mutation, which also bumps `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    code: String,
    name: String,
    unit: String,
    min_stock: i64,
    current_stock: i64,
    version: u64,
}

impl Product {
    /// A freshly registered product with an empty ledger.
    pub fn register(id: ProductId, new: &NewProduct) -> Self {
        Self {
            id,
            code: new.code.trim().to_string(),
            name: new.name.trim().to_string(),
            unit: new.unit.trim().to_string(),
            min_stock: new.min_stock,
            current_stock: 0,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn min_stock(&self) -> i64 {
        self.min_stock
    }

    pub fn current_stock(&self) -> i64 {
        self.current_stock
    }

    pub fn status(&self) -> ProductStatus {
        if self.current_stock > 0 {
            ProductStatus::Available
        } else {
            ProductStatus::OutOfStock
        }
    }

    pub fn is_below_minimum(&self) -> bool {
        self.current_stock < self.min_stock
    }

    /// Store-side write of a committed balance.
    ///
    /// Rejects negative balances so a buggy caller cannot persist one.
    pub fn set_balance(&mut self, balance: i64) -> LedgerResult<()> {
        if balance < 0 {
            return Err(LedgerError::WouldUnderflow { balance });
        }
        self.current_stock = balance;
        self.version += 1;
        Ok(())
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl AggregateRoot for Product {
    fn version(&self) -> u64 {
        self.version
    }
}
