use std::sync::Arc;

use bigdecimal::{BigDecimal, Zero};
use serde::Serialize;

use crate::models::{collections, Food, Order, OrderItem, Table};
use crate::store::{
    from_document, with_timeout, DocumentStore, Filter, StoreError, AGGREGATE_TIMEOUT,
};

/// One projected line of a bill. Fields resolved through a left-join are
/// optional: a deleted food or table surfaces as nulls, never as a
/// dropped row.
#[derive(Debug, Clone, Serialize)]
pub struct BillingLine {
    pub order_id: Option<String>,
    pub table_id: Option<String>,
    pub table_number: Option<i64>,
    pub food_name: Option<String>,
    pub food_image: Option<String>,
    pub price: Option<BigDecimal>,
    pub quantity: i64,
}

/// Derived billing view of an order. Computed on read, never persisted.
#[derive(Debug, Serialize)]
pub struct BillingSummary {
    pub payment_due: BigDecimal,
    pub total_count: i64,
    pub table_number: Option<i64>,
    pub order_items: Vec<BillingLine>,
}

/// Reconstructs the bill for an order: order items joined with their
/// order, food, and table, grouped into a payment summary.
pub struct BillingAggregator {
    store: Arc<dyn DocumentStore>,
}

impl BillingAggregator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Run the full aggregation for one order id.
    ///
    /// Zero matching order items yield an empty result, not an error;
    /// callers translate that into a not-found outcome.
    pub async fn items_by_order(&self, order_id: &str) -> Result<Vec<BillingSummary>, StoreError> {
        with_timeout(AGGREGATE_TIMEOUT, self.aggregate(order_id)).await
    }

    async fn aggregate(&self, order_id: &str) -> Result<Vec<BillingSummary>, StoreError> {
        let filter = Filter::new().eq("order_id", order_id);
        let item_docs = self
            .store
            .find_many(collections::ORDER_ITEMS, &filter)
            .await?;

        let mut lines = Vec::with_capacity(item_docs.len());
        for doc in item_docs {
            let item: OrderItem = from_document(doc)?;

            let order: Option<Order> = self
                .lookup(collections::ORDERS, "order_id", &item.order_id)
                .await?;
            let food: Option<Food> = self
                .lookup(collections::FOODS, "food_id", &item.food_id)
                .await?;
            // The table hangs off the order; an orphaned item has no
            // table to join through.
            let table: Option<Table> = match &order {
                Some(order) => {
                    self.lookup(collections::TABLES, "table_id", &order.table_id)
                        .await?
                }
                None => None,
            };

            lines.push(project_line(&item, order.as_ref(), food.as_ref(), table.as_ref()));
        }

        Ok(group_lines(lines))
    }

    async fn lookup<T: serde::de::DeserializeOwned>(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<T>, StoreError> {
        let filter = Filter::new().eq(field, value);
        match self.store.find_one(collection, &filter).await? {
            Some(doc) => Ok(Some(from_document(doc)?)),
            None => Ok(None),
        }
    }
}

fn project_line(
    item: &OrderItem,
    order: Option<&Order>,
    food: Option<&Food>,
    table: Option<&Table>,
) -> BillingLine {
    BillingLine {
        order_id: order.map(|o| o.order_id.clone()),
        table_id: table.map(|t| t.table_id.clone()),
        table_number: table.map(|t| t.table_number),
        food_name: food.map(|f| f.name.clone()),
        food_image: food.and_then(|f| f.food_image.clone()),
        price: food.map(|f| f.price.clone()),
        quantity: item.quantity,
    }
}

/// Group projected lines by (order id, table id, table number): sum the
/// per-line amount into payment_due, count lines, collect the lines.
/// The final projection keeps only the table number of the key.
///
/// The summed amount is the joined food price per line; a line whose
/// food record is gone contributes nothing but stays in the bill.
fn group_lines(lines: Vec<BillingLine>) -> Vec<BillingSummary> {
    type GroupKey = (Option<String>, Option<String>, Option<i64>);
    let mut keys: Vec<GroupKey> = Vec::new();
    let mut groups: Vec<BillingSummary> = Vec::new();

    for line in lines {
        let key = (
            line.order_id.clone(),
            line.table_id.clone(),
            line.table_number,
        );

        let index = match keys.iter().position(|existing| *existing == key) {
            Some(index) => index,
            None => {
                keys.push(key.clone());
                groups.push(BillingSummary {
                    payment_due: BigDecimal::zero(),
                    total_count: 0,
                    table_number: key.2,
                    order_items: Vec::new(),
                });
                groups.len() - 1
            }
        };
        let summary = &mut groups[index];

        if let Some(price) = &line.price {
            summary.payment_due += price.clone();
        }
        summary.total_count += 1;
        summary.order_items.push(line);
    }

    groups
}
