//! Orders collection
//!
//! Placing an order reserves stock in the same transaction that appends the
//! order: every line is checked first, so a rejected order leaves the menu
//! untouched. Status changes are not restricted to a state machine, except
//! that cancelling returns the stock.

use super::ids::{generate_prefixed, Id};
use super::menu::{check_stock, return_stock, take_stock};
use super::models::{
    MenuItem, NewOrder, Order, OrderLine, OrderPatch, OrderStatus, OrderTotals, OrderType,
};
use crate::config::{MAX_CART_QUANTITY, MENU_KEY, ORDERS_KEY};
use crate::error::{AppError, Result};
use crate::storage::Storage;
use crate::validation::matches_query;
use chrono::Utc;

#[derive(Clone)]
pub struct OrdersRepo {
    storage: Storage,
}

fn too_many() -> AppError {
    AppError::validation(format!(
        "At most {} of one item per order",
        MAX_CART_QUANTITY
    ))
}

/// Sum quantities per item, keeping first-seen order
fn aggregate_lines(order: &NewOrder) -> Result<Vec<(Id, u32)>> {
    let mut totals: Vec<(Id, u32)> = Vec::new();
    for line in &order.items {
        match totals.iter_mut().find(|(id, _)| id == &line.item_id) {
            Some((_, quantity)) => {
                *quantity = quantity
                    .checked_add(line.quantity)
                    .filter(|&sum| sum <= MAX_CART_QUANTITY)
                    .ok_or_else(too_many)?;
            }
            None => totals.push((line.item_id.clone(), line.quantity)),
        }
    }
    Ok(totals)
}

fn validate_new_order(order: &NewOrder) -> Result<()> {
    if order.items.is_empty() {
        return Err(AppError::validation("Order must contain at least one item"));
    }
    if order.items.iter().any(|line| line.quantity == 0) {
        return Err(AppError::validation("Item quantities must be at least 1"));
    }
    if order.items.iter().any(|line| line.quantity > MAX_CART_QUANTITY) {
        return Err(too_many());
    }
    if order.order_type == OrderType::Delivery
        && order
            .delivery_address
            .as_deref()
            .map_or(true, |address| address.trim().is_empty())
    {
        return Err(AppError::validation(
            "Delivery address is required for delivery orders",
        ));
    }
    if !(0.0..1.0).contains(&order.discount_rate) {
        return Err(AppError::validation("Discount must be between 0% and 100%"));
    }
    Ok(())
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

impl OrdersRepo {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn get_all(&self) -> Vec<Order> {
        self.storage.read_collection(ORDERS_KEY)
    }

    pub fn get_by_id(&self, id: &Id) -> Option<Order> {
        self.get_all().into_iter().find(|order| &order.id == id)
    }

    /// A customer's orders, newest first
    pub fn get_by_customer(&self, customer_id: &Id) -> Vec<Order> {
        newest_first(
            self.get_all()
                .into_iter()
                .filter(|order| &order.customer_id == customer_id)
                .collect(),
        )
    }

    pub fn get_by_status(&self, status: OrderStatus) -> Vec<Order> {
        self.get_all()
            .into_iter()
            .filter(|order| order.status == status)
            .collect()
    }

    pub fn get_recent(&self, limit: usize) -> Vec<Order> {
        let mut orders = newest_first(self.get_all());
        orders.truncate(limit);
        orders
    }

    /// Match against order id, customer id and item names
    pub fn search(&self, query: &str) -> Vec<Order> {
        self.get_all()
            .into_iter()
            .filter(|order| {
                matches_query(query, &[order.id.as_str(), order.customer_id.as_str()])
                    || order
                        .items
                        .iter()
                        .any(|line| matches_query(query, &[&line.name]))
            })
            .collect()
    }

    /// Place an order: check all stock, take it, snapshot lines, append
    pub fn add(&self, new: NewOrder) -> Result<Order> {
        validate_new_order(&new)?;
        let requested = aggregate_lines(&new)?;

        let order = self.storage.transaction(|tx| {
            let mut menu: Vec<MenuItem> = tx.collection(MENU_KEY);

            for (item_id, quantity) in &requested {
                let item = menu
                    .iter()
                    .find(|item| &item.id == item_id)
                    .ok_or_else(|| AppError::not_found("Menu item", item_id))?;
                check_stock(item, *quantity)?;
            }

            let mut lines = Vec::with_capacity(requested.len());
            for (item_id, quantity) in &requested {
                if let Some(item) = menu.iter_mut().find(|item| &item.id == item_id) {
                    take_stock(item, *quantity);
                    lines.push(OrderLine {
                        item_id: item.id.clone(),
                        name: item.name.clone(),
                        price: item.price,
                        quantity: *quantity,
                        category: item.category.clone(),
                    });
                }
            }

            let subtotal: f64 = lines.iter().map(OrderLine::line_total).sum();
            let totals = OrderTotals::compute(subtotal, new.order_type, new.discount_rate);

            let mut orders: Vec<Order> = tx.collection(ORDERS_KEY);
            let now = Utc::now();
            let order = Order {
                id: generate_prefixed("ORD", |candidate| {
                    orders.iter().any(|order| order.id == candidate)
                }),
                customer_id: new.customer_id.clone(),
                items: lines,
                subtotal: totals.subtotal,
                tax: totals.tax,
                delivery_fee: totals.delivery_fee,
                discount: totals.discount,
                total: totals.total,
                status: OrderStatus::Pending,
                payment_method: new.payment_method,
                order_type: new.order_type,
                delivery_address: new.delivery_address.clone(),
                notes: new.notes.clone(),
                promo_code: new.promo_code.clone(),
                created_at: now,
                updated_at: now,
            };

            orders.push(order.clone());
            tx.put(MENU_KEY, &menu)?;
            tx.put(ORDERS_KEY, &orders)?;
            Ok(order)
        });

        match &order {
            Ok(order) => tracing::info!(
                "Placed order {} for customer {} ({} items, total {:.2} ETB)",
                order.id,
                order.customer_id,
                order.item_count(),
                order.total
            ),
            Err(e) => tracing::warn!("Order for customer {} rejected: {}", new.customer_id, e),
        }
        order
    }

    pub fn update(&self, id: &Id, patch: OrderPatch) -> Result<Order> {
        if patch.status == Some(OrderStatus::Cancelled) {
            self.cancel(id)?;
        }

        self.modify(id, |order| {
            if let Some(status) = patch.status {
                order.status = status;
            }
            if let Some(payment_method) = patch.payment_method {
                order.payment_method = payment_method;
            }
            if let Some(address) = patch.delivery_address {
                order.delivery_address = Some(address);
            }
            if let Some(notes) = patch.notes {
                order.notes = Some(notes);
            }
        })
    }

    /// Any status may follow any other; cancelling goes through `cancel`
    pub fn update_status(&self, id: &Id, status: OrderStatus) -> Result<Order> {
        if status == OrderStatus::Cancelled {
            return self.cancel(id);
        }
        let order = self.modify(id, |order| order.status = status)?;
        tracing::info!("Order {} is now {:?}", order.id, order.status);
        Ok(order)
    }

    /// Cancel and return stock to the menu. Cancelling twice is a no-op.
    pub fn cancel(&self, id: &Id) -> Result<Order> {
        self.storage.transaction(|tx| {
            let mut orders: Vec<Order> = tx.collection(ORDERS_KEY);
            let order = orders
                .iter_mut()
                .find(|order| &order.id == id)
                .ok_or_else(|| AppError::not_found("Order", id))?;

            match order.status {
                OrderStatus::Cancelled => return Ok(order.clone()),
                OrderStatus::Completed => {
                    return Err(AppError::validation(
                        "Completed orders cannot be cancelled",
                    ))
                }
                _ => {}
            }

            let mut menu: Vec<MenuItem> = tx.collection(MENU_KEY);
            for line in &order.items {
                // Items deleted from the menu since ordering are skipped
                if let Some(item) = menu.iter_mut().find(|item| item.id == line.item_id) {
                    return_stock(item, line.quantity);
                }
            }

            order.status = OrderStatus::Cancelled;
            order.updated_at = Utc::now();
            let cancelled = order.clone();

            tx.put(MENU_KEY, &menu)?;
            tx.put(ORDERS_KEY, &orders)?;
            tracing::info!("Cancelled order {}", cancelled.id);
            Ok(cancelled)
        })
    }

    pub fn delete(&self, id: &Id) -> Result<()> {
        self.storage.transaction(|tx| {
            let mut orders: Vec<Order> = tx.collection(ORDERS_KEY);
            let before = orders.len();
            orders.retain(|order| &order.id != id);
            if orders.len() == before {
                return Err(AppError::not_found("Order", id));
            }
            tx.put(ORDERS_KEY, &orders)
        })?;

        tracing::debug!("Deleted order {}", id);
        Ok(())
    }

    fn modify(&self, id: &Id, apply: impl FnOnce(&mut Order)) -> Result<Order> {
        self.storage.transaction(|tx| {
            let mut orders: Vec<Order> = tx.collection(ORDERS_KEY);
            let order = orders
                .iter_mut()
                .find(|order| &order.id == id)
                .ok_or_else(|| AppError::not_found("Order", id))?;
            apply(order);
            order.updated_at = Utc::now();
            let updated = order.clone();
            tx.put(ORDERS_KEY, &orders)?;
            Ok(updated)
        })
    }
}
