//! Dashboard statistics
//!
//! Computed on demand from the collections. Revenue counts every order
//! that is not cancelled.

use crate::config::LOW_STOCK_THRESHOLD;
use crate::database::models::round_currency;
use crate::database::{Database, MenuItem, OrderStatus, Role};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_orders: usize,
    pub pending_orders: usize,
    /// Orders in pending, preparing or ready
    pub open_orders: usize,
    pub total_revenue: f64,
    pub today_orders: usize,
    pub today_revenue: f64,
    /// Order totals keyed by status name
    pub revenue_by_status: BTreeMap<String, f64>,
    pub total_customers: usize,
    pub total_staff: usize,
    pub menu_items: usize,
    pub today_reservations: usize,
    pub upcoming_reservations: usize,
    pub low_stock: Vec<MenuItem>,
}

pub fn dashboard(db: &Database) -> DashboardStats {
    dashboard_on(db, Utc::now().date_naive())
}

/// Statistics with `today` fixed, for reports over a past day
pub fn dashboard_on(db: &Database, today: NaiveDate) -> DashboardStats {
    let orders = db.orders.get_all();

    let mut revenue_by_status: BTreeMap<String, f64> = BTreeMap::new();
    for order in &orders {
        *revenue_by_status
            .entry(order.status.as_str().to_string())
            .or_default() += order.total;
    }
    for total in revenue_by_status.values_mut() {
        *total = round_currency(*total);
    }

    let billable = || orders.iter().filter(|o| o.status != OrderStatus::Cancelled);
    let today_orders: Vec<_> = billable()
        .filter(|o| o.created_at.date_naive() == today)
        .collect();

    let reservations = db.reservations.get_all();

    DashboardStats {
        total_orders: orders.len(),
        pending_orders: orders
            .iter()
            .filter(|o| o.status == OrderStatus::Pending)
            .count(),
        open_orders: orders.iter().filter(|o| o.status.is_open()).count(),
        total_revenue: round_currency(billable().map(|o| o.total).sum()),
        today_orders: today_orders.len(),
        today_revenue: round_currency(today_orders.iter().map(|o| o.total).sum()),
        revenue_by_status,
        total_customers: db.users.count_by_role(Role::Customer),
        total_staff: db.users.count_by_role(Role::Staff),
        menu_items: db.menu.get_all().len(),
        today_reservations: reservations
            .iter()
            .filter(|r| r.holds_slot() && r.date == today)
            .count(),
        upcoming_reservations: db.reservations.get_upcoming().len(),
        low_stock: db.menu.get_low_stock(LOW_STOCK_THRESHOLD),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::{NewMenuItem, NewOrder, OrderRequestLine, OrderType, PaymentMethod};
    use crate::storage::Storage;

    fn create_test_db() -> Database {
        Database::open(Storage::in_memory(), &AppConfig::instant()).unwrap()
    }

    fn pickup(items: Vec<OrderRequestLine>) -> NewOrder {
        NewOrder {
            customer_id: crate::database::Id::from(1),
            items,
            payment_method: PaymentMethod::Cash,
            order_type: OrderType::Pickup,
            delivery_address: None,
            notes: None,
            promo_code: None,
            discount_rate: 0.0,
        }
    }

    #[test]
    fn test_revenue_excludes_cancelled() {
        let db = create_test_db();
        let buna = db
            .menu
            .add(NewMenuItem {
                name: "Buna".to_string(),
                price: 50.0,
                category: "coffee".to_string(),
                stock: 10,
                ..Default::default()
            })
            .unwrap();

        db.orders
            .add(pickup(vec![OrderRequestLine::new(buna.id.clone(), 2)]))
            .unwrap();
        let cancelled = db
            .orders
            .add(pickup(vec![OrderRequestLine::new(buna.id.clone(), 1)]))
            .unwrap();
        db.orders.cancel(&cancelled.id).unwrap();

        let stats = dashboard(&db);
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.pending_orders, 1);
        assert_eq!(stats.total_revenue, 110.0);
        assert_eq!(stats.today_orders, 1);
        assert_eq!(stats.today_revenue, 110.0);
        assert_eq!(stats.revenue_by_status.get("cancelled"), Some(&55.0));
        assert_eq!(stats.menu_items, 1);
        assert!(stats.low_stock.is_empty());
    }

    #[test]
    fn test_low_stock_and_users() {
        let db = create_test_db();
        db.menu
            .add(NewMenuItem {
                name: "Kitfo".to_string(),
                price: 300.0,
                category: "mains".to_string(),
                stock: 2,
                ..Default::default()
            })
            .unwrap();

        let stats = dashboard(&db);
        assert_eq!(stats.low_stock.len(), 1);
        assert_eq!(stats.total_customers, 0);
        assert_eq!(stats.total_orders, 0);
        assert_eq!(stats.total_revenue, 0.0);
    }
}
