//! Checkout and order follow-up
//!
//! Placing an order from a cart is the stock-critical step and fails as a
//! unit. The follow-up writes (clearing the cart, user stats, notification,
//! activity log) happen after it and are logged rather than propagated when
//! they fail: the order exists at that point.

use crate::config::PROMO_CODES;
use crate::database::carts::summarize;
use crate::database::{
    Database, Id, NewNotification, NewOrder, NotificationKind, Order, OrderRequestLine,
    OrderStatus, OrderTotals, OrderType, PaymentMethod,
};
use crate::error::{AppError, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub order_type: OrderType,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Falls back to the saved promo code when absent
    #[serde(default)]
    pub promo_code: Option<String>,
}

/// Discount fraction for a promo code, case-insensitive
pub fn promo_discount(code: &str) -> Option<f64> {
    let code = code.trim();
    PROMO_CODES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(code))
        .map(|&(_, rate)| rate)
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Database,
}

impl CheckoutService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Validate and remember a promo code for the next checkout
    pub fn apply_promo(&self, code: &str) -> Result<f64> {
        let rate = promo_discount(code)
            .ok_or_else(|| AppError::validation(format!("Invalid promo code: {}", code.trim())))?;
        self.db.preferences.save_promo(code)?;
        Ok(rate)
    }

    /// Totals for the user's cart at cart prices
    pub fn quote(&self, user_id: &Id, order_type: OrderType) -> OrderTotals {
        let summary = summarize(&self.db.carts.get(user_id));
        let rate = self
            .db
            .preferences
            .saved_promo()
            .and_then(|code| promo_discount(&code))
            .unwrap_or(0.0);
        OrderTotals::compute(summary.subtotal, order_type, rate)
    }

    /// Turn the user's cart into an order
    pub fn place_order(&self, user_id: &Id, request: CheckoutRequest) -> Result<Order> {
        let cart = self.db.carts.get(user_id);
        if cart.is_empty() {
            return Err(AppError::validation("Your cart is empty"));
        }

        let promo_code = request
            .promo_code
            .or_else(|| self.db.preferences.saved_promo())
            .map(|code| code.trim().to_ascii_uppercase())
            .filter(|code| !code.is_empty());
        let discount_rate = match &promo_code {
            Some(code) => promo_discount(code)
                .ok_or_else(|| AppError::validation(format!("Invalid promo code: {}", code)))?,
            None => 0.0,
        };

        let order = self.db.orders.add(NewOrder {
            customer_id: user_id.clone(),
            items: cart
                .iter()
                .map(|line| OrderRequestLine::new(line.item_id.clone(), line.quantity))
                .collect(),
            payment_method: request.payment_method,
            order_type: request.order_type,
            delivery_address: request.delivery_address,
            notes: request.notes,
            promo_code,
            discount_rate,
        })?;

        if let Err(e) = self.db.carts.clear(user_id) {
            tracing::warn!("Failed to clear cart after order {}: {}", order.id, e);
        }
        if order.promo_code.is_some() {
            if let Err(e) = self.db.preferences.clear_promo() {
                tracing::warn!("Failed to clear saved promo: {}", e);
            }
        }
        if let Err(e) = self.db.users.record_order(user_id, order.total) {
            tracing::warn!("Failed to record order {} on user {}: {}", order.id, user_id, e);
        }

        self.notify(
            user_id,
            "Order placed",
            format!(
                "Your order {} of {:.2} ETB has been received.",
                order.id, order.total
            ),
        );
        self.log_activity(
            Some(user_id),
            "order.placed",
            format!("{} ({} items, {:.2} ETB)", order.id, order.item_count(), order.total),
        );

        Ok(order)
    }

    /// Staff status change, with a notification to the customer
    pub fn update_order_status(
        &self,
        actor: &Id,
        order_id: &Id,
        status: OrderStatus,
    ) -> Result<Order> {
        let order = self.db.orders.update_status(order_id, status)?;

        let message = match status {
            OrderStatus::Pending => format!("Your order {} is pending.", order.id),
            OrderStatus::Preparing => format!("Your order {} is being prepared.", order.id),
            OrderStatus::Ready => format!("Your order {} is ready for pickup.", order.id),
            OrderStatus::Completed => format!("Your order {} is complete. Enjoy!", order.id),
            OrderStatus::Cancelled => format!("Your order {} was cancelled.", order.id),
        };
        self.notify(&order.customer_id, "Order update", message);
        self.log_activity(
            Some(actor),
            "order.status",
            format!("{} -> {}", order.id, status.as_str()),
        );

        Ok(order)
    }

    fn notify(&self, user_id: &Id, title: &str, message: String) {
        if !self.db.preferences.notification_settings(user_id).order_updates {
            return;
        }
        let result = self.db.notifications.add(NewNotification {
            user_id: user_id.clone(),
            kind: NotificationKind::Order,
            title: title.to_string(),
            message,
        });
        if let Err(e) = result {
            tracing::warn!("Failed to notify user {}: {}", user_id, e);
        }
    }

    fn log_activity(&self, user_id: Option<&Id>, action: &str, details: String) {
        if let Err(e) = self.db.activity.log(user_id, action, details) {
            tracing::warn!("Failed to log activity {}: {}", action, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::{NewMenuItem, NotificationSettings};
    use crate::storage::Storage;

    fn create_test_service() -> (CheckoutService, Database) {
        let db = Database::open(Storage::in_memory(), &AppConfig::instant()).unwrap();
        (CheckoutService::new(db.clone()), db)
    }

    fn add_buna(db: &Database, stock: u32) -> Id {
        db.menu
            .add(NewMenuItem {
                name: "Buna".to_string(),
                price: 50.0,
                category: "coffee".to_string(),
                stock,
                ..Default::default()
            })
            .unwrap()
            .id
    }

    #[test]
    fn test_promo_codes() {
        assert_eq!(promo_discount("buna10"), Some(0.10));
        assert_eq!(promo_discount(" WELCOME15 "), Some(0.15));
        assert_eq!(promo_discount("FREE"), None);
    }

    #[test]
    fn test_place_order_from_cart() {
        let (checkout, db) = create_test_service();
        let admin = Id::from(1);
        let buna = add_buna(&db, 5);
        db.carts.add_item(&admin, &buna, 2).unwrap();

        let order = checkout
            .place_order(&admin, CheckoutRequest::default())
            .unwrap();

        assert_eq!(order.total, 110.0);
        assert!(db.carts.get(&admin).is_empty());
        assert_eq!(db.menu.get_by_id(&buna).unwrap().stock, 3);

        let user = db.users.get_by_id(&admin).unwrap();
        assert_eq!(user.stats.total_orders, 1);
        assert_eq!(user.stats.reward_points, 11);

        assert_eq!(db.notifications.unread_count(&admin), 1);
        assert_eq!(db.activity.recent(1)[0].action, "order.placed");
    }

    #[test]
    fn test_saved_promo_applied_and_cleared() {
        let (checkout, db) = create_test_service();
        let admin = Id::from(1);
        let buna = add_buna(&db, 5);
        db.carts.add_item(&admin, &buna, 2).unwrap();

        assert_eq!(checkout.apply_promo("buna10").unwrap(), 0.10);
        assert_eq!(checkout.quote(&admin, OrderType::Pickup).total, 99.0);

        let order = checkout
            .place_order(&admin, CheckoutRequest::default())
            .unwrap();

        assert_eq!(order.discount, 10.0);
        assert_eq!(order.total, 99.0);
        assert_eq!(order.promo_code.as_deref(), Some("BUNA10"));
        assert_eq!(db.preferences.saved_promo(), None);
    }

    #[test]
    fn test_rejections_keep_cart() {
        let (checkout, db) = create_test_service();
        let admin = Id::from(1);

        assert!(checkout
            .place_order(&admin, CheckoutRequest::default())
            .is_err());

        let buna = add_buna(&db, 5);
        db.carts.add_item(&admin, &buna, 3).unwrap();
        assert!(checkout.apply_promo("FREE").is_err());

        let bad_promo = CheckoutRequest {
            promo_code: Some("FREE".to_string()),
            ..Default::default()
        };
        assert!(checkout.place_order(&admin, bad_promo).is_err());

        // Stock sold elsewhere since the cart was filled
        db.menu.set_stock(&buna, 1).unwrap();
        let result = checkout.place_order(&admin, CheckoutRequest::default());
        assert!(matches!(result, Err(AppError::InsufficientStock { .. })));

        assert_eq!(db.carts.get(&admin).len(), 1);
        assert!(db.orders.get_all().is_empty());
    }

    #[test]
    fn test_status_update_notifies_customer() {
        let (checkout, db) = create_test_service();
        let admin = Id::from(1);
        let buna = add_buna(&db, 5);
        db.carts.add_item(&admin, &buna, 1).unwrap();
        let order = checkout
            .place_order(&admin, CheckoutRequest::default())
            .unwrap();

        checkout
            .update_order_status(&admin, &order.id, OrderStatus::Ready)
            .unwrap();

        let latest = &db.notifications.get_for_user(&admin)[0];
        assert!(latest.message.contains("ready"));
        assert_eq!(db.activity.recent(1)[0].details, format!("{} -> ready", order.id));
    }

    #[test]
    fn test_notifications_respect_settings() {
        let (checkout, db) = create_test_service();
        let admin = Id::from(1);
        db.preferences
            .set_notification_settings(
                &admin,
                NotificationSettings {
                    order_updates: false,
                    ..Default::default()
                },
            )
            .unwrap();
        let buna = add_buna(&db, 5);
        db.carts.add_item(&admin, &buna, 1).unwrap();

        checkout
            .place_order(&admin, CheckoutRequest::default())
            .unwrap();

        assert_eq!(db.notifications.unread_count(&admin), 0);
    }
}
