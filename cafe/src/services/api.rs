//! Mock API facade
//!
//! Every call waits out the configured latency, then fails with
//! `AppError::Network` with probability `failure_rate`, and otherwise runs
//! against the repositories. There are no retries; callers decide.
//! Catalogue edits, order status changes and the dashboard require a staff
//! or admin session. Single records are visible to their owner and to staff.
//! Users are returned as `UserProfile`, never with the password hash.

use super::auth::{AuthService, Landing, RegisterRequest, SessionUser};
use super::checkout::{CheckoutRequest, CheckoutService};
use super::stats::{self, DashboardStats};
use crate::config::AppConfig;
use crate::database::{
    ActivityEntry, CartItem, Database, Id, MenuItem, MenuItemPatch, NewMenuItem, NewReservation,
    Notification, Order, OrderStatus, OrderTotals, OrderType, Reservation, ReservationStatus,
    Role, SlotAvailability, UserPatch, UserProfile,
};
use crate::error::{AppError, Result};
use chrono::{NaiveDate, NaiveTime};
use rand::Rng;
use std::time::Duration;

#[derive(Clone)]
pub struct Api {
    db: Database,
    auth: AuthService,
    checkout: CheckoutService,
    latency: Duration,
    failure_rate: f64,
}

impl Api {
    pub fn new(db: Database, auth: AuthService, config: &AppConfig) -> Self {
        Self {
            checkout: CheckoutService::new(db.clone()),
            db,
            auth,
            latency: config.api_latency(),
            failure_rate: config.failure_rate.clamp(0.0, 1.0),
        }
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    async fn call<T>(&self, operation: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let failed = self.failure_rate > 0.0 && rand::thread_rng().gen_bool(self.failure_rate);
        if failed {
            tracing::warn!("Simulated network failure in {}", operation);
            return Err(AppError::Network(format!("{} failed, please try again", operation)));
        }

        let result = f();
        if let Err(e) = &result {
            tracing::debug!("{} rejected: {}", operation, e);
        }
        result
    }

    fn staff(&self) -> Result<SessionUser> {
        self.auth.require_role(Role::Staff)
    }

    /// Customers only reach records they own
    fn check_owner(user: &SessionUser, owner: &Id) -> Result<()> {
        if user.role == Role::Customer && &user.id != owner {
            return Err(AppError::Forbidden("staff"));
        }
        Ok(())
    }

    // ===== Auth =====

    pub async fn login(&self, email: &str, password: &str) -> Result<(SessionUser, Landing)> {
        self.call("login", || self.auth.login(email, password)).await
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<UserProfile> {
        self.call("register", || self.auth.register(request).map(UserProfile::from))
            .await
    }

    pub async fn logout(&self) -> Result<()> {
        self.call("logout", || self.auth.logout()).await
    }

    // ===== Users =====

    pub async fn get_users(&self) -> Result<Vec<UserProfile>> {
        self.call("get_users", || {
            self.auth.require_role(Role::Admin)?;
            Ok(self
                .db
                .users
                .get_all()
                .into_iter()
                .map(UserProfile::from)
                .collect())
        })
        .await
    }

    /// Users may read themselves; staff may read anyone
    pub async fn get_user(&self, id: &Id) -> Result<UserProfile> {
        self.call("get_user", || {
            let user = self.auth.require_user()?;
            Self::check_owner(&user, id)?;
            self.db
                .users
                .get_by_id(id)
                .map(UserProfile::from)
                .ok_or_else(|| AppError::not_found("User", id))
        })
        .await
    }

    /// Users may edit themselves; admins may edit anyone
    pub async fn update_user(&self, id: &Id, patch: UserPatch) -> Result<UserProfile> {
        self.call("update_user", || {
            let actor = self.auth.require_user()?;
            if &actor.id != id && actor.role != Role::Admin {
                return Err(AppError::Forbidden("admin"));
            }
            if (patch.role.is_some() || patch.status.is_some()) && actor.role != Role::Admin {
                return Err(AppError::Forbidden("admin"));
            }
            self.db.users.update(id, patch).map(UserProfile::from)
        })
        .await
    }

    pub async fn delete_user(&self, id: &Id) -> Result<()> {
        self.call("delete_user", || {
            let admin = self.auth.require_role(Role::Admin)?;
            if &admin.id == id {
                return Err(AppError::validation("You cannot delete your own account"));
            }
            self.db.users.delete(id)?;
            self.log(&admin, "user.delete", id.to_string());
            Ok(())
        })
        .await
    }

    // ===== Menu =====

    pub async fn get_menu(&self) -> Result<Vec<MenuItem>> {
        self.call("get_menu", || Ok(self.db.menu.get_all())).await
    }

    pub async fn get_menu_item(&self, id: &Id) -> Result<MenuItem> {
        self.call("get_menu_item", || {
            self.db
                .menu
                .get_by_id(id)
                .ok_or_else(|| AppError::not_found("Menu item", id))
        })
        .await
    }

    pub async fn get_menu_by_category(&self, category: &str) -> Result<Vec<MenuItem>> {
        self.call("get_menu_by_category", || Ok(self.db.menu.get_by_category(category)))
            .await
    }

    pub async fn search_menu(&self, query: &str) -> Result<Vec<MenuItem>> {
        self.call("search_menu", || Ok(self.db.menu.search(query))).await
    }

    pub async fn add_menu_item(&self, item: NewMenuItem) -> Result<MenuItem> {
        self.call("add_menu_item", || {
            let actor = self.staff()?;
            let item = self.db.menu.add(item)?;
            self.log(&actor, "menu.add", format!("{} ({})", item.name, item.id));
            Ok(item)
        })
        .await
    }

    pub async fn update_menu_item(&self, id: &Id, patch: MenuItemPatch) -> Result<MenuItem> {
        self.call("update_menu_item", || {
            let actor = self.staff()?;
            let item = self.db.menu.update(id, patch)?;
            self.log(&actor, "menu.update", format!("{} ({})", item.name, item.id));
            Ok(item)
        })
        .await
    }

    pub async fn delete_menu_item(&self, id: &Id) -> Result<()> {
        self.call("delete_menu_item", || {
            let actor = self.staff()?;
            self.db.menu.delete(id)?;
            self.log(&actor, "menu.delete", id.to_string());
            Ok(())
        })
        .await
    }

    pub async fn restock(&self, id: &Id, quantity: u32) -> Result<MenuItem> {
        self.call("restock", || {
            let actor = self.staff()?;
            let item = self.db.menu.restock(id, quantity)?;
            self.log(
                &actor,
                "menu.restock",
                format!("{} +{} (now {})", item.name, quantity, item.stock),
            );
            Ok(item)
        })
        .await
    }

    // ===== Cart and orders =====

    pub async fn get_cart(&self) -> Result<Vec<CartItem>> {
        self.call("get_cart", || {
            let user = self.auth.require_user()?;
            Ok(self.db.carts.get(&user.id))
        })
        .await
    }

    pub async fn add_to_cart(&self, item_id: &Id, quantity: u32) -> Result<Vec<CartItem>> {
        self.call("add_to_cart", || {
            let user = self.auth.require_user()?;
            self.db.carts.add_item(&user.id, item_id, quantity)
        })
        .await
    }

    pub async fn update_cart_quantity(
        &self,
        item_id: &Id,
        quantity: u32,
    ) -> Result<Vec<CartItem>> {
        self.call("update_cart_quantity", || {
            let user = self.auth.require_user()?;
            self.db.carts.update_quantity(&user.id, item_id, quantity)
        })
        .await
    }

    pub async fn apply_promo(&self, code: &str) -> Result<f64> {
        self.call("apply_promo", || self.checkout.apply_promo(code)).await
    }

    pub async fn quote(&self, order_type: OrderType) -> Result<OrderTotals> {
        self.call("quote", || {
            let user = self.auth.require_user()?;
            Ok(self.checkout.quote(&user.id, order_type))
        })
        .await
    }

    pub async fn place_order(&self, request: CheckoutRequest) -> Result<Order> {
        self.call("place_order", || {
            let user = self.auth.require_user()?;
            self.checkout.place_order(&user.id, request)
        })
        .await
    }

    pub async fn get_orders(&self) -> Result<Vec<Order>> {
        self.call("get_orders", || {
            self.staff()?;
            Ok(self.db.orders.get_all())
        })
        .await
    }

    pub async fn get_orders_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        self.call("get_orders_by_status", || {
            self.staff()?;
            Ok(self.db.orders.get_by_status(status))
        })
        .await
    }

    pub async fn get_order(&self, id: &Id) -> Result<Order> {
        self.call("get_order", || {
            let user = self.auth.require_user()?;
            let order = self
                .db
                .orders
                .get_by_id(id)
                .ok_or_else(|| AppError::not_found("Order", id))?;
            Self::check_owner(&user, &order.customer_id)?;
            Ok(order)
        })
        .await
    }

    pub async fn get_my_orders(&self) -> Result<Vec<Order>> {
        self.call("get_my_orders", || {
            let user = self.auth.require_user()?;
            Ok(self.db.orders.get_by_customer(&user.id))
        })
        .await
    }

    pub async fn update_order_status(&self, id: &Id, status: OrderStatus) -> Result<Order> {
        self.call("update_order_status", || {
            let actor = self.staff()?;
            self.checkout.update_order_status(&actor.id, id, status)
        })
        .await
    }

    /// Customers may cancel their own orders; staff may cancel any
    pub async fn cancel_order(&self, id: &Id) -> Result<Order> {
        self.call("cancel_order", || {
            let user = self.auth.require_user()?;
            let order = self
                .db
                .orders
                .get_by_id(id)
                .ok_or_else(|| AppError::not_found("Order", id))?;
            Self::check_owner(&user, &order.customer_id)?;
            self.checkout
                .update_order_status(&user.id, id, OrderStatus::Cancelled)
        })
        .await
    }

    // ===== Reservations =====

    pub async fn check_availability(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<SlotAvailability> {
        self.call("check_availability", || {
            Ok(self.db.reservations.check_availability(date, time))
        })
        .await
    }

    /// Book for the logged-in customer; the request's customer id is ignored
    pub async fn create_reservation(&self, mut request: NewReservation) -> Result<Reservation> {
        self.call("create_reservation", || {
            let user = self.auth.require_user()?;
            request.customer_id = user.id;
            self.db.reservations.add(request)
        })
        .await
    }

    pub async fn get_reservations(&self) -> Result<Vec<Reservation>> {
        self.call("get_reservations", || {
            self.staff()?;
            Ok(self.db.reservations.get_all())
        })
        .await
    }

    pub async fn get_reservations_by_date(&self, date: NaiveDate) -> Result<Vec<Reservation>> {
        self.call("get_reservations_by_date", || {
            self.staff()?;
            Ok(self.db.reservations.get_by_date(date))
        })
        .await
    }

    pub async fn get_my_reservations(&self) -> Result<Vec<Reservation>> {
        self.call("get_my_reservations", || {
            let user = self.auth.require_user()?;
            Ok(self.db.reservations.get_by_customer(&user.id))
        })
        .await
    }

    pub async fn update_reservation_status(
        &self,
        id: &Id,
        status: ReservationStatus,
    ) -> Result<Reservation> {
        self.call("update_reservation_status", || {
            let actor = self.staff()?;
            let reservation = self.db.reservations.update_status(id, status)?;
            self.log(
                &actor,
                "reservation.status",
                format!("{} -> {:?}", reservation.id, status),
            );
            Ok(reservation)
        })
        .await
    }

    pub async fn cancel_reservation(&self, id: &Id) -> Result<Reservation> {
        self.call("cancel_reservation", || {
            let user = self.auth.require_user()?;
            let reservation = self
                .db
                .reservations
                .get_by_id(id)
                .ok_or_else(|| AppError::not_found("Reservation", id))?;
            Self::check_owner(&user, &reservation.customer_id)?;
            self.db.reservations.cancel(id)
        })
        .await
    }

    // ===== Notifications =====

    pub async fn get_notifications(&self) -> Result<Vec<Notification>> {
        self.call("get_notifications", || {
            let user = self.auth.require_user()?;
            Ok(self.db.notifications.get_for_user(&user.id))
        })
        .await
    }

    /// Only the recipient may mark a notification read
    pub async fn mark_notification_read(&self, id: &Id) -> Result<Notification> {
        self.call("mark_notification_read", || {
            let user = self.auth.require_user()?;
            let notification = self
                .db
                .notifications
                .get_by_id(id)
                .ok_or_else(|| AppError::not_found("Notification", id))?;
            if notification.user_id != user.id {
                return Err(AppError::not_found("Notification", id));
            }
            self.db.notifications.mark_read(id)
        })
        .await
    }

    pub async fn mark_all_notifications_read(&self) -> Result<usize> {
        self.call("mark_all_notifications_read", || {
            let user = self.auth.require_user()?;
            self.db.notifications.mark_all_read(&user.id)
        })
        .await
    }

    // ===== Dashboard =====

    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        self.call("dashboard_stats", || {
            self.staff()?;
            Ok(stats::dashboard(&self.db))
        })
        .await
    }

    pub async fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>> {
        self.call("recent_activity", || {
            self.auth.require_role(Role::Admin)?;
            Ok(self.db.activity.recent(limit))
        })
        .await
    }

    fn log(&self, actor: &SessionUser, action: &str, details: String) {
        if let Err(e) = self.db.activity.log(Some(&actor.id), action, details) {
            tracing::warn!("Failed to log activity {}: {}", action, e);
        }
    }
}
