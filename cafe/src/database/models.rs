//! Collection record types
//!
//! Records keep the camelCase JSON shape the collections are stored in.
//! Optional and later-added fields carry serde defaults, which is how older
//! stored records get their missing fields filled in on load.

use super::ids::Id;
use crate::config::{DELIVERY_FEE, TAX_RATE};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Round to whole cents
pub fn round_currency(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ===== Users =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Customer,
    Staff,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Customer => "customer",
            Role::Staff => "staff",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(default)]
    pub favorite_category: Option<String>,
    #[serde(default)]
    pub dietary: Vec<String>,
    #[serde(default)]
    pub newsletter: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    #[serde(default)]
    pub total_orders: u32,
    #[serde(default)]
    pub total_spent: f64,
    #[serde(default)]
    pub reward_points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Id,
    pub name: String,
    pub email: String,
    /// Argon2id PHC string
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub status: AccountStatus,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub preferences: UserPreferences,
    #[serde(default)]
    pub stats: UserStats,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

/// A user as handed out by the API: everything except the password hash
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Id,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub status: AccountStatus,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub address: Option<String>,
    pub preferences: UserPreferences,
    pub stats: UserStats,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            role: user.role,
            status: user.status,
            avatar: user.avatar,
            created_at: user.created_at,
            updated_at: user.updated_at,
            last_login: user.last_login,
            address: user.address,
            preferences: user.preferences,
            stats: user.stats,
        }
    }
}

/// Create user request; `password` is plaintext and hashed on insert
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Shallow patch; `None` leaves the field unchanged
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Plaintext, hashed before storing
    pub password: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub status: Option<AccountStatus>,
    pub avatar: Option<String>,
    pub address: Option<String>,
    pub preferences: Option<UserPreferences>,
}

// ===== Menu =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Available,
    OutOfStock,
}

impl ItemStatus {
    pub fn for_stock(stock: u32) -> Self {
        if stock == 0 {
            ItemStatus::OutOfStock
        } else {
            ItemStatus::Available
        }
    }
}

/// Stored stock may have gone negative in older data; clamp it to zero
fn clamped_stock<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let raw = i64::deserialize(deserializer)?;
    Ok(raw.clamp(0, u32::MAX as i64) as u32)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub category: String,
    #[serde(default, deserialize_with = "clamped_stock")]
    pub stock: u32,
    /// Derived from `stock`; see `refresh_status`
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub popular: bool,
    #[serde(default)]
    pub ethiopian: bool,
    #[serde(default)]
    pub vegetarian: bool,
    #[serde(default)]
    pub vegan: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl MenuItem {
    pub fn is_available(&self) -> bool {
        self.status == ItemStatus::Available
    }

    /// Recompute status from stock; returns true if it changed
    pub fn refresh_status(&mut self) -> bool {
        let status = ItemStatus::for_stock(self.stock);
        let changed = status != self.status;
        self.status = status;
        changed
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMenuItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub category: String,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub popular: bool,
    #[serde(default)]
    pub ethiopian: bool,
    #[serde(default)]
    pub vegetarian: bool,
    #[serde(default)]
    pub vegan: bool,
}

/// Menu patch. Status is not patchable; it follows stock.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub stock: Option<u32>,
    pub image: Option<String>,
    pub popular: Option<bool>,
    pub ethiopian: Option<bool>,
    pub vegetarian: Option<bool>,
    pub vegan: Option<bool>,
}

// ===== Orders =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Still in the kitchen's queue
    pub fn is_open(self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Preparing | OrderStatus::Ready
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Telebirr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    #[default]
    Pickup,
    Delivery,
}

/// Snapshot of a menu item at order time; not linked back to the menu
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub item_id: Id,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
    #[serde(default)]
    pub category: String,
}

impl OrderLine {
    pub fn line_total(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Id,
    pub customer_id: Id,
    pub items: Vec<OrderLine>,
    pub subtotal: f64,
    pub tax: f64,
    #[serde(default)]
    pub delivery_fee: f64,
    #[serde(default)]
    pub discount: f64,
    pub total: f64,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub order_type: OrderType,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub promo_code: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequestLine {
    pub item_id: Id,
    pub quantity: u32,
}

impl OrderRequestLine {
    pub fn new(item_id: impl Into<Id>, quantity: u32) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
        }
    }
}

/// Place order request. Prices come from the menu, not the request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub customer_id: Id,
    pub items: Vec<OrderRequestLine>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub order_type: OrderType,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub promo_code: Option<String>,
    /// Fraction of the subtotal taken off, in [0, 1)
    #[serde(default)]
    pub discount_rate: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
}

/// Money breakdown of an order
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: f64,
    pub discount: f64,
    pub tax: f64,
    pub delivery_fee: f64,
    pub total: f64,
}

impl OrderTotals {
    /// Tax is charged on the discounted subtotal; delivery fee is untaxed
    pub fn compute(subtotal: f64, order_type: OrderType, discount_rate: f64) -> Self {
        let subtotal = round_currency(subtotal);
        let discount = round_currency(subtotal * discount_rate);
        let taxable = subtotal - discount;
        let tax = round_currency(taxable * TAX_RATE);
        let delivery_fee = match order_type {
            OrderType::Delivery => DELIVERY_FEE,
            OrderType::Pickup => 0.0,
        };
        Self {
            subtotal,
            discount,
            tax,
            delivery_fee,
            total: round_currency(taxable + tax + delivery_fee),
        }
    }
}

// ===== Reservations =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

/// Reservation times are stored as "HH:MM"; "HH:MM:SS" is accepted on read
pub mod slot_time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn parse(value: &str) -> Option<NaiveTime> {
        let value = value.trim();
        NaiveTime::parse_from_str(value, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
            .ok()
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid time {:?}", raw)))
    }
}

fn default_duration() -> u32 {
    crate::config::DEFAULT_RESERVATION_DURATION_MIN
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Id,
    pub customer_id: Id,
    pub guests: u32,
    pub date: NaiveDate,
    #[serde(with = "slot_time")]
    pub time: NaiveTime,
    /// Minutes
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default)]
    pub status: ReservationStatus,
    #[serde(default)]
    pub special_requests: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Counts against slot capacity
    pub fn holds_slot(&self) -> bool {
        self.status != ReservationStatus::Cancelled
    }

    pub fn in_slot(&self, date: NaiveDate, time: NaiveTime) -> bool {
        self.date == date && self.time == time
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReservation {
    pub customer_id: Id,
    pub guests: u32,
    pub date: NaiveDate,
    #[serde(with = "slot_time")]
    pub time: NaiveTime,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub special_requests: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationPatch {
    pub guests: Option<u32>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub duration: Option<u32>,
    pub status: Option<ReservationStatus>,
    pub special_requests: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAvailability {
    pub date: NaiveDate,
    #[serde(with = "slot_time")]
    pub time: NaiveTime,
    pub capacity: usize,
    pub booked: usize,
    pub remaining: usize,
    pub available: bool,
}

// ===== Carts =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub item_id: Id,
    pub name: String,
    /// Price when the item was added
    pub price: f64,
    pub quantity: u32,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub item_count: u32,
    pub subtotal: f64,
}

// ===== Notifications =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Order,
    Reservation,
    Promotion,
    #[default]
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Id,
    pub user_id: Id,
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Id,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

// ===== Admin activity =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: Id,
    #[serde(default)]
    pub user_id: Option<Id>,
    pub action: String,
    #[serde(default)]
    pub details: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

// ===== Preferences =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    #[serde(default = "default_true")]
    pub order_updates: bool,
    #[serde(default = "default_true")]
    pub reservation_reminders: bool,
    #[serde(default)]
    pub promotions: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            order_updates: true,
            reservation_reminders: true,
            promotions: false,
        }
    }
}
