//! Collection seeding and backfill
//!
//! Collections are created lazily: on start-up every absent collection is
//! seeded, and every present one is passed through its record type so that
//! fields added since it was written get their defaults. A collection whose
//! normalized form differs from what is stored is written back.

use super::ids::{generate_prefixed, Id};
use super::models::{
    AccountStatus, ActivityEntry, ItemStatus, MenuItem, Notification, Order, Reservation,
    ReservationStatus, Role, User, UserPreferences, UserStats,
};
use crate::config::{
    SeedMode, ACTIVITY_LOG_KEY, MENU_KEY, NOTIFICATIONS_KEY, ORDERS_KEY, RESERVATIONS_KEY,
    USERS_KEY,
};
use crate::crypto::{hash_password, is_password_hash};
use crate::error::Result;
use crate::storage::{Storage, Transaction};
use chrono::{Duration, NaiveTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Demo accounts: (name, email, password, phone, role)
const DEMO_USERS: &[(&str, &str, &str, &str, Role)] = &[
    ("Café Admin", "admin@cafe.et", "Admin123", "+251911000001", Role::Admin),
    ("Kebede Staff", "staff@cafe.et", "Staff123", "+251911000002", Role::Staff),
    ("Abebe Bekele", "abebe@example.com", "Customer1", "0911234567", Role::Customer),
];

/// Demo menu: (name, description, price, category, stock, popular, ethiopian, vegetarian, vegan)
type MenuSeed = (&'static str, &'static str, f64, &'static str, u32, bool, bool, bool, bool);

const DEMO_MENU: &[MenuSeed] = &[
    ("Buna", "Traditional Ethiopian coffee ceremony brew", 50.0, "coffee", 40, true, true, true, true),
    ("Macchiato", "Espresso with a dash of steamed milk", 60.0, "coffee", 30, true, false, true, false),
    ("Spris", "Layered avocado, mango and papaya juice", 90.0, "drinks", 15, false, true, true, true),
    ("Shai", "Spiced black tea", 25.0, "drinks", 50, false, true, true, true),
    ("Sambusa", "Crisp pastry filled with spiced lentils", 30.0, "snacks", 25, true, true, true, true),
    ("Chechebsa", "Shredded flatbread with berbere and kibe", 110.0, "breakfast", 12, false, true, true, false),
    ("Firfir", "Torn injera simmered in spiced sauce", 120.0, "breakfast", 10, false, true, true, true),
    ("Shiro", "Chickpea stew served with injera", 150.0, "mains", 20, true, true, true, true),
    ("Doro Wat", "Slow-cooked chicken stew with egg", 280.0, "mains", 8, true, true, false, false),
    ("Tibs", "Sautéed beef with onion and rosemary", 260.0, "mains", 10, false, true, false, false),
    ("Kitfo", "Minced beef with mitmita and kibe", 300.0, "mains", 4, false, true, false, false),
];

/// Seed absent collections and backfill present ones
pub fn initialize(storage: &Storage, seed: SeedMode) -> Result<()> {
    tracing::info!("Initializing collections (seed mode: {:?})", seed);

    let seed_users = if storage.contains(USERS_KEY) {
        None
    } else {
        Some(demo_users(seed)?)
    };

    storage.transaction(|tx| {
        if let Some(users) = &seed_users {
            tracing::info!("Seeding {} users", users.len());
            tx.put(USERS_KEY, users)?;
        }
        if !tx.contains(MENU_KEY) {
            let menu = match seed {
                SeedMode::Demo => demo_menu(),
                SeedMode::Empty => Vec::new(),
            };
            tracing::info!("Seeding {} menu items", menu.len());
            tx.put(MENU_KEY, &menu)?;
        }
        if !tx.contains(RESERVATIONS_KEY) {
            let reservations = match seed {
                SeedMode::Demo => demo_reservations(),
                SeedMode::Empty => Vec::new(),
            };
            tx.put(RESERVATIONS_KEY, &reservations)?;
        }
        if !tx.contains(ORDERS_KEY) {
            tx.put(ORDERS_KEY, &Vec::<Order>::new())?;
        }
        if !tx.contains(NOTIFICATIONS_KEY) {
            tx.put(NOTIFICATIONS_KEY, &Vec::<Notification>::new())?;
        }

        backfill::<User>(tx, USERS_KEY, |user| {
            if !user.password.is_empty() && !is_password_hash(&user.password) {
                tracing::info!("Hashing plaintext password of user {}", user.id);
                user.password = hash_password(&user.password)?;
            }
            Ok(())
        })?;
        backfill::<MenuItem>(tx, MENU_KEY, |item| {
            item.refresh_status();
            Ok(())
        })?;
        backfill::<Order>(tx, ORDERS_KEY, |_| Ok(()))?;
        backfill::<Reservation>(tx, RESERVATIONS_KEY, |_| Ok(()))?;
        backfill::<Notification>(tx, NOTIFICATIONS_KEY, |_| Ok(()))?;
        backfill::<ActivityEntry>(tx, ACTIVITY_LOG_KEY, |_| Ok(()))?;
        Ok(())
    })?;

    tracing::info!("Collections initialized");
    Ok(())
}

/// Normalize every record of a collection, writing back only on change.
///
/// A collection that does not parse at all is left alone; reads already
/// treat it as empty.
fn backfill<T>(
    tx: &mut Transaction<'_>,
    key: &str,
    mut fix: impl FnMut(&mut T) -> Result<()>,
) -> Result<()>
where
    T: Serialize + DeserializeOwned,
{
    let stored: serde_json::Value = match tx.read(key) {
        Some(value) => value,
        None => return Ok(()),
    };

    let mut records: Vec<T> = match serde_json::from_value(stored.clone()) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!("Skipping backfill of {}: {}", key, e);
            return Ok(());
        }
    };
    for record in records.iter_mut() {
        fix(record)?;
    }

    let normalized = serde_json::to_value(&records)?;
    if normalized != stored {
        tracing::info!("Backfilled {} record(s) in {}", records.len(), key);
        tx.put(key, &normalized)?;
    }
    Ok(())
}

fn demo_users(seed: SeedMode) -> Result<Vec<User>> {
    let accounts = match seed {
        SeedMode::Demo => DEMO_USERS,
        // The admin account always exists
        SeedMode::Empty => &DEMO_USERS[..1],
    };

    let now = Utc::now();
    accounts
        .iter()
        .zip(1u64..)
        .map(|(&(name, email, password, phone, role), id)| {
            Ok(User {
                id: Id::from(id),
                name: name.to_string(),
                email: email.to_string(),
                password: hash_password(password)?,
                phone: phone.to_string(),
                role,
                status: AccountStatus::Active,
                avatar: None,
                created_at: now,
                updated_at: None,
                last_login: None,
                address: None,
                preferences: UserPreferences::default(),
                stats: UserStats::default(),
            })
        })
        .collect()
}

fn demo_menu() -> Vec<MenuItem> {
    let now = Utc::now();
    let mut items: Vec<MenuItem> = Vec::with_capacity(DEMO_MENU.len());
    for &(name, description, price, category, stock, popular, ethiopian, vegetarian, vegan) in
        DEMO_MENU
    {
        let id = generate_prefixed("ITEM", |candidate| items.iter().any(|i| i.id == candidate));
        items.push(MenuItem {
            id,
            name: name.to_string(),
            description: description.to_string(),
            price,
            category: category.to_string(),
            stock,
            status: ItemStatus::for_stock(stock),
            image: None,
            popular,
            ethiopian,
            vegetarian,
            vegan,
            created_at: now,
            updated_at: now,
        });
    }
    items
}

fn demo_reservations() -> Vec<Reservation> {
    let now = Utc::now();
    let Some(time) = NaiveTime::from_hms_opt(19, 0, 0) else {
        return Vec::new();
    };
    vec![Reservation {
        id: generate_prefixed("RES", |_| false),
        // Demo customer
        customer_id: Id::from(3),
        guests: 4,
        date: now.date_naive() + Duration::days(1),
        time,
        duration: crate::config::DEFAULT_RESERVATION_DURATION_MIN,
        status: ReservationStatus::Confirmed,
        special_requests: Some("Coffee ceremony for the table".to_string()),
        created_at: now,
        updated_at: now,
    }]
}
