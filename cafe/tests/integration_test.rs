//! Integration tests for the café core
//!
//! These tests verify end-to-end behaviour including:
//! - Registration and login
//! - Stock bookkeeping across orders
//! - Reservation slot capacity
//! - Persistence and cross-tab sessions

use cafe::app::AppState;
use cafe::config::AppConfig;
use cafe::database::{
    Id, ItemStatus, NewMenuItem, NewOrder, NewReservation, OrderRequestLine, OrderType,
    PaymentMethod, ReservationStatus,
};
use cafe::error::AppError;
use cafe::services::{CheckoutRequest, RegisterRequest};
use cafe::storage::{FileStore, Storage};
use chrono::{Duration, NaiveTime, Utc};
use std::time::Duration as StdDuration;
use tempfile::TempDir;

/// Helper to create an in-memory app with no latency and no seed menu
fn create_test_app() -> AppState {
    AppState::open(Storage::in_memory(), AppConfig::instant()).unwrap()
}

fn add_item(app: &AppState, name: &str, price: f64, stock: u32) -> Id {
    app.db
        .menu
        .add(NewMenuItem {
            name: name.to_string(),
            price,
            category: "coffee".to_string(),
            stock,
            ..Default::default()
        })
        .unwrap()
        .id
}

fn order(customer: &Id, item: &Id, quantity: u32) -> NewOrder {
    NewOrder {
        customer_id: customer.clone(),
        items: vec![OrderRequestLine::new(item.clone(), quantity)],
        payment_method: PaymentMethod::Telebirr,
        order_type: OrderType::Pickup,
        delivery_address: None,
        notes: None,
        promo_code: None,
        discount_rate: 0.0,
    }
}

fn registration(email: &str) -> RegisterRequest {
    RegisterRequest {
        name: "Abebe Bekele".to_string(),
        email: email.to_string(),
        phone: "+251911234567".to_string(),
        password: "Secret123".to_string(),
        confirm_password: "Secret123".to_string(),
    }
}

#[test]
fn test_registered_user_found_in_any_case() {
    let app = create_test_app();

    let user = app.auth.register(registration("Abebe@Example.com")).unwrap();

    assert_eq!(
        app.db.users.get_by_email("abebe@example.com").map(|u| u.id),
        Some(user.id.clone())
    );
    assert_eq!(
        app.db.users.get_by_email("ABEBE@EXAMPLE.COM").map(|u| u.id),
        Some(user.id)
    );
    assert!(matches!(
        app.auth.register(registration("aBeBe@example.com")),
        Err(AppError::DuplicateEmail(_))
    ));
}

#[test]
fn test_buna_scenario() {
    let app = create_test_app();
    let customer = Id::from(1);
    let buna = add_item(&app, "Buna", 50.0, 3);

    app.db.orders.add(order(&customer, &buna, 2)).unwrap();
    let item = app.db.menu.get_by_id(&buna).unwrap();
    assert_eq!(item.stock, 1);
    assert_eq!(item.status, ItemStatus::Available);

    app.db.orders.add(order(&customer, &buna, 1)).unwrap();
    let item = app.db.menu.get_by_id(&buna).unwrap();
    assert_eq!(item.stock, 0);
    assert_eq!(item.status, ItemStatus::OutOfStock);

    let rejected = app.db.orders.add(order(&customer, &buna, 1));
    assert!(matches!(rejected, Err(AppError::OutOfStock(_))));
    assert_eq!(app.db.menu.get_by_id(&buna).unwrap().stock, 0);
    assert_eq!(app.db.orders.get_all().len(), 2);
}

#[test]
fn test_order_over_stock_changes_nothing() {
    let app = create_test_app();
    let customer = Id::from(1);
    let buna = add_item(&app, "Buna", 50.0, 5);
    let shai = add_item(&app, "Shai", 25.0, 1);

    let mut request = order(&customer, &buna, 2);
    request.items.push(OrderRequestLine::new(shai.clone(), 2));

    assert!(matches!(
        app.db.orders.add(request),
        Err(AppError::InsufficientStock { .. })
    ));
    assert_eq!(app.db.menu.get_by_id(&buna).unwrap().stock, 5);
    assert_eq!(app.db.menu.get_by_id(&shai).unwrap().stock, 1);
    assert!(app.db.orders.get_all().is_empty());
}

#[test]
fn test_reduce_stock() {
    let app = create_test_app();
    let buna = add_item(&app, "Buna", 50.0, 4);

    let item = app.db.menu.reduce_stock(&buna, 4).unwrap();
    assert_eq!(item.stock, 0);
    assert_eq!(item.status, ItemStatus::OutOfStock);

    assert!(app.db.menu.reduce_stock(&buna, 1).is_err());
    assert_eq!(app.db.menu.get_by_id(&buna).unwrap().stock, 0);
}

#[test]
fn test_slot_capacity_ten() {
    let app = create_test_app();
    let date = Utc::now().date_naive() + Duration::days(7);
    let time = NaiveTime::from_hms_opt(12, 30, 0).unwrap();
    let book = |customer: u64| NewReservation {
        customer_id: Id::from(customer),
        guests: 2,
        date,
        time,
        duration: None,
        special_requests: None,
    };

    for customer in 0..9 {
        app.db.reservations.add(book(customer)).unwrap();
    }
    app.db.reservations.add(book(9)).unwrap();
    assert_eq!(app.db.reservations.check_availability(date, time).remaining, 0);

    assert!(matches!(
        app.db.reservations.add(book(10)),
        Err(AppError::FullyBooked { .. })
    ));
}

#[test]
fn test_cancel_cancelled_reservation_is_noop() {
    let app = create_test_app();
    let reservation = app
        .db
        .reservations
        .add(NewReservation {
            customer_id: Id::from(1),
            guests: 4,
            date: Utc::now().date_naive() + Duration::days(1),
            time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            duration: Some(90),
            special_requests: None,
        })
        .unwrap();

    let first = app.db.reservations.cancel(&reservation.id).unwrap();
    let second = app.db.reservations.cancel(&reservation.id).unwrap();

    assert_eq!(second.status, ReservationStatus::Cancelled);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_checkout_through_api() {
    let app = create_test_app();
    let buna = add_item(&app, "Buna", 50.0, 3);
    app.api.register(registration("abebe@example.com")).await.unwrap();
    app.api.login("abebe@example.com", "Secret123").await.unwrap();

    app.api.add_to_cart(&buna, 2).await.unwrap();
    app.api.apply_promo("WELCOME15").await.unwrap();
    let placed = app
        .api
        .place_order(CheckoutRequest {
            order_type: OrderType::Delivery,
            delivery_address: Some("Bole, Addis Ababa".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    // 100 - 15 discount, + 8.5 tax, + 50 delivery
    assert_eq!(placed.total, 143.5);
    assert!(app.api.get_cart().await.unwrap().is_empty());
    assert_eq!(app.api.get_menu_item(&buna).await.unwrap().stock, 1);
}

#[tokio::test]
async fn test_persistence_across_restart() {
    let temp_dir = TempDir::new().unwrap();
    let config = AppConfig::instant();

    let buna = {
        let app = AppState::open(
            Storage::new(FileStore::open(temp_dir.path()).unwrap()),
            config.clone(),
        )
        .unwrap();
        let buna = add_item(&app, "Buna", 50.0, 3);
        app.db.orders.add(order(&Id::from(1), &buna, 1)).unwrap();
        buna
    };

    let app = AppState::open(
        Storage::new(FileStore::open(temp_dir.path()).unwrap()),
        config,
    )
    .unwrap();
    assert_eq!(app.db.menu.get_by_id(&buna).unwrap().stock, 2);
    assert_eq!(app.db.orders.get_all().len(), 1);
}

#[tokio::test]
async fn test_logout_in_one_tab_reaches_the_other() {
    let first = create_test_app();
    let second = first.open_tab().unwrap();
    let sync = second.start_session_sync();
    let mut changes = second.auth.subscribe();

    first.auth.login("admin@cafe.et", "Admin123").unwrap();
    tokio::time::timeout(StdDuration::from_secs(1), changes.changed())
        .await
        .unwrap()
        .unwrap();
    assert!(second.auth.is_authenticated());

    first.auth.logout().unwrap();
    tokio::time::timeout(StdDuration::from_secs(1), changes.changed())
        .await
        .unwrap()
        .unwrap();
    assert!(!second.auth.is_authenticated());

    sync.abort();
}

#[tokio::test]
async fn test_concurrent_tabs_do_not_lose_updates() {
    let first = create_test_app();
    let second = first.open_tab().unwrap();
    let buna = add_item(&first, "Buna", 50.0, 100);

    let a = {
        let db = first.db.clone();
        let buna = buna.clone();
        tokio::task::spawn_blocking(move || {
            for _ in 0..20 {
                db.orders.add(order(&Id::from(1), &buna, 1)).unwrap();
            }
        })
    };
    let b = {
        let db = second.db.clone();
        let buna = buna.clone();
        tokio::task::spawn_blocking(move || {
            for _ in 0..20 {
                db.orders.add(order(&Id::from(2), &buna, 1)).unwrap();
            }
        })
    };
    a.await.unwrap();
    b.await.unwrap();

    assert_eq!(first.db.orders.get_all().len(), 40);
    assert_eq!(first.db.menu.get_by_id(&buna).unwrap().stock, 60);
}
