//! Per-user carts
//!
//! Each cart is its own key (`cafe_cart_<userId>`). Prices are captured
//! when an item is added; checkout re-prices from the menu.

use super::ids::Id;
use super::menu::check_stock;
use super::models::{round_currency, CartItem, CartSummary, MenuItem};
use crate::config::{CART_KEY_PREFIX, MAX_CART_QUANTITY, MENU_KEY};
use crate::error::{AppError, Result};
use crate::storage::Storage;

pub fn cart_key(user_id: &Id) -> String {
    format!("{}{}", CART_KEY_PREFIX, user_id)
}

#[derive(Clone)]
pub struct CartsRepo {
    storage: Storage,
}

impl CartsRepo {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn get(&self, user_id: &Id) -> Vec<CartItem> {
        self.storage.read_collection(&cart_key(user_id))
    }

    pub fn summary(&self, user_id: &Id) -> CartSummary {
        summarize(&self.get(user_id))
    }

    /// Add `quantity` of a menu item, merging with an existing line
    pub fn add_item(&self, user_id: &Id, item_id: &Id, quantity: u32) -> Result<Vec<CartItem>> {
        if quantity == 0 {
            return Err(AppError::validation("Quantity must be at least 1"));
        }

        let key = cart_key(user_id);
        let cart = self.storage.transaction(|tx| {
            let menu: Vec<MenuItem> = tx.collection(MENU_KEY);
            let item = menu
                .iter()
                .find(|m| &m.id == item_id)
                .ok_or_else(|| AppError::not_found("Menu item", item_id))?;

            let mut cart: Vec<CartItem> = tx.collection(&key);
            let existing = cart
                .iter()
                .find(|line| &line.item_id == item_id)
                .map(|line| line.quantity)
                .unwrap_or(0);
            let wanted = existing
                .checked_add(quantity)
                .filter(|&wanted| wanted <= MAX_CART_QUANTITY)
                .ok_or_else(|| {
                    AppError::validation(format!(
                        "At most {} of one item per order",
                        MAX_CART_QUANTITY
                    ))
                })?;
            check_stock(item, wanted)?;

            match cart.iter_mut().find(|line| &line.item_id == item_id) {
                Some(line) => line.quantity = wanted,
                None => cart.push(CartItem {
                    item_id: item.id.clone(),
                    name: item.name.clone(),
                    price: item.price,
                    quantity,
                    category: item.category.clone(),
                    image: item.image.clone(),
                }),
            }

            tx.put(&key, &cart)?;
            Ok(cart)
        })?;

        tracing::debug!("Added {} x {} to cart of user {}", quantity, item_id, user_id);
        Ok(cart)
    }

    /// Set a line's quantity; zero removes the line
    pub fn update_quantity(&self, user_id: &Id, item_id: &Id, quantity: u32) -> Result<Vec<CartItem>> {
        if quantity == 0 {
            return self.remove_item(user_id, item_id);
        }
        if quantity > MAX_CART_QUANTITY {
            return Err(AppError::validation(format!(
                "At most {} of one item per order",
                MAX_CART_QUANTITY
            )));
        }

        let key = cart_key(user_id);
        self.storage.transaction(|tx| {
            let mut cart: Vec<CartItem> = tx.collection(&key);
            let line = cart
                .iter_mut()
                .find(|line| &line.item_id == item_id)
                .ok_or_else(|| AppError::not_found("Cart item", item_id))?;

            let menu: Vec<MenuItem> = tx.collection(MENU_KEY);
            if let Some(item) = menu.iter().find(|m| &m.id == item_id) {
                check_stock(item, quantity)?;
            }
            line.quantity = quantity;

            tx.put(&key, &cart)?;
            Ok(cart)
        })
    }

    pub fn remove_item(&self, user_id: &Id, item_id: &Id) -> Result<Vec<CartItem>> {
        let key = cart_key(user_id);
        self.storage.transaction(|tx| {
            let mut cart: Vec<CartItem> = tx.collection(&key);
            cart.retain(|line| &line.item_id != item_id);
            tx.put(&key, &cart)?;
            Ok(cart)
        })
    }

    pub fn clear(&self, user_id: &Id) -> Result<()> {
        self.storage.remove(&cart_key(user_id))?;
        tracing::debug!("Cleared cart of user {}", user_id);
        Ok(())
    }
}

pub fn summarize(cart: &[CartItem]) -> CartSummary {
    CartSummary {
        item_count: cart.iter().map(|line| line.quantity).sum(),
        subtotal: round_currency(
            cart.iter()
                .map(|line| line.price * line.quantity as f64)
                .sum(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::menu::MenuRepo;
    use crate::database::models::NewMenuItem;

    fn create_test_repos() -> (CartsRepo, MenuRepo) {
        let storage = Storage::in_memory();
        (CartsRepo::new(storage.clone()), MenuRepo::new(storage))
    }

    fn add_menu_item(menu: &MenuRepo, name: &str, price: f64, stock: u32) -> MenuItem {
        menu.add(NewMenuItem {
            name: name.to_string(),
            price,
            category: "coffee".to_string(),
            stock,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_add_merges_lines() {
        let (carts, menu) = create_test_repos();
        let buna = add_menu_item(&menu, "Buna", 50.0, 10);
        let user = Id::from(1);

        carts.add_item(&user, &buna.id, 2).unwrap();
        let cart = carts.add_item(&user, &buna.id, 1).unwrap();

        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].quantity, 3);
        assert_eq!(carts.summary(&user).subtotal, 150.0);
    }

    #[test]
    fn test_price_captured_at_add_time() {
        let (carts, menu) = create_test_repos();
        let buna = add_menu_item(&menu, "Buna", 50.0, 10);
        let user = Id::from(1);

        carts.add_item(&user, &buna.id, 1).unwrap();
        menu.update(
            &buna.id,
            crate::database::models::MenuItemPatch {
                price: Some(60.0),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(carts.get(&user)[0].price, 50.0);
    }

    #[test]
    fn test_cannot_exceed_stock() {
        let (carts, menu) = create_test_repos();
        let buna = add_menu_item(&menu, "Buna", 50.0, 2);
        let user = Id::from(1);

        carts.add_item(&user, &buna.id, 2).unwrap();
        let result = carts.add_item(&user, &buna.id, 1);

        assert!(matches!(result, Err(AppError::InsufficientStock { .. })));
        assert_eq!(carts.get(&user)[0].quantity, 2);
    }

    #[test]
    fn test_huge_quantity_rejected_without_overflow() {
        let (carts, menu) = create_test_repos();
        let buna = add_menu_item(&menu, "Buna", 50.0, 10_000);
        let user = Id::from(1);

        carts.add_item(&user, &buna.id, 1).unwrap();
        let result = carts.add_item(&user, &buna.id, u32::MAX);

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(carts.add_item(&user, &buna.id, MAX_CART_QUANTITY).is_err());
        assert_eq!(carts.get(&user)[0].quantity, 1);
    }

    #[test]
    fn test_out_of_stock_item_rejected() {
        let (carts, menu) = create_test_repos();
        let tea = add_menu_item(&menu, "Shai", 20.0, 0);

        let result = carts.add_item(&Id::from(1), &tea.id, 1);
        assert!(matches!(result, Err(AppError::OutOfStock(_))));
    }

    #[test]
    fn test_update_quantity_and_remove() {
        let (carts, menu) = create_test_repos();
        let buna = add_menu_item(&menu, "Buna", 50.0, 10);
        let tea = add_menu_item(&menu, "Shai", 20.0, 10);
        let user = Id::from(1);

        carts.add_item(&user, &buna.id, 1).unwrap();
        carts.add_item(&user, &tea.id, 1).unwrap();

        let cart = carts.update_quantity(&user, &buna.id, 4).unwrap();
        assert_eq!(cart[0].quantity, 4);

        let cart = carts.update_quantity(&user, &tea.id, 0).unwrap();
        assert_eq!(cart.len(), 1);

        carts.clear(&user).unwrap();
        assert!(carts.get(&user).is_empty());
    }

    #[test]
    fn test_carts_are_per_user() {
        let (carts, menu) = create_test_repos();
        let buna = add_menu_item(&menu, "Buna", 50.0, 10);

        carts.add_item(&Id::from(1), &buna.id, 1).unwrap();

        assert!(carts.get(&Id::from(2)).is_empty());
        assert_eq!(cart_key(&Id::from(2)), "cafe_cart_2");
    }
}
