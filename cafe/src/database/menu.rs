//! Menu collection
//!
//! Item status is derived from stock: every stock change goes through
//! `MenuItem::refresh_status`, and patches cannot set status directly.

use super::ids::{generate_prefixed, Id};
use super::models::{ItemStatus, MenuItem, MenuItemPatch, NewMenuItem};
use crate::config::MENU_KEY;
use crate::error::{AppError, Result};
use crate::storage::Storage;
use crate::validation::{matches_query, require};
use chrono::Utc;

/// Fail unless `requested` units can be taken from `item`
pub fn check_stock(item: &MenuItem, requested: u32) -> Result<()> {
    if item.stock == 0 || item.status == ItemStatus::OutOfStock {
        return Err(AppError::OutOfStock(item.name.clone()));
    }
    if requested > item.stock {
        return Err(AppError::InsufficientStock {
            name: item.name.clone(),
            requested,
            available: item.stock,
        });
    }
    Ok(())
}

/// Take stock from an item already checked with `check_stock`
pub(crate) fn take_stock(item: &mut MenuItem, quantity: u32) {
    item.stock = item.stock.saturating_sub(quantity);
    item.refresh_status();
    item.updated_at = Utc::now();
}

pub(crate) fn return_stock(item: &mut MenuItem, quantity: u32) {
    item.stock = item.stock.saturating_add(quantity);
    item.refresh_status();
    item.updated_at = Utc::now();
}

fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() || price <= 0.0 {
        return Err(AppError::validation("Price must be greater than zero"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct MenuRepo {
    storage: Storage,
}

impl MenuRepo {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn get_all(&self) -> Vec<MenuItem> {
        self.storage.read_collection(MENU_KEY)
    }

    pub fn get_by_id(&self, id: &Id) -> Option<MenuItem> {
        self.get_all().into_iter().find(|item| &item.id == id)
    }

    /// Case-insensitive category match
    pub fn get_by_category(&self, category: &str) -> Vec<MenuItem> {
        self.get_all()
            .into_iter()
            .filter(|item| item.category.eq_ignore_ascii_case(category.trim()))
            .collect()
    }

    pub fn get_available(&self) -> Vec<MenuItem> {
        self.get_all()
            .into_iter()
            .filter(MenuItem::is_available)
            .collect()
    }

    pub fn get_popular(&self) -> Vec<MenuItem> {
        self.get_all()
            .into_iter()
            .filter(|item| item.popular)
            .collect()
    }

    /// Distinct categories, sorted
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self
            .get_all()
            .into_iter()
            .map(|item| item.category)
            .collect();
        categories.sort();
        categories.dedup();
        categories
    }

    /// Items at or below `threshold`, lowest stock first
    pub fn get_low_stock(&self, threshold: u32) -> Vec<MenuItem> {
        let mut items: Vec<MenuItem> = self
            .get_all()
            .into_iter()
            .filter(|item| item.stock <= threshold)
            .collect();
        items.sort_by_key(|item| item.stock);
        items
    }

    /// Match against name, description and category
    pub fn search(&self, query: &str) -> Vec<MenuItem> {
        self.get_all()
            .into_iter()
            .filter(|item| matches_query(query, &[&item.name, &item.description, &item.category]))
            .collect()
    }

    pub fn add(&self, new: NewMenuItem) -> Result<MenuItem> {
        require("Name", &new.name)?;
        require("Category", &new.category)?;
        validate_price(new.price)?;

        let item = self.storage.transaction(|tx| {
            let mut items: Vec<MenuItem> = tx.collection(MENU_KEY);
            let now = Utc::now();

            let item = MenuItem {
                id: generate_prefixed("ITEM", |candidate| {
                    items.iter().any(|item| item.id == candidate)
                }),
                name: new.name.trim().to_string(),
                description: new.description,
                price: new.price,
                category: new.category.trim().to_string(),
                stock: new.stock,
                status: ItemStatus::for_stock(new.stock),
                image: new.image,
                popular: new.popular,
                ethiopian: new.ethiopian,
                vegetarian: new.vegetarian,
                vegan: new.vegan,
                created_at: now,
                updated_at: now,
            };

            items.push(item.clone());
            tx.put(MENU_KEY, &items)?;
            Ok(item)
        })?;

        tracing::debug!("Created menu item {} ({})", item.id, item.name);
        Ok(item)
    }

    pub fn update(&self, id: &Id, patch: MenuItemPatch) -> Result<MenuItem> {
        if let Some(name) = &patch.name {
            require("Name", name)?;
        }
        if let Some(category) = &patch.category {
            require("Category", category)?;
        }
        if let Some(price) = patch.price {
            validate_price(price)?;
        }

        self.modify(id, |item| {
            if let Some(name) = patch.name {
                item.name = name.trim().to_string();
            }
            if let Some(description) = patch.description {
                item.description = description;
            }
            if let Some(price) = patch.price {
                item.price = price;
            }
            if let Some(category) = patch.category {
                item.category = category.trim().to_string();
            }
            if let Some(stock) = patch.stock {
                item.stock = stock;
            }
            if let Some(image) = patch.image {
                item.image = Some(image);
            }
            if let Some(popular) = patch.popular {
                item.popular = popular;
            }
            if let Some(ethiopian) = patch.ethiopian {
                item.ethiopian = ethiopian;
            }
            if let Some(vegetarian) = patch.vegetarian {
                item.vegetarian = vegetarian;
            }
            if let Some(vegan) = patch.vegan {
                item.vegan = vegan;
            }
            Ok(())
        })
    }

    pub fn delete(&self, id: &Id) -> Result<()> {
        self.storage.transaction(|tx| {
            let mut items: Vec<MenuItem> = tx.collection(MENU_KEY);
            let before = items.len();
            items.retain(|item| &item.id != id);
            if items.len() == before {
                return Err(AppError::not_found("Menu item", id));
            }
            tx.put(MENU_KEY, &items)
        })?;

        tracing::debug!("Deleted menu item {}", id);
        Ok(())
    }

    pub fn set_stock(&self, id: &Id, stock: u32) -> Result<MenuItem> {
        self.modify(id, |item| {
            item.stock = stock;
            Ok(())
        })
    }

    /// Take `quantity` units; rejected without change if stock is short
    pub fn reduce_stock(&self, id: &Id, quantity: u32) -> Result<MenuItem> {
        let item = self.modify(id, |item| {
            check_stock(item, quantity)?;
            take_stock(item, quantity);
            Ok(())
        })?;

        if item.status == ItemStatus::OutOfStock {
            tracing::info!("{} is now out of stock", item.name);
        }
        Ok(item)
    }

    pub fn restock(&self, id: &Id, quantity: u32) -> Result<MenuItem> {
        self.modify(id, |item| {
            return_stock(item, quantity);
            Ok(())
        })
    }

    fn modify(&self, id: &Id, apply: impl FnOnce(&mut MenuItem) -> Result<()>) -> Result<MenuItem> {
        self.storage.transaction(|tx| {
            let mut items: Vec<MenuItem> = tx.collection(MENU_KEY);
            let item = items
                .iter_mut()
                .find(|item| &item.id == id)
                .ok_or_else(|| AppError::not_found("Menu item", id))?;

            apply(item)?;
            item.refresh_status();
            item.updated_at = Utc::now();

            let updated = item.clone();
            tx.put(MENU_KEY, &items)?;
            Ok(updated)
        })
    }
}
