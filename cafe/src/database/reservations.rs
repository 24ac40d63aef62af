//! Reservations collection
//!
//! A slot is a (date, time) pair holding at most `capacity` non-cancelled
//! reservations. The capacity check and the write share one transaction.

use super::ids::{generate_prefixed, Id};
use super::models::{
    NewReservation, Reservation, ReservationPatch, ReservationStatus, SlotAvailability,
};
use crate::config::{MAX_PARTY_SIZE, RESERVATIONS_KEY};
use crate::error::{AppError, Result};
use crate::storage::Storage;
use crate::validation::matches_query;
use chrono::{NaiveDate, NaiveTime, Utc};

#[derive(Clone)]
pub struct ReservationsRepo {
    storage: Storage,
    capacity: usize,
}

fn validate_guests(guests: u32) -> Result<()> {
    if guests == 0 || guests > MAX_PARTY_SIZE {
        return Err(AppError::validation(format!(
            "Party size must be between 1 and {}",
            MAX_PARTY_SIZE
        )));
    }
    Ok(())
}

fn validate_date(date: NaiveDate) -> Result<()> {
    if date < Utc::now().date_naive() {
        return Err(AppError::validation("Reservation date cannot be in the past"));
    }
    Ok(())
}

fn validate_duration(duration: u32) -> Result<()> {
    if duration == 0 {
        return Err(AppError::validation("Duration must be at least one minute"));
    }
    Ok(())
}

/// Non-cancelled reservations in the slot, ignoring `except`
fn booked_in_slot(
    reservations: &[Reservation],
    date: NaiveDate,
    time: NaiveTime,
    except: Option<&Id>,
) -> usize {
    reservations
        .iter()
        .filter(|r| r.holds_slot() && r.in_slot(date, time))
        .filter(|r| Some(&r.id) != except)
        .count()
}

fn by_slot(mut reservations: Vec<Reservation>) -> Vec<Reservation> {
    reservations.sort_by(|a, b| (a.date, a.time).cmp(&(b.date, b.time)));
    reservations
}

impl ReservationsRepo {
    pub fn new(storage: Storage, capacity: usize) -> Self {
        Self { storage, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get_all(&self) -> Vec<Reservation> {
        self.storage.read_collection(RESERVATIONS_KEY)
    }

    pub fn get_by_id(&self, id: &Id) -> Option<Reservation> {
        self.get_all().into_iter().find(|r| &r.id == id)
    }

    pub fn get_by_customer(&self, customer_id: &Id) -> Vec<Reservation> {
        by_slot(
            self.get_all()
                .into_iter()
                .filter(|r| &r.customer_id == customer_id)
                .collect(),
        )
    }

    pub fn get_by_date(&self, date: NaiveDate) -> Vec<Reservation> {
        by_slot(
            self.get_all()
                .into_iter()
                .filter(|r| r.date == date)
                .collect(),
        )
    }

    pub fn get_by_status(&self, status: ReservationStatus) -> Vec<Reservation> {
        self.get_all()
            .into_iter()
            .filter(|r| r.status == status)
            .collect()
    }

    /// Non-cancelled, non-completed reservations from today on, soonest first
    pub fn get_upcoming(&self) -> Vec<Reservation> {
        let today = Utc::now().date_naive();
        by_slot(
            self.get_all()
                .into_iter()
                .filter(|r| {
                    r.date >= today
                        && matches!(
                            r.status,
                            ReservationStatus::Pending | ReservationStatus::Confirmed
                        )
                })
                .collect(),
        )
    }

    /// Match against id, customer id and special requests
    pub fn search(&self, query: &str) -> Vec<Reservation> {
        self.get_all()
            .into_iter()
            .filter(|r| {
                matches_query(
                    query,
                    &[
                        r.id.as_str(),
                        r.customer_id.as_str(),
                        r.special_requests.as_deref().unwrap_or_default(),
                    ],
                )
            })
            .collect()
    }

    pub fn check_availability(&self, date: NaiveDate, time: NaiveTime) -> SlotAvailability {
        let booked = booked_in_slot(&self.get_all(), date, time, None);
        self.slot(date, time, booked)
    }

    fn slot(&self, date: NaiveDate, time: NaiveTime, booked: usize) -> SlotAvailability {
        let remaining = self.capacity.saturating_sub(booked);
        SlotAvailability {
            date,
            time,
            capacity: self.capacity,
            booked,
            remaining,
            available: remaining > 0,
        }
    }

    pub fn add(&self, new: NewReservation) -> Result<Reservation> {
        validate_guests(new.guests)?;
        validate_date(new.date)?;
        let duration = new
            .duration
            .unwrap_or(crate::config::DEFAULT_RESERVATION_DURATION_MIN);
        validate_duration(duration)?;

        let result = self.storage.transaction(|tx| {
            let mut reservations: Vec<Reservation> = tx.collection(RESERVATIONS_KEY);

            if booked_in_slot(&reservations, new.date, new.time, None) >= self.capacity {
                return Err(fully_booked(new.date, new.time));
            }

            let now = Utc::now();
            let reservation = Reservation {
                id: generate_prefixed("RES", |candidate| {
                    reservations.iter().any(|r| r.id == candidate)
                }),
                customer_id: new.customer_id.clone(),
                guests: new.guests,
                date: new.date,
                time: new.time,
                duration,
                status: ReservationStatus::Pending,
                special_requests: new.special_requests.clone(),
                created_at: now,
                updated_at: now,
            };

            reservations.push(reservation.clone());
            tx.put(RESERVATIONS_KEY, &reservations)?;
            Ok(reservation)
        });

        match &result {
            Ok(r) => tracing::info!(
                "Booked reservation {} for {} guests on {} at {}",
                r.id,
                r.guests,
                r.date,
                r.time.format("%H:%M")
            ),
            Err(e) => tracing::warn!("Reservation rejected: {}", e),
        }
        result
    }

    /// Patch a reservation. Moving it, or reviving a cancelled one,
    /// rechecks the target slot.
    pub fn update(&self, id: &Id, patch: ReservationPatch) -> Result<Reservation> {
        if let Some(guests) = patch.guests {
            validate_guests(guests)?;
        }
        if let Some(date) = patch.date {
            validate_date(date)?;
        }
        if let Some(duration) = patch.duration {
            validate_duration(duration)?;
        }

        self.storage.transaction(|tx| {
            let mut reservations: Vec<Reservation> = tx.collection(RESERVATIONS_KEY);
            let index = reservations
                .iter()
                .position(|r| &r.id == id)
                .ok_or_else(|| AppError::not_found("Reservation", id))?;

            let current = &reservations[index];
            let date = patch.date.unwrap_or(current.date);
            let time = patch.time.unwrap_or(current.time);
            let status = patch.status.unwrap_or(current.status);
            let needs_slot = status != ReservationStatus::Cancelled
                && (!current.holds_slot() || !current.in_slot(date, time));

            if needs_slot && booked_in_slot(&reservations, date, time, Some(id)) >= self.capacity {
                return Err(fully_booked(date, time));
            }

            let reservation = &mut reservations[index];
            reservation.date = date;
            reservation.time = time;
            reservation.status = status;
            if let Some(guests) = patch.guests {
                reservation.guests = guests;
            }
            if let Some(duration) = patch.duration {
                reservation.duration = duration;
            }
            if let Some(requests) = patch.special_requests {
                reservation.special_requests = Some(requests);
            }
            reservation.updated_at = Utc::now();

            let updated = reservation.clone();
            tx.put(RESERVATIONS_KEY, &reservations)?;
            Ok(updated)
        })
    }

    pub fn update_status(&self, id: &Id, status: ReservationStatus) -> Result<Reservation> {
        let reservation = self.update(
            id,
            ReservationPatch {
                status: Some(status),
                ..Default::default()
            },
        )?;
        tracing::info!("Reservation {} is now {:?}", reservation.id, reservation.status);
        Ok(reservation)
    }

    /// Cancelling an already cancelled reservation succeeds without writing
    pub fn cancel(&self, id: &Id) -> Result<Reservation> {
        if let Some(existing) = self.get_by_id(id) {
            if existing.status == ReservationStatus::Cancelled {
                return Ok(existing);
            }
        }
        self.update_status(id, ReservationStatus::Cancelled)
    }

    pub fn delete(&self, id: &Id) -> Result<()> {
        self.storage.transaction(|tx| {
            let mut reservations: Vec<Reservation> = tx.collection(RESERVATIONS_KEY);
            let before = reservations.len();
            reservations.retain(|r| &r.id != id);
            if reservations.len() == before {
                return Err(AppError::not_found("Reservation", id));
            }
            tx.put(RESERVATIONS_KEY, &reservations)
        })?;

        tracing::debug!("Deleted reservation {}", id);
        Ok(())
    }
}

fn fully_booked(date: NaiveDate, time: NaiveTime) -> AppError {
    AppError::FullyBooked {
        date: date.to_string(),
        time: time.format("%H:%M").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_repo(capacity: usize) -> ReservationsRepo {
        ReservationsRepo::new(Storage::in_memory(), capacity)
    }

    fn days_ahead(days: i64) -> NaiveDate {
        Utc::now().date_naive() + Duration::days(days)
    }

    fn seven_pm() -> NaiveTime {
        NaiveTime::from_hms_opt(19, 0, 0).unwrap()
    }

    fn booking(customer: u64, date: NaiveDate) -> NewReservation {
        NewReservation {
            customer_id: Id::from(customer),
            guests: 2,
            date,
            time: seven_pm(),
            duration: None,
            special_requests: None,
        }
    }

    #[test]
    fn test_add_then_get_by_id() {
        let repo = create_test_repo(10);
        let reservation = repo.add(booking(2, days_ahead(3))).unwrap();

        assert!(reservation.id.as_str().starts_with("RES"));
        assert_eq!(reservation.status, ReservationStatus::Pending);
        assert_eq!(reservation.duration, 120);
        assert_eq!(repo.get_by_id(&reservation.id).unwrap(), reservation);
    }

    #[test]
    fn test_slot_capacity() {
        let repo = create_test_repo(10);
        let date = days_ahead(5);

        for customer in 0..9 {
            repo.add(booking(customer, date)).unwrap();
        }
        assert_eq!(repo.check_availability(date, seven_pm()).remaining, 1);

        repo.add(booking(9, date)).unwrap();
        let slot = repo.check_availability(date, seven_pm());
        assert_eq!(slot.booked, 10);
        assert_eq!(slot.remaining, 0);
        assert!(!slot.available);

        let result = repo.add(booking(10, date));
        assert!(matches!(result, Err(AppError::FullyBooked { .. })));
        assert_eq!(repo.get_by_date(date).len(), 10);
    }

    #[test]
    fn test_cancelled_reservations_free_the_slot() {
        let repo = create_test_repo(1);
        let date = days_ahead(2);

        let first = repo.add(booking(1, date)).unwrap();
        assert!(repo.add(booking(2, date)).is_err());

        repo.cancel(&first.id).unwrap();
        repo.add(booking(2, date)).unwrap();

        // Reviving the cancelled one no longer fits
        let revived = repo.update_status(&first.id, ReservationStatus::Confirmed);
        assert!(matches!(revived, Err(AppError::FullyBooked { .. })));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let repo = create_test_repo(10);
        let reservation = repo.add(booking(1, days_ahead(1))).unwrap();

        let first = repo.cancel(&reservation.id).unwrap();
        let second = repo.cancel(&reservation.id).unwrap();

        assert_eq!(first.status, ReservationStatus::Cancelled);
        assert_eq!(first, second);
    }

    #[test]
    fn test_validation() {
        let repo = create_test_repo(10);

        let mut too_many = booking(1, days_ahead(1));
        too_many.guests = MAX_PARTY_SIZE + 1;
        assert!(matches!(repo.add(too_many), Err(AppError::Validation(_))));

        let mut nobody = booking(1, days_ahead(1));
        nobody.guests = 0;
        assert!(repo.add(nobody).is_err());

        assert!(repo.add(booking(1, days_ahead(-1))).is_err());
        assert!(repo.get_all().is_empty());
    }

    #[test]
    fn test_move_to_full_slot_rejected() {
        let repo = create_test_repo(1);
        let first = repo.add(booking(1, days_ahead(1))).unwrap();
        let second = repo.add(booking(2, days_ahead(2))).unwrap();

        let moved = repo.update(
            &second.id,
            ReservationPatch {
                date: Some(first.date),
                ..Default::default()
            },
        );
        assert!(matches!(moved, Err(AppError::FullyBooked { .. })));

        // Staying in its own slot is fine
        let updated = repo
            .update(
                &second.id,
                ReservationPatch {
                    guests: Some(6),
                    special_requests: Some("Window seat".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.guests, 6);
        assert_eq!(repo.search("window").len(), 1);
    }

    #[test]
    fn test_upcoming_and_customer_queries() {
        let repo = create_test_repo(10);
        let later = repo.add(booking(1, days_ahead(4))).unwrap();
        let sooner = repo.add(booking(1, days_ahead(1))).unwrap();
        let cancelled = repo.add(booking(2, days_ahead(2))).unwrap();
        repo.cancel(&cancelled.id).unwrap();

        let upcoming = repo.get_upcoming();
        assert_eq!(upcoming.len(), 2);
        assert_eq!(upcoming[0].id, sooner.id);
        assert_eq!(upcoming[1].id, later.id);

        assert_eq!(repo.get_by_customer(&Id::from(1)).len(), 2);
        assert_eq!(repo.get_by_status(ReservationStatus::Cancelled).len(), 1);

        repo.delete(&later.id).unwrap();
        assert!(repo.get_by_id(&later.id).is_none());
    }
}
