//! subscribers: per-subscriber settings and the store they live in.
//!
//! A subscriber is a chat that receives offers. Its config decides whether it
//! gets notifications at all (`online`), who may change it (`admins`), and which
//! offers it is interested in (`filters`).

pub mod store;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::Category;

pub type SubscriberId = i64;
pub type UserId = i64;

/// Inclusive numeric bounds; a missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Range {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Range {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn between(min: f64, max: f64) -> Self {
        Self::new(Some(min), Some(max))
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// A range with at least one bound set.
    pub fn is_configured(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    pub fn contains(&self, v: f64) -> bool {
        self.min.map_or(true, |min| v >= min) && self.max.map_or(true, |max| v <= max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeAttr {
    Price,
    Size,
    Rooms,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Filters {
    pub price: Range,
    pub size: Range,
    pub rooms: Range,
    pub locations: BTreeSet<String>,
    /// `None` accepts both rooms and flats.
    pub category: Option<Category>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriberConfig {
    pub online: bool,
    pub admins: BTreeSet<UserId>,
    pub filters: Filters,
}

impl SubscriberConfig {
    pub fn range(&self, attr: RangeAttr) -> &Range {
        match attr {
            RangeAttr::Price => &self.filters.price,
            RangeAttr::Size => &self.filters.size,
            RangeAttr::Rooms => &self.filters.rooms,
        }
    }

    fn range_mut(&mut self, attr: RangeAttr) -> &mut Range {
        match attr {
            RangeAttr::Price => &mut self.filters.price,
            RangeAttr::Size => &mut self.filters.size,
            RangeAttr::Rooms => &mut self.filters.rooms,
        }
    }

    /// Set both bounds; swapped bounds are put back in order.
    pub fn set_range(&mut self, attr: RangeAttr, min: Option<f64>, max: Option<f64>) {
        let (min, max) = match (min, max) {
            (Some(a), Some(b)) if a > b => (Some(b), Some(a)),
            other => other,
        };
        *self.range_mut(attr) = Range::new(min, max);
    }

    pub fn reset_range(&mut self, attr: RangeAttr) {
        *self.range_mut(attr) = Range::unbounded();
    }

    pub fn add_locations<I, S>(&mut self, locs: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for l in locs {
            let l = l.as_ref().trim();
            if !l.is_empty() {
                self.filters.locations.insert(l.to_string());
            }
        }
    }

    /// Returns how many locations were actually removed.
    pub fn remove_locations<I, S>(&mut self, locs: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        locs.into_iter()
            .filter(|l| self.filters.locations.remove(l.as_ref().trim()))
            .count()
    }

    pub fn set_category_mode(&mut self, mode: Option<Category>) {
        self.filters.category = mode;
    }

    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    /// `false` when `user` already was an admin.
    pub fn add_admin(&mut self, user: UserId) -> bool {
        self.admins.insert(user)
    }

    /// `false` when `user` was not an admin.
    pub fn remove_admin(&mut self, user: UserId) -> bool {
        self.admins.remove(&user)
    }

    pub fn is_admin(&self, user: UserId) -> bool {
        self.admins.contains(&user)
    }
}
