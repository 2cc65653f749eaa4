// src/dispatch/filter.rs
//! Subscriber filter evaluation. Every configured check must pass; the first
//! failing one is reported.

use crate::model::{Category, Item};
use crate::subscribers::{Range, RangeAttr, SubscriberConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reject {
    Price,
    Size,
    Rooms,
    Category,
    Location,
}

/// Absent values never satisfy a configured range.
fn check_range(range: &Range, value: Option<f64>) -> bool {
    if !range.is_configured() {
        return true;
    }
    value.is_some_and(|v| range.contains(v))
}

/// Does `item` pass all of `cfg`'s filters? Ignores the online flag.
pub fn evaluate(item: &Item, cfg: &SubscriberConfig) -> Result<(), Reject> {
    let f = &cfg.filters;

    if !check_range(cfg.range(RangeAttr::Price), item.price) {
        return Err(Reject::Price);
    }
    if !check_range(cfg.range(RangeAttr::Size), item.size_sqm) {
        return Err(Reject::Size);
    }
    if !f.locations.is_empty()
        && !item
            .location
            .as_ref()
            .is_some_and(|l| f.locations.contains(l))
    {
        return Err(Reject::Location);
    }
    if f.category.is_some_and(|mode| mode != item.category) {
        return Err(Reject::Category);
    }
    // room offers carry no comparable room count
    if item.category == Category::Flat
        && !check_range(cfg.range(RangeAttr::Rooms), item.room_count.map(f64::from))
    {
        return Err(Reject::Rooms);
    }
    Ok(())
}

pub fn matches(item: &Item, cfg: &SubscriberConfig) -> bool {
    evaluate(item, cfg).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Discovered, ItemAttributes};
    use chrono::Utc;

    fn item(attrs: ItemAttributes) -> Item {
        Item::from_attributes(
            Discovered {
                source_id: "s".into(),
                url: "https://ads.test/1".into(),
            },
            attrs,
            Utc::now(),
        )
    }

    fn flat() -> ItemAttributes {
        ItemAttributes {
            price: Some(800.0),
            location: Some("Wola".into()),
            size_sqm: Some(40.0),
            room_count: Some(2),
            ..ItemAttributes::bare(Category::Flat)
        }
    }

    #[test]
    fn default_config_accepts_everything() {
        let cfg = SubscriberConfig::default();
        assert!(matches(&item(flat()), &cfg));
        assert!(matches(&item(ItemAttributes::bare(Category::Room)), &cfg));
    }

    #[test]
    fn price_above_range_is_rejected() {
        let mut cfg = SubscriberConfig::default();
        cfg.set_range(RangeAttr::Price, Some(500.0), Some(1000.0));
        let it = item(ItemAttributes {
            price: Some(1200.0),
            ..flat()
        });
        assert_eq!(evaluate(&it, &cfg), Err(Reject::Price));
    }

    #[test]
    fn category_mode_rejects_other_category_regardless_of_rest() {
        let mut cfg = SubscriberConfig::default();
        cfg.set_category_mode(Some(Category::Room));
        assert_eq!(evaluate(&item(flat()), &cfg), Err(Reject::Category));
    }

    #[test]
    fn absent_attribute_never_matches_configured_range() {
        let mut cfg = SubscriberConfig::default();
        cfg.set_range(RangeAttr::Size, None, Some(100.0));
        let it = item(ItemAttributes {
            size_sqm: None,
            ..flat()
        });
        assert_eq!(evaluate(&it, &cfg), Err(Reject::Size));

        let mut cfg = SubscriberConfig::default();
        cfg.set_range(RangeAttr::Rooms, Some(1.0), Some(3.0));
        let it = item(ItemAttributes {
            room_count: None,
            ..flat()
        });
        assert_eq!(evaluate(&it, &cfg), Err(Reject::Rooms));
    }

    #[test]
    fn room_count_is_ignored_for_rooms() {
        let mut cfg = SubscriberConfig::default();
        cfg.set_range(RangeAttr::Rooms, Some(3.0), Some(4.0));
        assert!(matches(&item(ItemAttributes::bare(Category::Room)), &cfg));
    }

    #[test]
    fn location_set_requires_membership() {
        let mut cfg = SubscriberConfig::default();
        cfg.add_locations(["Mokotów"]);
        assert_eq!(evaluate(&item(flat()), &cfg), Err(Reject::Location));
        let it = item(ItemAttributes {
            location: None,
            ..flat()
        });
        assert_eq!(evaluate(&it, &cfg), Err(Reject::Location));
        cfg.add_locations(["Wola"]);
        assert!(matches(&item(flat()), &cfg));
    }
}
