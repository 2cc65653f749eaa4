// src/notify/mod.rs
pub mod log;
pub mod telegram;

use crate::model::{Category, Item};
use crate::subscribers::SubscriberId;

/// A rendered message, ready for a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub text: String,
    /// Text uses Markdown (backtick code spans).
    pub markdown: bool,
}

impl Payload {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: false,
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    DeliveryFailed(String),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

/// Delivers payloads to a subscriber endpoint (e.g. a chat).
#[async_trait::async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, subscriber: SubscriberId, payload: &Payload) -> DeliveryOutcome;
}

fn fmt_opt_num(v: Option<f64>) -> String {
    match v {
        Some(n) if n.fract() == 0.0 => format!("{n:.0}"),
        Some(n) => format!("{n}"),
        None => "n/a".to_string(),
    }
}

/// Aligned attribute lines in code spans, then the item link.
pub fn format_item(item: &Item) -> Payload {
    let mut rows: Vec<(&str, String)> = vec![
        ("Price", fmt_opt_num(item.price)),
        (
            "Location",
            item.location.clone().unwrap_or_else(|| "n/a".to_string()),
        ),
        ("Size", fmt_opt_num(item.size_sqm)),
    ];
    if item.category == Category::Flat {
        rows.push((
            "Rooms",
            item.room_count
                .map(|r| r.to_string())
                .unwrap_or_else(|| "n/a".to_string()),
        ));
    }

    let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    let body = rows
        .iter()
        .map(|(k, v)| format!("`{k:<width$}  {v}`"))
        .collect::<Vec<_>>()
        .join("\n");

    Payload::markdown(format!("{body}\n\n{}", item.url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Discovered, ItemAttributes};
    use chrono::Utc;

    fn item(category: Category) -> Item {
        Item::from_attributes(
            Discovered {
                source_id: "s".into(),
                url: "https://ads.test/o/1".into(),
            },
            ItemAttributes {
                price: Some(2400.0),
                location: Some("Wola".into()),
                size_sqm: Some(38.5),
                ..ItemAttributes::bare(category)
            },
            Utc::now(),
        )
    }

    #[test]
    fn flat_payload_lists_rooms_and_link() {
        let p = format_item(&item(Category::Flat));
        assert!(p.markdown);
        assert_eq!(
            p.text,
            "`Price     2400`\n`Location  Wola`\n`Size      38.5`\n`Rooms     n/a`\n\nhttps://ads.test/o/1"
        );
    }

    #[test]
    fn room_payload_has_no_rooms_line() {
        let p = format_item(&item(Category::Room));
        assert!(!p.text.contains("Rooms"));
        assert!(p.text.ends_with("https://ads.test/o/1"));
    }
}
