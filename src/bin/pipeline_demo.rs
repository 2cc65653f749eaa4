//! Demo that runs the whole pipeline against a scripted in-memory source
//! (stdout/log only, nothing leaves the process).

use std::sync::Arc;
use std::time::Duration;

use listing_sentinel::archive::MemoryArchive;
use listing_sentinel::extract::fixture::StaticExtractor;
use listing_sentinel::extract::SourceExtractors;
use listing_sentinel::ledger::MemoryLedger;
use listing_sentinel::notify::log::LogChannel;
use listing_sentinel::subscribers::store::MemoryStore;
use listing_sentinel::subscribers::RangeAttr;
use listing_sentinel::{
    Category, ItemAttributes, PipelineParts, PipelineSettings, Source, Supervisor,
};

fn flat(price: f64, location: &str, rooms: u32) -> ItemAttributes {
    ItemAttributes {
        price: Some(price),
        location: Some(location.into()),
        size_sqm: Some(48.0),
        room_count: Some(rooms),
        ..ItemAttributes::bare(Category::Flat)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let source = Source::new("demo", "https://listings.example/flats");
    let ex = StaticExtractor::new("static");
    ex.push_index("demo", ["https://listings.example/a", "https://listings.example/b"])
        .push_index(
            "demo",
            [
                "https://listings.example/a",
                "https://listings.example/b",
                "https://listings.example/c",
                "https://listings.example/d",
            ],
        );
    ex.put_item("https://listings.example/c", flat(2400.0, "Mokotów", 2))
        .put_item("https://listings.example/d", flat(4100.0, "Wola", 3));

    let store = MemoryStore::new();
    store.edit(1, |cfg| {
        cfg.set_online(true);
        cfg.set_range(RangeAttr::Price, None, Some(3000.0));
    });

    let supervisor = Supervisor::start(PipelineParts {
        extractors: SourceExtractors::uniform([&source.id], Arc::new(ex)),
        sources: vec![source],
        ledger: Arc::new(MemoryLedger::new()),
        archive: Arc::new(MemoryArchive::new()),
        store: Arc::new(store),
        channel: Arc::new(LogChannel),
        maintenance_subscriber: None,
        settings: PipelineSettings {
            poll_interval_secs: 1,
            ..PipelineSettings::default()
        },
    })?;

    tokio::time::sleep(Duration::from_millis(2500)).await;
    let status = supervisor.shutdown(Duration::from_millis(500)).await;
    for (unit, state) in status {
        println!("{unit}: {state}");
    }
    println!("pipeline-demo done");
    Ok(())
}
