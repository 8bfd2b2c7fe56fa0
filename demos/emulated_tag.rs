//! Emulated Tag - full session against an in-memory tag.
//!
//! This example demonstrates:
//! - Starting a dispatcher once the radio reports enabled
//! - Delivering a tag the way a platform discovery callback would
//! - Printing the per-operation log lines and the JSON report
//!
//! # Running
//!
//! ```text
//! RUST_LOG=debug cargo run --example emulated_tag
//! ```

use ulc_session::dispatch::DispatcherBuilder;
use ulc_session::transport::EmulatedTag;
use ulc_session::TagDispatcher;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut dispatcher: TagDispatcher<EmulatedTag> =
        DispatcherBuilder::new().start(|| true).await?;

    // Lock a probe page so the report shows a failed write next to the key-page NAKs
    let mut tag = EmulatedTag::new([0x04, 0x9C, 0x21, 0x6A, 0x11, 0x2B, 0x80]);
    tag.lock_page(20);
    dispatcher.notifier().tag_discovered(tag.into_handle()).await?;

    if let Some(report) = dispatcher.next_report().await {
        println!("{}", report);
        for change in report.changed_pages() {
            println!(
                "page {} changed: {} -> {}",
                change.index,
                hex::encode(change.before),
                hex::encode(change.after)
            );
        }
        println!("{}", report.to_json_pretty()?);
    }

    dispatcher.shutdown().await?;
    Ok(())
}
