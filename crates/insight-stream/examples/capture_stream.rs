use std::sync::Arc;

use insight_stream::http::HttpTransport;
use insight_stream::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "note.m4a".to_string());

    let client = InsightClient::builder()
        .transport(Arc::new(HttpTransport::from_env()?))
        .build()?;

    let observer = Arc::new(SnapshotObserver::new());
    let handle = client.process(AudioAsset::from_path(path), observer.clone())?;

    match handle.finish().await {
        Ok(SessionOutcome::Insight(summary)) => {
            println!(
                "insight card ready for session {} in {}ms",
                summary.session_id, summary.processing_time_ms
            );
        }
        Ok(SessionOutcome::Recall(payload)) => {
            println!("recall results: {payload}");
        }
        Err(error) => eprintln!("processing failed: {error}"),
    }

    // Give the paced deliveries and settle callback time to land.
    tokio::time::sleep(std::time::Duration::from_secs(4)).await;
    println!("{:#?}", observer.snapshot());
    Ok(())
}
