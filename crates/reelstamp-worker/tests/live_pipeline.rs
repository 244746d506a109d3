//! End-to-end run against a real Drive folder.
//!
//! Renders every pair under `DRIVE_ROOT_FOLDER` with the local FFmpeg and
//! publishes the results, so point it at a scratch folder and leave
//! `SKIP_EXISTING` and `WATCH_INTERVAL_SECS` unset.

use reelstamp_drive::DriveClient;
use reelstamp_worker::{Pipeline, PipelineConfig};

#[tokio::test]
#[ignore = "requires Drive credentials and ffmpeg"]
async fn test_full_run_is_repeatable() {
    dotenvy::dotenv().ok();

    let config = PipelineConfig::from_env(None).expect("Invalid configuration");
    let client = DriveClient::from_env().expect("Failed to create Drive client");
    let transformer = config.transformer();
    let pipeline = Pipeline::new(&client, &transformer, &config);

    let first = pipeline.run().await.expect("First run failed");
    println!("{}", first.render());

    let second = pipeline.run().await.expect("Second run failed");
    println!("{}", second.render());

    // Outputs are replaced in place, never duplicated
    assert_eq!(first.succeeded.len(), second.succeeded.len());
    for (a, b) in first.succeeded.iter().zip(&second.succeeded) {
        assert_eq!(a.outcome, b.outcome);
    }
}
