//! Drive integration tests against a real account.
//!
//! Set `DRIVE_ROOT_FOLDER` plus credentials (`GOOGLE_APPLICATION_CREDENTIALS`
//! or `DRIVE_ACCESS_TOKEN`) and run with `--ignored`.

use reelstamp_drive::{BackoffPolicy, DriveClient, RemoteStore, TreeWalker, WalkEntry};

fn root_folder() -> String {
    std::env::var("DRIVE_ROOT_FOLDER").expect("DRIVE_ROOT_FOLDER must be set")
}

/// Resolve the root folder.
#[tokio::test]
#[ignore = "requires Drive credentials"]
async fn test_drive_connection() {
    dotenvy::dotenv().ok();

    let client = DriveClient::from_env().expect("Failed to create Drive client");
    let root = client
        .get_node(&root_folder())
        .await
        .expect("Failed to resolve root folder");

    assert!(root.is_folder(), "{} is not a folder", root);
    println!("Root folder: {}", root);
}

/// Walk the whole tree once and print what was found.
#[tokio::test]
#[ignore = "requires Drive credentials"]
async fn test_walk_tree() {
    dotenvy::dotenv().ok();

    let client = DriveClient::from_env().expect("Failed to create Drive client");
    let root = client
        .get_node(&root_folder())
        .await
        .expect("Failed to resolve root folder");

    let mut walker = TreeWalker::new(&client, root, BackoffPolicy::from_env());
    let mut folders = 0;
    let mut leaves = 0;

    while let Some(entry) = walker.next().await {
        match entry {
            WalkEntry::Folder(folder) => {
                folders += 1;
                println!("[folder] {}", folder);
            }
            WalkEntry::Leaf(node) => {
                leaves += 1;
                println!("  [{}] {}", node.kind, node.name);
            }
            WalkEntry::ListingFailed { folder, error } => {
                println!("[unreadable] {}: {}", folder, error);
            }
        }
    }

    assert!(folders >= 1);
    println!("{} folders, {} files", folders, leaves);
}
