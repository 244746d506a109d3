//! Pipeline driver: walk, match, fetch, transform, publish.
//!
//! Folders are processed as the walk reaches them and pairs one at a time.
//! A failing pair is recorded with its stage and the run moves on; only a
//! root folder that cannot be resolved or listed ends the run early.

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use reelstamp_drive::{with_retry, DriveError, RemoteStore, TreeWalker, WalkEntry};
use reelstamp_media::{MediaResult, OverlayTransformer, SourceContainer};
use reelstamp_models::{
    FailureStage, ListingFailure, MatchedPair, OverlaySpec, PairOutcome,
    ProcessingResult, RemoteNode, RunSummary, SkipReason,
};
use tracing::{debug, info, Instrument};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::fetcher::ContentFetcher;
use crate::logging::PairLogger;
use crate::matcher::match_folder;
use crate::publisher::{Published, ResultPublisher};

// =============================================================================
// Transform seam
// =============================================================================

/// Renders the overlay onto a local video.
#[async_trait]
pub trait Transform: Send + Sync {
    async fn transform(
        &self,
        input: &Path,
        output: &Path,
        spec: &OverlaySpec,
        container: &SourceContainer,
    ) -> MediaResult<()>;
}

#[async_trait]
impl Transform for OverlayTransformer {
    async fn transform(
        &self,
        input: &Path,
        output: &Path,
        spec: &OverlaySpec,
        container: &SourceContainer,
    ) -> MediaResult<()> {
        self.render(input, output, spec, container).await
    }
}

// =============================================================================
// Pipeline
// =============================================================================

type StageResult<T> = Result<T, (FailureStage, WorkerError)>;

fn at(stage: FailureStage) -> impl Fn(WorkerError) -> (FailureStage, WorkerError) {
    move |e| (stage, e)
}

/// One pass over a folder tree.
pub struct Pipeline<'a> {
    store: &'a dyn RemoteStore,
    transform: &'a dyn Transform,
    config: &'a PipelineConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        store: &'a dyn RemoteStore,
        transform: &'a dyn Transform,
        config: &'a PipelineConfig,
    ) -> Self {
        Self {
            store,
            transform,
            config,
        }
    }

    /// Process every pair under the root folder once.
    pub async fn run(&self) -> WorkerResult<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::new(&self.config.root_folder_id);

        tokio::fs::create_dir_all(&self.config.scratch_dir).await?;
        let root = self.resolve_root().await?;
        info!(
            root_id = %root.id,
            root = %root.name,
            "Walking folder tree"
        );

        let mut walker = TreeWalker::new(self.store, root, self.config.retry.clone());
        let mut current: Option<(RemoteNode, Vec<RemoteNode>)> = None;

        while let Some(entry) = walker.next().await {
            match entry {
                WalkEntry::Folder(folder) => {
                    if let Some((done, leaves)) = current.replace((folder, Vec::new())) {
                        self.process_folder(&done, leaves, &mut summary).await;
                    }
                }
                WalkEntry::Leaf(node) => {
                    if let Some((_, leaves)) = current.as_mut() {
                        leaves.push(node);
                    }
                }
                WalkEntry::ListingFailed { folder, error } => {
                    if folder.id == walker.root().id {
                        return Err(WorkerError::root_unavailable(format!(
                            "cannot list {}: {}",
                            folder.name, error
                        )));
                    }
                    summary.listing_failures.push(ListingFailure {
                        folder_id: folder.id,
                        folder_name: folder.name,
                        error: error.to_string(),
                    });
                }
            }
        }

        if let Some((done, leaves)) = current.take() {
            self.process_folder(&done, leaves, &mut summary).await;
        }

        summary.finish();
        histogram!("run_duration_seconds").record(started.elapsed().as_secs_f64());
        info!(
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            skipped = summary.skipped.len(),
            listing_failures = summary.listing_failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Run finished"
        );

        Ok(summary)
    }

    async fn resolve_root(&self) -> WorkerResult<RemoteNode> {
        let store = self.store;
        let root_id = self.config.root_folder_id.as_str();

        let root = with_retry(&self.config.retry, "get_node", || store.get_node(root_id))
            .await
            .map_err(|e| match e.inner() {
                DriveError::NotFound(_) => WorkerError::root_unavailable(format!(
                    "{} not found, or not shared with this account",
                    root_id
                )),
                _ => WorkerError::root_unavailable(format!("{}: {}", root_id, e)),
            })?;

        if !root.is_folder() {
            return Err(WorkerError::root_unavailable(format!(
                "{} ({}) is not a folder",
                root.name, root.id
            )));
        }
        Ok(root)
    }

    async fn process_folder(
        &self,
        folder: &RemoteNode,
        leaves: Vec<RemoteNode>,
        summary: &mut RunSummary,
    ) {
        let matched = match_folder(folder, leaves, &self.config.output_suffix);
        let output_names = matched.output_names(&self.config.output_suffix);
        debug!(
            folder = %folder.name,
            pairs = matched.pairs.len(),
            skipped = matched.skipped.len(),
            "Matched folder"
        );

        for (node, reason) in matched.skipped {
            debug!(folder = %folder.name, file = %node.name, %reason, "Skipping entry");
            summary.skip(&folder.name, node, reason);
        }

        let publisher = self.publisher();
        for (pair, output_name) in matched.pairs.into_iter().zip(output_names) {
            if self.config.skip_existing {
                match publisher.exists(&pair.folder_id, &output_name).await {
                    Ok(true) => {
                        info!(pair = %pair.label(), output = %output_name, "Output exists, skipping");
                        counter!("pairs_processed_total", "outcome" => "skipped").increment(1);
                        summary.skip(&folder.name, pair.video, SkipReason::AlreadyProcessed);
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        PairLogger::new(&pair).log_warning(&format!(
                            "could not check for {}, processing anyway: {}",
                            output_name, e
                        ));
                    }
                }
            }

            let result = self.process_pair(pair, output_name).await;
            let outcome = if result.is_success() { "succeeded" } else { "failed" };
            counter!("pairs_processed_total", "outcome" => outcome).increment(1);
            histogram!("pair_duration_seconds").record(result.elapsed_ms as f64 / 1000.0);
            summary.record(result);
        }
    }

    async fn process_pair(&self, pair: MatchedPair, output_name: String) -> ProcessingResult {
        let logger = PairLogger::new(&pair);
        let span = logger.create_span();
        let started = Instant::now();

        let outcome = async {
            logger.log_start(&format!("{} -> {}", pair, output_name));

            match self.execute(&pair, &output_name, &logger).await {
                Ok(published) => {
                    logger.log_completion(&format!(
                        "{} ({})",
                        output_name,
                        if published.replaced { "replaced" } else { "created" }
                    ));
                    PairOutcome::Succeeded {
                        output_name,
                        remote_file_id: published.file_id,
                        local_mirror: published.local_mirror,
                    }
                }
                Err((stage, e)) => {
                    logger.log_error(&format!("{} failed: {}", stage, e));
                    PairOutcome::Failed {
                        stage,
                        reason: e.to_string(),
                    }
                }
            }
        }
        .instrument(span)
        .await;

        ProcessingResult {
            pair,
            outcome,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Run one pair in its own scratch directory, removed on return.
    async fn execute(
        &self,
        pair: &MatchedPair,
        output_name: &str,
        logger: &PairLogger,
    ) -> StageResult<Published> {
        let scratch = tempfile::Builder::new()
            .prefix("pair-")
            .tempdir_in(&self.config.scratch_dir)
            .map_err(|e| (FailureStage::FetchVideo, WorkerError::from(e)))?;

        let fetcher = ContentFetcher::new(self.store, &self.config.retry);
        let input = fetcher
            .fetch_video(&pair.video, scratch.path())
            .await
            .map_err(at(FailureStage::FetchVideo))?;
        let prompt = fetcher
            .fetch_prompt(&pair.prompt)
            .await
            .map_err(at(FailureStage::FetchPrompt))?;
        logger.log_progress("fetched video and prompt");

        let spec = pair.overlay_spec(prompt);
        let output = scratch.path().join(output_name);
        let container = SourceContainer::detect(&input, Some(&pair.video.mime_type));
        self.transform
            .transform(&input, &output, &spec, &container)
            .await
            .map_err(|e| (FailureStage::Transform, WorkerError::from(e)))?;
        logger.log_progress("rendered overlay");

        self.publisher()
            .publish(&pair.folder_id, &pair.folder_name, output_name, &output)
            .await
            .map_err(at(FailureStage::Publish))
    }

    fn publisher(&self) -> ResultPublisher<'a> {
        ResultPublisher::new(
            self.store,
            &self.config.retry,
            self.config.mirror_dir.as_deref(),
        )
    }
}
