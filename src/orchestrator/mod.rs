//! Review pipeline: normalize, filter, plan, then review and publish each
//! chunk in parallel.
//!
//! Every per-unit failure becomes a [`SkipNote`] in the returned
//! [`RunReport`]. Only an invalid credential aborts the run. Cancellation
//! stops chunks that have not finished their model call; chunks that did
//! finish are still published, and the summary comment is always posted.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::anchor::{self, AnchoredFinding};
use crate::cancel::CancelToken;
use crate::config::ReviewConfig;
use crate::diff::{self, FileFilter, FilterError, ReviewChunk};
use crate::models::{Finding, RunReport, Severity, SkipNote, SkipReason, Subject};
use crate::prompt::{PromptBuilder, ReviewRequest};
use crate::providers::{BackendError, ReviewClient};
use crate::publish::{self, ChangeRequestApi, CommentPublisher, PublishOutcome};
use crate::response;

/// Errors that abort a run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error(transparent)]
    Filter(#[from] FilterError),
}

#[derive(Debug, PartialEq, Eq)]
enum ChunkStatus {
    Reviewed,
    Failed,
    Cancelled,
    InvalidCredential(String),
}

/// What one chunk task produced.
#[derive(Debug)]
struct ChunkOutcome {
    index: usize,
    files: Vec<String>,
    status: ChunkStatus,
    findings_parsed: usize,
    findings_anchored: usize,
    posted: usize,
    posted_by_severity: BTreeMap<Severity, usize>,
    duplicate: usize,
    notes: Vec<SkipNote>,
}

impl ChunkOutcome {
    fn new(chunk: &ReviewChunk) -> Self {
        Self {
            index: chunk.index,
            files: chunk.files(),
            status: ChunkStatus::Failed,
            findings_parsed: 0,
            findings_anchored: 0,
            posted: 0,
            posted_by_severity: BTreeMap::new(),
            duplicate: 0,
            notes: Vec::new(),
        }
    }

    fn cancelled(mut self, chunk: &ReviewChunk) -> Self {
        self.status = ChunkStatus::Cancelled;
        self.notes
            .push(SkipNote::new(chunk.subject(), SkipReason::Cancelled));
        self
    }
}

/// Wires the review stages together for one run.
pub struct ReviewPipeline {
    client: ReviewClient,
    publisher: Arc<CommentPublisher>,
    filter: FileFilter,
    prompts: PromptBuilder,
    settings: ReviewConfig,
}

impl ReviewPipeline {
    pub fn new(
        client: ReviewClient,
        api: Arc<dyn ChangeRequestApi>,
        settings: &ReviewConfig,
    ) -> Result<Self, PipelineError> {
        let filter = FileFilter::new(
            &settings.exclude,
            &settings.include,
            settings.max_lines_per_hunk,
        )?;
        Ok(Self {
            client,
            publisher: Arc::new(CommentPublisher::new(api)),
            filter,
            prompts: PromptBuilder::new(settings.max_lines_per_chunk, settings.language.clone()),
            settings: settings.clone(),
        })
    }

    /// Review `raw_diff` and publish the results.
    pub async fn run(&self, raw_diff: &str, cancel: &CancelToken) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::default();

        let normalized = diff::normalize(raw_diff);
        report.extend(normalized.failures);
        let parsed_files = normalized.files.len();

        let files = self.filter.apply(normalized.files, &mut report);
        let chunks = diff::plan_chunks(
            files,
            self.settings.max_lines_per_chunk,
            self.settings.max_files,
            &mut report,
        );
        report.chunks_planned = chunks.len();
        tracing::info!(
            files = parsed_files,
            chunks = chunks.len(),
            mode = %self.settings.mode,
            model = self.client.model(),
            "planned review"
        );

        if let Err(err) = self.publisher.seed().await {
            tracing::warn!(error = %err, "could not list existing comments; duplicates may be posted");
            report.record(SkipNote::new(
                Subject::Run,
                SkipReason::PublishFailed(format!("could not list existing comments: {err}")),
            ));
        }

        let mut outcomes = self.review_chunks(chunks, cancel).await?;
        outcomes.sort_by_key(|o| o.index);

        let mut reviewed_files = BTreeSet::new();
        for outcome in outcomes {
            if outcome.status == ChunkStatus::Reviewed {
                report.chunks_reviewed += 1;
                reviewed_files.extend(outcome.files);
            }
            report.findings_parsed += outcome.findings_parsed;
            report.findings_anchored += outcome.findings_anchored;
            report.comments_posted += outcome.posted;
            for (severity, count) in outcome.posted_by_severity {
                *report.comments_by_severity.entry(severity).or_default() += count;
            }
            report.comments_duplicate += outcome.duplicate;
            report.extend(outcome.notes);
        }
        report.files_reviewed = reviewed_files.len();
        report.cancelled = cancel.is_cancelled();

        tracing::info!(
            chunks_reviewed = report.chunks_reviewed,
            chunks_planned = report.chunks_planned,
            posted = report.comments_posted,
            duplicates = report.comments_duplicate,
            skipped = report.notes.len(),
            cancelled = report.cancelled,
            "review finished"
        );

        let summary = publish::render_summary(&report, self.settings.mode, self.client.model());
        if let Err(err) = self.publisher.publish_summary(&summary).await {
            tracing::warn!(error = %err, "failed to post summary comment");
            report.record(SkipNote::new(
                Subject::Run,
                SkipReason::PublishFailed(format!("summary comment: {err}")),
            ));
        }

        Ok(report)
    }

    /// Run one task per chunk, at most `max_concurrent` at a time.
    async fn review_chunks(
        &self,
        chunks: Vec<ReviewChunk>,
        cancel: &CancelToken,
    ) -> Result<Vec<ChunkOutcome>, PipelineError> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent.max(1)));
        let mut join_set = JoinSet::new();

        for chunk in chunks {
            let request = self.prompts.build(&chunk, self.settings.mode);
            let worker = ChunkWorker {
                client: self.client.clone(),
                publisher: Arc::clone(&self.publisher),
                min_confidence: self.settings.min_confidence,
                cancel: cancel.clone(),
            };
            let sem = Arc::clone(&semaphore);

            join_set.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = worker.cancel.cancelled() => None,
                    permit = sem.acquire_owned() => permit.ok(),
                };
                match permit {
                    Some(_permit) => worker.run(chunk, request).await,
                    None => ChunkOutcome::new(&chunk).cancelled(&chunk),
                }
            });
        }

        let mut outcomes = Vec::new();
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(outcome) => {
                    if let ChunkStatus::InvalidCredential(msg) = &outcome.status {
                        join_set.abort_all();
                        return Err(PipelineError::InvalidCredential(msg.clone()));
                    }
                    outcomes.push(outcome);
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    tracing::warn!(error = %e, "review task panicked");
                    outcomes.push(ChunkOutcome {
                        index: usize::MAX,
                        files: Vec::new(),
                        status: ChunkStatus::Failed,
                        findings_parsed: 0,
                        findings_anchored: 0,
                        posted: 0,
                        posted_by_severity: BTreeMap::new(),
                        duplicate: 0,
                        notes: vec![SkipNote::new(
                            Subject::Run,
                            SkipReason::ReviewFailed(format!("review task panicked: {e}")),
                        )],
                    });
                }
            }
        }
        Ok(outcomes)
    }
}

/// Everything a chunk task needs, owned so it can move into the task.
struct ChunkWorker {
    client: ReviewClient,
    publisher: Arc<CommentPublisher>,
    min_confidence: f32,
    cancel: CancelToken,
}

impl ChunkWorker {
    async fn run(self, chunk: ReviewChunk, request: ReviewRequest) -> ChunkOutcome {
        let mut outcome = ChunkOutcome::new(&chunk);
        tracing::debug!(chunk = chunk.index, lines = chunk.line_count, "reviewing chunk");

        let raw = match self.client.submit(&request, &self.cancel).await {
            Ok(raw) => raw,
            Err(BackendError::Cancelled) => return outcome.cancelled(&chunk),
            Err(BackendError::InvalidCredential(msg)) => {
                outcome.status = ChunkStatus::InvalidCredential(msg);
                return outcome;
            }
            Err(err) => {
                tracing::warn!(chunk = chunk.index, error = %err, "review failed");
                outcome
                    .notes
                    .push(SkipNote::new(chunk.subject(), SkipReason::ReviewFailed(err.to_string())));
                return outcome;
            }
        };

        let parsed = match response::parse_response(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(chunk = chunk.index, error = %err, "unparseable response");
                outcome.notes.push(SkipNote::new(
                    chunk.subject(),
                    SkipReason::ResponseParse(err.to_string()),
                ));
                return outcome;
            }
        };
        outcome.status = ChunkStatus::Reviewed;
        outcome.findings_parsed = parsed.findings.len();
        for dropped in parsed.dropped {
            outcome.notes.push(SkipNote::new(
                Subject::Finding {
                    file: dropped.file,
                    line: dropped.line,
                },
                SkipReason::FindingDropped(dropped.reason),
            ));
        }

        let findings = self.confident(parsed.findings, &mut outcome.notes);
        let mapped = anchor::map_findings(findings, &chunk);
        for rejected in mapped.rejected {
            outcome.notes.push(SkipNote::new(
                finding_subject(&rejected.finding),
                SkipReason::Unanchorable(rejected.error.to_string()),
            ));
        }
        outcome.findings_anchored = mapped.anchored.len();

        self.publish(&mapped.anchored, &mut outcome).await;
        tracing::debug!(
            chunk = chunk.index,
            parsed = outcome.findings_parsed,
            anchored = outcome.findings_anchored,
            posted = outcome.posted,
            "chunk done"
        );
        outcome
    }

    /// Drop findings whose reported confidence is below the threshold.
    ///
    /// Findings without a confidence are kept.
    fn confident(&self, findings: Vec<Finding>, notes: &mut Vec<SkipNote>) -> Vec<Finding> {
        if self.min_confidence <= 0.0 {
            return findings;
        }
        findings
            .into_iter()
            .filter(|finding| match finding.confidence {
                Some(c) if c < self.min_confidence => {
                    notes.push(SkipNote::new(
                        finding_subject(finding),
                        SkipReason::LowConfidence {
                            confidence: format!("{c:.2}"),
                            min: format!("{:.2}", self.min_confidence),
                        },
                    ));
                    false
                }
                _ => true,
            })
            .collect()
    }

    async fn publish(&self, anchored: &[AnchoredFinding], outcome: &mut ChunkOutcome) {
        for item in anchored {
            match self.publisher.publish(item).await {
                PublishOutcome::Posted => {
                    outcome.posted += 1;
                    *outcome
                        .posted_by_severity
                        .entry(item.finding.severity)
                        .or_default() += 1;
                }
                PublishOutcome::Duplicate => outcome.duplicate += 1,
                PublishOutcome::Failed(err) => outcome.notes.push(SkipNote::new(
                    Subject::Comment {
                        file: item.anchor.file.clone(),
                        line: item.anchor.line,
                    },
                    SkipReason::PublishFailed(err.to_string()),
                )),
            }
        }
    }
}

fn finding_subject(finding: &Finding) -> Subject {
    Subject::Finding {
        file: Some(finding.file.clone()),
        line: Some(finding.line),
    }
}
