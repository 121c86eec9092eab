//! Concurrent digest assembly.
//!
//! Selected files become independent tasks run through a bounded worker
//! pool. Output is deterministic: chunks are folded in selection order
//! (sorted by relative path), never completion order. A single file's
//! failure is folded into an `ERROR:` body and a recorded per-file error,
//! never an aborted batch.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use humansize::{format_size, BINARY};
use indexmap::IndexMap;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use codedigest_core::{
    collect_selected_files, AppliedLimits, AutoApprove, CancelReason, ContentNode, DigestConfig,
    DigestError, DigestMetadata, DigestResult, FileError, OutputFile, OutputFormat,
    OverridePrompt, ProgressEvent, QuotaUsage, TraversalStats,
};

use crate::format::{formatter_for, FinalizeInput, Formatter};
use crate::handlers::HandlerRegistry;
use crate::imports::ImportExtractor;
use crate::redact::Redactor;
use crate::tokens::{Tokenizer, TokenizerRegistry};
use crate::tree::render_tree;

const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// Bytes inspected for the NUL heuristic.
const BINARY_SNIFF_LEN: usize = 8192;

/// Fraction of the token budget at which the override prompt fires.
const TOKEN_PROMPT_THRESHOLD: f64 = 0.8;

/// Outcome of one per-file task.
enum TaskOutput {
    Done(Box<FileChunk>),
    Cancelled,
}

struct FileChunk {
    index: usize,
    rel_path: String,
    header: String,
    body: String,
    tokens: u64,
    imports: Vec<String>,
    error: Option<FileError>,
}

/// Concurrent assembly pipeline.
pub struct AssemblyPipeline {
    config: Arc<DigestConfig>,
    prompt: Arc<dyn OverridePrompt>,
    cancel: CancellationToken,
    progress_tx: broadcast::Sender<ProgressEvent>,
    handlers: Arc<HandlerRegistry>,
    tokenizers: TokenizerRegistry,
    imports: Arc<ImportExtractor>,
}

impl AssemblyPipeline {
    /// Create a pipeline with an auto-approving prompt and a fresh token.
    pub fn new(config: DigestConfig) -> Self {
        Self::with_collaborators(config, Arc::new(AutoApprove), CancellationToken::new())
    }

    /// Create a pipeline with explicit collaborators.
    pub fn with_collaborators(
        config: DigestConfig,
        prompt: Arc<dyn OverridePrompt>,
        cancel: CancellationToken,
    ) -> Self {
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self {
            config: Arc::new(config),
            prompt,
            cancel,
            progress_tx,
            handlers: Arc::new(HandlerRegistry::new()),
            tokenizers: TokenizerRegistry::new(),
            imports: Arc::new(ImportExtractor::new()),
        }
    }

    /// Replace the content handler registry.
    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = Arc::new(handlers);
        self
    }

    /// Replace the tokenizer registry.
    pub fn with_tokenizers(mut self, tokenizers: TokenizerRegistry) -> Self {
        self.tokenizers = tokenizers;
        self
    }

    /// Replace the import extractor.
    pub fn with_imports(mut self, imports: ImportExtractor) -> Self {
        self.imports = Arc::new(imports);
        self
    }

    /// Subscribe to assembly progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress_tx.subscribe()
    }

    /// Assemble a digest from a scanned node forest.
    ///
    /// `root_name` labels the rendered tree; `stats` carries traversal
    /// counters and warnings into the digest metadata when available.
    pub async fn generate(
        &self,
        nodes: &[ContentNode],
        root_name: &str,
        stats: Option<TraversalStats>,
    ) -> Result<DigestResult, DigestError> {
        let mut selection: Vec<ContentNode> = collect_selected_files(nodes)
            .into_iter()
            .cloned()
            .collect();
        selection.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        let total = selection.len();

        let formatter: Arc<dyn Formatter> = Arc::from(formatter_for(self.config.output_format));
        let tokenizer = self.tokenizers.resolve(self.config.tokenizer.as_deref());

        tracing::debug!(files = total, format = ?self.config.output_format, "assembly started");

        let mut slots: Vec<Option<FileChunk>> = Vec::new();
        slots.resize_with(total, || None);
        let mut warnings: Vec<String> = Vec::new();
        let mut cancelled = false;

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut join_set: JoinSet<TaskOutput> = JoinSet::new();
        for (index, node) in selection.iter().enumerate() {
            join_set.spawn(file_task(
                index,
                node.clone(),
                Arc::clone(&self.config),
                Arc::clone(&formatter),
                Arc::clone(&self.handlers),
                Arc::clone(&self.imports),
                Arc::clone(&tokenizer),
                Arc::clone(&semaphore),
                self.cancel.clone(),
            ));
        }

        let mut running_tokens: u64 = 0;
        let mut token_prompt_checked = false;
        let mut done = 0usize;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(TaskOutput::Done(chunk)) => {
                    running_tokens += chunk.tokens;
                    self.check_token_budget(running_tokens, &mut token_prompt_checked)?;
                    let index = chunk.index;
                    slots[index] = Some(*chunk);
                }
                Ok(TaskOutput::Cancelled) => cancelled = true,
                Err(join_err) => {
                    warnings.push(format!("assembly task failed: {join_err}"));
                }
            }
            done += 1;
            if total > 0 {
                let event = ProgressEvent::new("assemble", "content")
                    .with_percent(done as f64 / total as f64 * 100.0);
                let _ = self.progress_tx.send(event);
            }
        }

        if cancelled {
            return Err(DigestError::cancelled(CancelReason::Requested));
        }

        // Fold in selection order regardless of completion order.
        let mut chunks: Vec<String> = Vec::with_capacity(total);
        let mut files: Vec<OutputFile> = Vec::with_capacity(total);
        let mut errors: IndexMap<(String, String), FileError> = IndexMap::new();
        for slot in slots.into_iter().flatten() {
            chunks.push(format!("{}{}", slot.header, slot.body));
            files.push(OutputFile {
                path: slot.rel_path,
                header: slot.header,
                body: slot.body,
                imports: slot.imports,
            });
            if let Some(error) = slot.error {
                errors.entry(error.key()).or_insert(error);
            }
        }
        let errors: Vec<FileError> = errors.into_values().collect();

        if let Some(stats) = &stats {
            warnings.extend(stats.warnings());
        }

        let tree = if self.config.include_tree {
            render_tree(root_name, nodes)
        } else {
            String::new()
        };
        let summary = self.build_summary(root_name, &files, &stats, &errors);

        let input = FinalizeInput {
            summary: &summary,
            tree: &tree,
            chunks: &chunks,
            files: &files,
            warnings: &warnings,
        };
        let mut content = formatter.finalize(&input, &self.config)?;

        // Redaction runs over the assembled artifact, then content is
        // rebuilt from the redacted projections to keep them consistent.
        let mut redaction_applied = false;
        if !self.config.redaction.show_redacted {
            match self.redact(&mut files, &mut chunks) {
                Ok(()) => {
                    redaction_applied = true;
                    let input = FinalizeInput {
                        summary: &summary,
                        tree: &tree,
                        chunks: &chunks,
                        files: &files,
                        warnings: &warnings,
                    };
                    content = formatter.finalize(&input, &self.config)?;
                }
                Err(message) => {
                    tracing::warn!(%message, "redaction pass failed");
                    warnings.push(format!("redaction failed: {message}"));
                }
            }
        }

        // The rebuild above can only drop the leading tree block through a
        // formatter bug, but the artifact contract demands the check.
        if self.config.include_tree
            && self.config.output_format.is_textual()
            && !tree.is_empty()
            && !content.contains(tree.trim_end())
        {
            content = format!("{tree}{}{content}", self.config.chunk_separator);
        }

        let token_estimate = tokenizer.count(&content, &self.config);
        tracing::debug!(
            files = files.len(),
            tokens = token_estimate,
            errors = errors.len(),
            "assembly finished"
        );

        Ok(DigestResult {
            summary,
            tree,
            content,
            chunks,
            files,
            warnings,
            token_estimate,
            errors,
            metadata: DigestMetadata {
                format: self.config.output_format,
                limits: AppliedLimits {
                    max_file_size: self.config.max_file_size,
                    max_total_size: self.config.max_total_size,
                    max_files: self.config.max_files,
                    max_directory_depth: self.config.max_directory_depth,
                    max_tokens: self.config.max_tokens,
                },
                stats,
                redaction_applied,
                generated_at: Utc::now(),
            },
        })
    }

    /// Apply the token budget protocol to the running total.
    ///
    /// The 80% crossing is checked once per invocation; declining aborts
    /// generation entirely rather than returning a truncated digest.
    fn check_token_budget(&self, running: u64, checked: &mut bool) -> Result<(), DigestError> {
        let Some(limit) = self.config.max_tokens else {
            return Ok(());
        };
        if *checked || (running as f64) < limit as f64 * TOKEN_PROMPT_THRESHOLD {
            return Ok(());
        }
        *checked = true;
        let usage = QuotaUsage::new(running, limit, "estimated output tokens");
        if !self.config.interactive || self.prompt.confirm_token_override(&usage) {
            tracing::debug!(running, limit, "token budget threshold crossed, proceeding");
            Ok(())
        } else {
            Err(DigestError::cancelled(CancelReason::TokenOverrideDeclined))
        }
    }

    /// Redact secrets in the per-file projections, mutating bodies in place.
    ///
    /// Returns `Err` with a message instead of a typed error because
    /// redaction failures downgrade to a warning at the call site.
    fn redact(&self, files: &mut [OutputFile], chunks: &mut [String]) -> Result<(), String> {
        let redactor =
            Redactor::new(&self.config.redaction.custom_patterns).map_err(|e| e.to_string())?;

        let mut total = 0usize;
        for file in files.iter_mut() {
            let (redacted, count) = redactor.redact_text(&file.body);
            if count > 0 {
                file.body = redacted;
                total += count;
            }
        }
        // JSON output re-escapes bodies, so a body that is itself a JSON
        // document hides its string leaves from the flat pass. Recurse
        // into parsed values before serialization.
        if self.config.output_format == OutputFormat::Json {
            for file in files.iter_mut() {
                if let Ok(mut value) = serde_json::from_str::<serde_json::Value>(&file.body) {
                    let count = redactor.redact_value(&mut value);
                    if count > 0 {
                        file.body = serde_json::to_string_pretty(&value)
                            .map_err(|e| e.to_string())?;
                        total += count;
                    }
                }
            }
        }
        if total == 0 && redactor.has_custom_rules() {
            for file in files.iter_mut() {
                let (redacted, count) = redactor.redact_fallback(&file.body);
                if count > 0 {
                    file.body = redacted;
                    total += count;
                }
            }
        }
        if total > 0 {
            tracing::info!(substitutions = total, "redaction applied");
            for (chunk, file) in chunks.iter_mut().zip(files.iter()) {
                *chunk = format!("{}{}", file.header, file.body);
            }
        }
        Ok(())
    }

    fn build_summary(
        &self,
        root_name: &str,
        files: &[OutputFile],
        stats: &Option<TraversalStats>,
        errors: &[FileError],
    ) -> String {
        let mut summary = format!("Digest of {root_name}\n");
        match stats {
            Some(stats) => {
                summary.push_str(&format!(
                    "Files: {} ({})\n",
                    stats.total_files,
                    format_size(stats.total_size, BINARY)
                ));
                summary.push_str(&format!("Directories: {}\n", stats.directories));
            }
            None => {
                summary.push_str(&format!("Files: {}\n", files.len()));
            }
        }
        if !errors.is_empty() {
            summary.push_str(&format!("{} file(s) could not be processed:\n", errors.len()));
            for error in errors {
                summary.push_str(&format!("  {}: {}\n", error.path, error.message));
            }
        }
        summary
    }
}

/// One per-file unit of work.
///
/// All failures are converted into an `ERROR:` body plus a recorded file
/// error inside the task; only cancellation escapes.
#[allow(clippy::too_many_arguments)]
async fn file_task(
    index: usize,
    node: ContentNode,
    config: Arc<DigestConfig>,
    formatter: Arc<dyn Formatter>,
    handlers: Arc<HandlerRegistry>,
    imports: Arc<ImportExtractor>,
    tokenizer: Arc<dyn Tokenizer>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
) -> TaskOutput {
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return TaskOutput::Cancelled;
    };
    // In-flight tasks run to completion; queued tasks stop here.
    if cancel.is_cancelled() {
        return TaskOutput::Cancelled;
    }

    let header = formatter.render_header(&node);
    let rel_path = node.rel_path.clone();
    let (body, imports, error) = match build_body(&node, &config, &formatter, &handlers, &imports).await
    {
        Ok((body, imports)) => (body, imports, None),
        Err(err) => {
            tracing::warn!(path = %rel_path, error = %err, "file task failed");
            (
                format!("ERROR: {err}\n"),
                Vec::new(),
                Some(FileError::new(rel_path.clone(), err.to_string())),
            )
        }
    };
    let tokens = tokenizer.count(&body, &config);

    TaskOutput::Done(Box::new(FileChunk {
        index,
        rel_path,
        header,
        body,
        tokens,
        imports,
        error,
    }))
}

async fn build_body(
    node: &ContentNode,
    config: &DigestConfig,
    formatter: &Arc<dyn Formatter>,
    handlers: &HandlerRegistry,
    imports: &ImportExtractor,
) -> Result<(String, Vec<String>), DigestError> {
    let raw = tokio::fs::read(&node.path)
        .await
        .map_err(|e| DigestError::io(&node.path, e))?;

    if let Some(handler) = handlers.resolve(node) {
        let text = handler.handle(node, &raw, config)?;
        let refs = imports.extract(&node.rel_path, &text);
        return Ok((formatter.render_body(node, &text), refs));
    }

    if looks_binary(&raw) {
        let body = match config.binary_policy {
            codedigest_core::BinaryPolicy::Skip => formatter.render_body(
                node,
                &format!("[binary file omitted: {}]", format_size(node.size, BINARY)),
            ),
            codedigest_core::BinaryPolicy::Base64 => {
                formatter.render_body(node, &BASE64.encode(&raw))
            }
        };
        return Ok((body, Vec::new()));
    }

    let text = String::from_utf8_lossy(&raw).into_owned();
    let refs = imports.extract(&node.rel_path, &text);
    Ok((formatter.render_body(node, &text), refs))
}

/// NUL-byte heuristic over the first bytes of a file.
fn looks_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(BINARY_SNIFF_LEN).any(|b| *b == 0)
}
