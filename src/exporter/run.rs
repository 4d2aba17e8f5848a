//! The export pipeline.
//!
//! An export is split at the streaming boundary. [`InvoiceExporter::begin_export`]
//! runs everything that can still fail with a clean error response:
//! credential checks, account identity, quota admission, the invoice
//! listing. Once it returns, HTTP headers are as good as sent; the spawned
//! pipeline task fetches documents with bounded concurrency, commits
//! archive entries in listing order, and can only signal failure by
//! truncating the byte stream.
//!
//! Per-document failures never abort the run: the entry is skipped with a
//! warning and counted in the completion summary. Usage is recorded against
//! the quota exactly once, after the archive has been finalized, so an
//! abandoned or failed stream is never charged.

use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::archive::ArchiveWriter;
use crate::error::{Error, ExportError, Result};
use crate::provider::ProviderClient;
use crate::types::{AccountId, DateRange, ExportSummary, InvoiceId, InvoiceRecord};

use super::InvoiceExporter;

/// Chunks buffered between the archive writer and the body consumer
const BODY_CHANNEL_BUFFER: usize = 8;

/// An admitted export whose archive bytes are still being produced
///
/// `body` yields raw zip bytes and ends once the archive is finalized.
/// Dropping it early cancels the pipeline: in-flight fetches stop and no
/// quota usage is recorded.
pub struct ExportStream {
    /// Account the export runs for
    pub account_id: AccountId,
    /// Invoices matched by the listing (not every one yields an entry)
    pub invoice_count: usize,
    /// Archive byte stream
    pub body: mpsc::Receiver<Bytes>,
}

/// Result of fetching one invoice's document, before any archive write
enum FetchOutcome {
    /// Response headers arrived; the body is still streaming
    Fetched {
        invoice_id: InvoiceId,
        response: reqwest::Response,
    },
    /// Nothing to append for this invoice
    Skipped {
        invoice_id: InvoiceId,
        reason: String,
    },
}

/// Whether one append committed or was abandoned mid-stream
enum AppendResult {
    Committed,
    Skipped(String),
}

impl InvoiceExporter {
    /// Start an export for the credential's account
    ///
    /// Performs the pre-stream phases in order: credential shape check,
    /// account identity, quota admission, invoice listing. Each failure maps
    /// to a distinct error the transport layer can still report cleanly:
    ///
    /// - [`Error::Credential`] - missing, malformed, or provider-rejected key
    /// - [`Error::QuotaExceeded`] - free allotment used up; carries the
    ///   account id so callers can route toward an upgrade
    /// - [`Error::Provider`] - listing or identity call failed upstream
    /// - [`Error::ShuttingDown`] - service is draining
    ///
    /// On success the archive pipeline is already running; consume
    /// [`ExportStream::body`] promptly, as the writer applies backpressure.
    pub async fn begin_export(&self, credential: &str, range: DateRange) -> Result<ExportStream> {
        if self.shutdown.is_cancelled() {
            return Err(Error::ShuttingDown);
        }
        super::validate_credential(credential)?;

        let account_id = self.provider.get_account_identity(credential).await?;

        let decision = self.quota.check_admit(&account_id).await?;
        if !decision.admitted {
            return Err(Error::QuotaExceeded {
                account_id: decision.account_id,
                export_count: decision.export_count,
            });
        }

        let invoices = self
            .provider
            .list_invoices(
                credential,
                &range,
                self.config.export.page_size,
                self.config.export.max_records,
            )
            .await?;
        let invoice_count = invoices.len();

        info!(
            account_id = %account_id,
            invoice_count,
            range = ?range,
            "starting invoice export"
        );

        let (body_tx, body_rx) = mpsc::channel(BODY_CHANNEL_BUFFER);
        let cancel = self.shutdown.child_token();
        let exporter = self.clone();
        let pipeline_account = account_id.clone();

        tokio::spawn(async move {
            run_export_pipeline(exporter, pipeline_account, invoices, body_tx, cancel).await;
        });

        Ok(ExportStream {
            account_id,
            invoice_count,
            body: body_rx,
        })
    }
}

/// Drive one export to its terminal state and log the outcome
async fn run_export_pipeline(
    exporter: InvoiceExporter,
    account_id: AccountId,
    invoices: Vec<InvoiceRecord>,
    body_tx: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
) {
    let result = stream_archive(
        exporter.provider.clone(),
        exporter.config.export.fetch_concurrency,
        invoices,
        body_tx,
        &cancel,
    )
    .await;

    match result {
        Ok(summary) => match exporter.quota.record_success(&account_id).await {
            Ok(export_count) => {
                info!(
                    account_id = %account_id,
                    export_count,
                    listed = summary.listed,
                    appended = summary.appended,
                    skipped = summary.skipped,
                    placeholder = summary.placeholder,
                    "export completed"
                );
            }
            Err(e) => {
                error!(
                    account_id = %account_id,
                    error = %e,
                    appended = summary.appended,
                    "export completed but recording usage failed"
                );
            }
        },
        Err(Error::Export(ExportError::StreamAborted)) => {
            info!(
                account_id = %account_id,
                "export abandoned, client stopped reading the stream"
            );
        }
        Err(Error::ShuttingDown) => {
            info!(account_id = %account_id, "export cancelled by shutdown");
        }
        Err(e) => {
            error!(account_id = %account_id, error = %e, "export pipeline failed");
        }
    }
}

/// Fetch every document and assemble the archive onto `body_tx`
///
/// Fetches run with bounded concurrency but the stream is ordered, so
/// entries commit in invoice listing order. Returning an error means the
/// archive was not finalized and the export must not be charged.
async fn stream_archive(
    provider: Arc<ProviderClient>,
    fetch_concurrency: usize,
    invoices: Vec<InvoiceRecord>,
    body_tx: mpsc::Sender<Bytes>,
    cancel: &CancellationToken,
) -> Result<ExportSummary> {
    let listed = invoices.len();
    // Receiver drop is the only disconnect signal once streaming has begun
    let disconnect = body_tx.clone();
    let writer = ArchiveWriter::spawn(body_tx);

    let mut appended = 0usize;
    let mut skipped = 0usize;

    let fetches = futures::stream::iter(invoices.into_iter().map(|invoice| {
        let provider = provider.clone();
        async move { fetch_one(provider, invoice).await }
    }))
    .buffered(fetch_concurrency.max(1));
    futures::pin_mut!(fetches);

    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::ShuttingDown),
            _ = disconnect.closed() => return Err(Error::Export(ExportError::StreamAborted)),
            next = fetches.next() => match next {
                Some(outcome) => outcome,
                None => break,
            },
        };

        match outcome {
            FetchOutcome::Fetched {
                invoice_id,
                response,
            } => match append_document(&writer, &invoice_id, response, cancel).await? {
                AppendResult::Committed => appended += 1,
                AppendResult::Skipped(reason) => {
                    warn!(invoice_id = %invoice_id, reason = %reason, "skipping invoice document");
                    skipped += 1;
                }
            },
            FetchOutcome::Skipped { invoice_id, reason } => {
                warn!(invoice_id = %invoice_id, reason = %reason, "skipping invoice document");
                skipped += 1;
            }
        }
    }

    let outcome = writer.finish().await?;

    Ok(ExportSummary {
        listed,
        appended,
        skipped,
        placeholder: outcome.placeholder,
    })
}

/// Open the document download for one invoice
///
/// Failures are folded into a skip outcome here; only the archive stream
/// itself can abort an export.
async fn fetch_one(provider: Arc<ProviderClient>, invoice: InvoiceRecord) -> FetchOutcome {
    let Some(document_ref) = invoice.document_ref else {
        return FetchOutcome::Skipped {
            invoice_id: invoice.id,
            reason: "no document available".to_string(),
        };
    };

    match provider.fetch_document(&invoice.id, &document_ref).await {
        Ok(response) => FetchOutcome::Fetched {
            invoice_id: invoice.id,
            response,
        },
        Err(Error::Export(ExportError::DocumentUnavailable { reason, .. })) => {
            FetchOutcome::Skipped {
                invoice_id: invoice.id,
                reason,
            }
        }
        Err(e) => FetchOutcome::Skipped {
            invoice_id: invoice.id,
            reason: e.to_string(),
        },
    }
}

/// Stream one document body into the archive as `{invoice_id}.pdf`
///
/// A mid-read failure aborts just this entry; the spooling writer leaves no
/// trace of it in the archive. Errors returned here mean the writer itself
/// is gone and the whole export must unwind.
async fn append_document(
    writer: &ArchiveWriter,
    invoice_id: &InvoiceId,
    response: reqwest::Response,
    cancel: &CancellationToken,
) -> Result<AppendResult> {
    writer.start_entry(format!("{}.pdf", invoice_id)).await?;

    let body = response.bytes_stream();
    futures::pin_mut!(body);

    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::ShuttingDown),
            chunk = body.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => writer.append_chunk(bytes).await?,
            Some(Err(e)) => {
                writer.abort_entry().await?;
                return Ok(AppendResult::Skipped(format!(
                    "document stream failed mid-read: {}",
                    e
                )));
            }
            None => break,
        }
    }

    writer.finish_entry().await?;
    Ok(AppendResult::Committed)
}
