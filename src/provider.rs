//! HTTP client for the upstream billing provider.
//!
//! This module speaks the provider's REST dialect: cursor-paginated invoice
//! listings, an identity endpoint for resolving the account behind a
//! credential, and plain HTTPS downloads for invoice PDFs. Every call is
//! scoped to the caller's secret key; the client itself holds no credential.

use crate::config::ProviderConfig;
use crate::error::{CredentialError, Error, ExportError, ProviderError, Result};
use crate::types::{AccountId, DateRange, InvoiceId, InvoiceRecord, InvoiceStatus};
use serde::Deserialize;
use tracing::{debug, warn};

/// One page of the provider's invoice listing
#[derive(Debug, Deserialize)]
struct InvoiceListPage {
    /// Invoices on this page, oldest cursor position first
    data: Vec<WireInvoice>,
    /// Whether another page exists past the last item
    has_more: bool,
}

/// Invoice object as the provider serializes it
#[derive(Debug, Deserialize)]
struct WireInvoice {
    id: String,
    created: i64,
    #[serde(default)]
    amount_due: i64,
    #[serde(default)]
    currency: String,
    status: InvoiceStatus,
    #[serde(default)]
    customer_email: Option<String>,
    #[serde(default)]
    customer_name: Option<String>,
    #[serde(default)]
    invoice_pdf: Option<String>,
}

/// Account object from the provider's identity endpoint
#[derive(Debug, Deserialize)]
struct WireAccount {
    id: String,
}

impl WireInvoice {
    /// Map a wire invoice into the crate's record type
    ///
    /// The customer label prefers the email, falls back to the display name,
    /// and bottoms out at "customer". Empty strings count as absent.
    fn into_record(self) -> InvoiceRecord {
        let customer_label = self
            .customer_email
            .filter(|s| !s.is_empty())
            .or_else(|| self.customer_name.filter(|s| !s.is_empty()))
            .unwrap_or_else(|| "customer".to_string());

        InvoiceRecord {
            id: InvoiceId::new(self.id),
            issued_at: self.created,
            amount_due: self.amount_due,
            currency: self.currency,
            status: self.status,
            customer_label,
            document_ref: self.invoice_pdf.filter(|s| !s.is_empty()),
        }
    }
}

/// Client for the billing provider's REST API
///
/// Listing and identity calls share one client with a short timeout;
/// document downloads get their own client with a longer one, since a
/// single PDF can take far longer than a JSON round trip.
pub struct ProviderClient {
    /// Client for listing/identity calls
    http_client: reqwest::Client,

    /// Client for PDF downloads
    document_client: reqwest::Client,

    /// Provider base URL without a trailing slash
    base_url: String,
}

impl ProviderClient {
    /// Create a provider client from configuration
    ///
    /// # Errors
    /// Returns error if either HTTP client cannot be created
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent("invoice-dl")
            .build()
            .map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "Failed to create HTTP client: {}",
                    e
                )))
            })?;

        let document_client = reqwest::Client::builder()
            .timeout(config.document_timeout)
            .user_agent("invoice-dl")
            .build()
            .map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "Failed to create HTTP client: {}",
                    e
                )))
            })?;

        Ok(Self {
            http_client,
            document_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve the account that owns a credential
    ///
    /// # Errors
    /// Returns [`CredentialError::Rejected`] when the provider answers 401,
    /// and a [`ProviderError`] for transport failures or other statuses.
    pub async fn get_account_identity(&self, credential: &str) -> Result<AccountId> {
        let endpoint = "/v1/account";
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|e| Self::request_failed(endpoint, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Credential(CredentialError::Rejected));
        }
        if !status.is_success() {
            return Err(Error::Provider(ProviderError::UnexpectedStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            }));
        }

        let account: WireAccount = response.json().await.map_err(|e| {
            Error::Provider(ProviderError::InvalidResponse {
                message: format!("account object: {}", e),
            })
        })?;

        Ok(AccountId::new(account.id))
    }

    /// List invoices issued inside a date range, oldest cursor position first
    ///
    /// Follows the provider's `starting_after` cursor until the listing is
    /// exhausted or `max_records` invoices have been collected. Hitting the
    /// cap truncates with a warning rather than failing: a bounded archive
    /// beats no archive.
    ///
    /// # Errors
    /// Returns [`CredentialError::Rejected`] when the provider answers 401,
    /// and a [`ProviderError`] for transport failures or other statuses.
    pub async fn list_invoices(
        &self,
        credential: &str,
        range: &DateRange,
        page_size: usize,
        max_records: usize,
    ) -> Result<Vec<InvoiceRecord>> {
        let endpoint = "/v1/invoices";
        let url = format!("{}{}", self.base_url, endpoint);

        let mut records: Vec<InvoiceRecord> = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query: Vec<(&str, String)> = vec![("limit", page_size.to_string())];
            if let Some(gte) = range.issued_after() {
                query.push(("created[gte]", gte.to_string()));
            }
            if let Some(lte) = range.issued_before() {
                query.push(("created[lte]", lte.to_string()));
            }
            if let Some(after) = &cursor {
                query.push(("starting_after", after.clone()));
            }

            let response = self
                .http_client
                .get(&url)
                .query(&query)
                .bearer_auth(credential)
                .send()
                .await
                .map_err(|e| Self::request_failed(endpoint, e))?;

            let status = response.status();
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(Error::Credential(CredentialError::Rejected));
            }
            if !status.is_success() {
                return Err(Error::Provider(ProviderError::UnexpectedStatus {
                    endpoint: endpoint.to_string(),
                    status: status.as_u16(),
                }));
            }

            let page: InvoiceListPage = response.json().await.map_err(|e| {
                Error::Provider(ProviderError::InvalidResponse {
                    message: format!("invoice listing page: {}", e),
                })
            })?;

            debug!(
                page_items = page.data.len(),
                has_more = page.has_more,
                collected = records.len(),
                "fetched invoice listing page"
            );

            if page.data.is_empty() {
                // A non-advancing cursor would loop forever
                if page.has_more {
                    warn!("provider reported has_more on an empty page, stopping listing");
                }
                break;
            }

            cursor = page.data.last().map(|i| i.id.clone());
            records.extend(page.data.into_iter().map(WireInvoice::into_record));

            if records.len() >= max_records {
                if records.len() > max_records || page.has_more {
                    warn!(
                        max_records,
                        listed = records.len(),
                        "invoice listing truncated at the configured record cap"
                    );
                }
                records.truncate(max_records);
                break;
            }

            if !page.has_more {
                break;
            }
        }

        Ok(records)
    }

    /// Start downloading one invoice PDF
    ///
    /// Returns the open response so the caller can stream the body without
    /// buffering whole documents. Any failure here is per-invoice and maps to
    /// [`ExportError::DocumentUnavailable`], which exports treat as skippable.
    pub async fn fetch_document(
        &self,
        invoice_id: &InvoiceId,
        document_ref: &str,
    ) -> Result<reqwest::Response> {
        let response = self
            .document_client
            .get(document_ref)
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    "download timed out".to_string()
                } else if e.is_connect() {
                    format!("connection failed: {}", e)
                } else {
                    e.to_string()
                };
                Error::Export(ExportError::DocumentUnavailable {
                    invoice_id: invoice_id.clone(),
                    reason,
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Export(ExportError::DocumentUnavailable {
                invoice_id: invoice_id.clone(),
                reason: format!("status {}", status.as_u16()),
            }));
        }

        Ok(response)
    }

    /// Map a reqwest transport error onto the provider error type
    fn request_failed(endpoint: &str, e: reqwest::Error) -> Error {
        let message = if e.is_timeout() {
            "request timed out".to_string()
        } else if e.is_connect() {
            format!("connection failed: {}", e)
        } else {
            e.to_string()
        };
        Error::Provider(ProviderError::RequestFailed {
            endpoint: endpoint.to_string(),
            message,
        })
    }
}
