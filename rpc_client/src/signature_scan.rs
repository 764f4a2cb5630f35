//! Backward pagination over an address's signature history.
//!
//! Pages arrive newest-first. The scan walks older and older pages by passing
//! the last (oldest) signature of each page as the next `before` cursor, and
//! stops on an empty page or when the cursor lands exactly on the advisory
//! `until` boundary. The page-advance logic is kept free of I/O so the whole
//! state machine can be exercised with synthetic pages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of a `getSignaturesForAddress` page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub signature: String,
    /// Non-null for failed transactions.
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(rename = "blockTime", default)]
    pub block_time: Option<i64>,
}

impl SignatureInfo {
    pub fn is_successful(&self) -> bool {
        self.err.is_none()
    }
}

/// Options for one signature scan.
#[derive(Debug, Clone, Default)]
pub struct SignatureScanOptions {
    /// Oldest signature to walk back to. Advisory: the server is trusted to
    /// honor it, and the scan additionally stops once the cursor equals it.
    pub until: Option<String>,
    /// Drop entries whose `err` field is set.
    pub only_successful: bool,
    /// Extra pages allowed beyond the first before the scan is declared
    /// over budget.
    pub max_pages: u32,
}

impl SignatureScanOptions {
    pub fn successful_only(max_pages: u32) -> Self {
        Self {
            until: None,
            only_successful: true,
            max_pages,
        }
    }
}

/// What the driver should do after a page was folded into the scan.
#[derive(Debug, PartialEq, Eq)]
pub enum PageOutcome {
    /// Fetch the next page using the current cursor.
    Continue,
    /// Terminal: empty page or the `until` boundary was reached.
    Complete,
    /// Terminal: the page budget ran out before the history was exhausted.
    /// Distinct from `Complete` so callers can tell "finished" from
    /// "ran out of budget".
    BudgetExhausted,
}

/// Accumulating state of one backward scan.
#[derive(Debug)]
pub struct SignatureScan {
    until: Option<String>,
    only_successful: bool,
    max_pages: u32,
    pages_consumed: u32,
    before: Option<String>,
    signatures: Vec<SignatureInfo>,
}

impl SignatureScan {
    pub fn new(options: &SignatureScanOptions) -> Self {
        Self {
            until: options.until.clone(),
            only_successful: options.only_successful,
            max_pages: options.max_pages,
            pages_consumed: 0,
            before: None,
            signatures: Vec::new(),
        }
    }

    /// Cursor for the next page request, `None` on the first page.
    pub fn before(&self) -> Option<&str> {
        self.before.as_deref()
    }

    pub fn until(&self) -> Option<&str> {
        self.until.as_deref()
    }

    /// Fold one page into the scan and decide how to proceed.
    ///
    /// Pages are appended in fetch order and each page is newest-first, so
    /// the accumulated list stays newest-to-oldest overall.
    pub fn push_page(&mut self, page: Vec<SignatureInfo>) -> PageOutcome {
        if page.is_empty() {
            return PageOutcome::Complete;
        }

        // Oldest entry of the page becomes the next cursor.
        let next_before = page
            .last()
            .map(|info| info.signature.clone())
            .unwrap_or_default();

        if self.only_successful {
            self.signatures
                .extend(page.into_iter().filter(SignatureInfo::is_successful));
        } else {
            self.signatures.extend(page);
        }

        let boundary_reached = self.until.as_deref() == Some(next_before.as_str());
        self.before = Some(next_before);

        if boundary_reached {
            return PageOutcome::Complete;
        }

        self.pages_consumed += 1;
        if self.pages_consumed > self.max_pages {
            PageOutcome::BudgetExhausted
        } else {
            PageOutcome::Continue
        }
    }

    pub fn into_signatures(self) -> Vec<String> {
        self.signatures
            .into_iter()
            .map(|info| info.signature)
            .collect()
    }
}
