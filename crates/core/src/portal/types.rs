//! Portal search outcomes.

use serde::{Deserialize, Serialize};

/// What the portal's search surface reported after a submitted query.
///
/// Permission-denied, no-results and field-validation alerts are explicit
/// UI states checked before any generic error handling; they never go
/// through the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchOutcome {
    /// Results are available for download.
    Results {
        /// Total documents matched.
        count: u64,
        /// Result pages, used to window paged downloads.
        pages: u32,
    },
    /// The portal displayed its "Sem Resultados!" indicator.
    NoResults,
    /// The portal displayed its permission-denied indicator.
    PermissionDenied,
    /// A required-field validation alert appeared; the form must be
    /// re-filled and re-submitted.
    ValidationAlert { message: String },
}
