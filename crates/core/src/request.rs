use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation identifier assigned to one inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a random request identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a request identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// State scoped to a single inbound request.
///
/// A context is created when a request starts and dropped when it ends. It is
/// passed explicitly to every component that stamps audit rows, so nothing
/// leaks between requests served by the same worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    request_id: RequestId,
}

impl RequestContext {
    /// Starts a request with a freshly generated correlation identifier.
    #[must_use]
    pub fn begin() -> Self {
        Self {
            request_id: RequestId::new(),
        }
    }

    /// Creates a context around an existing correlation identifier.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self { request_id }
    }

    /// Returns the correlation identifier of this request.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }
}
