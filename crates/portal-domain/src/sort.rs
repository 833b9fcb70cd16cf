//! Sort direction and ordering for list queries.

use serde::{Deserialize, Serialize};

/// Generic sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sort {
    Desc,
    Asc,
}

impl Sort {
    /// Keyword used by the remote query syntax (`order=column.asc`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Desc => "desc",
            Self::Asc => "asc",
        }
    }
}

/// Ordering applied to a list query: one column and a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderBy {
    pub column: &'static str,
    pub sort: Sort,
}

impl OrderBy {
    pub const fn asc(column: &'static str) -> Self {
        Self {
            column,
            sort: Sort::Asc,
        }
    }

    pub const fn desc(column: &'static str) -> Self {
        Self {
            column,
            sort: Sort::Desc,
        }
    }
}
