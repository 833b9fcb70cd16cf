/// Which remote collaborator produced a [`RemoteError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    Auth,
    Table,
    Storage,
}

impl Collaborator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Table => "table",
            Self::Storage => "storage",
        }
    }
}

/// Error reported by a remote collaborator. The message is shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    pub origin: Collaborator,
    /// Machine-readable kind (e.g. `PGRST116`, `invalid_credentials`), when the backend sent one.
    pub code: Option<String>,
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    /// Code the table backend uses when a single-row request matched no rows.
    pub const NO_ROWS: &'static str = "PGRST116";

    pub fn new(origin: Collaborator, message: impl Into<String>) -> Self {
        Self {
            origin,
            code: None,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn no_rows() -> Self {
        Self::new(
            Collaborator::Table,
            "JSON object requested, multiple (or no) rows returned",
        )
        .with_code(Self::NO_ROWS)
        .with_status(406)
    }

    pub fn is_no_rows(&self) -> bool {
        self.code.as_deref() == Some(Self::NO_ROWS)
    }
}

/// One failing form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// Every failing field of a submitted form, in form order.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("{}", joined(.0))]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, field: &'static str, message: &'static str) {
        self.0.push(FieldError { field, message });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, field: &str) -> Option<&'static str> {
        self.0.iter().find(|e| e.field == field).map(|e| e.message)
    }

    /// `Ok(())` when nothing failed, otherwise the collected errors.
    pub fn into_result(self) -> Result<(), PortalError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(PortalError::Validation(self))
        }
    }
}

fn joined(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Portal error variants.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("{0}")]
    Validation(ValidationErrors),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("Please select a valid image file")]
    InvalidImageType { content_type: String },
    #[error("Image size must be less than 5MB")]
    ImageTooLarge { size: u64 },
    #[error("not signed in")]
    NotSignedIn,
    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl PortalError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::Remote(_) => "REMOTE",
            Self::InvalidImageType { .. } => "INVALID_IMAGE_TYPE",
            Self::ImageTooLarge { .. } => "IMAGE_TOO_LARGE",
            Self::NotSignedIn => "NOT_SIGNED_IN",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote(e) => Some(e),
            _ => None,
        }
    }

    /// True for the table backend's "no matching row" kind.
    pub fn is_no_rows(&self) -> bool {
        self.remote().is_some_and(RemoteError::is_no_rows)
    }
}
