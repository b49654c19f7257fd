/// Store error taxonomy
///
/// Every store operation returns `Result<T, StoreError>`. The four kinds are
/// the only failures a caller ever sees:
///
/// - [`StoreError::Unauthorized`]: a policy predicate rejected the operation
/// - [`StoreError::ConstraintViolation`]: a column rule was broken, names the field
/// - [`StoreError::NotFound`]: the row does not exist or the caller may not see it
/// - [`StoreError::TransactionFailure`]: the database could not complete the
///   transaction; nothing was committed
///
/// Nothing in the store retries on its own. Retrying is up to the caller.

use validator::ValidationErrors;

/// Result alias used across the store
pub type StoreResult<T> = Result<T, StoreError>;

/// Typed failure of a store operation
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The acting identity is not allowed to perform the operation
    #[error("Not authorized to perform this operation")]
    Unauthorized,

    /// A schema rule was violated
    #[error("Constraint violation on {field}: {message}")]
    ConstraintViolation { field: String, message: String },

    /// The target row does not exist, or is invisible to the caller
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The database could not commit; the whole operation was rolled back
    #[error("Transaction failed: {0}")]
    TransactionFailure(String),
}

impl StoreError {
    /// Shorthand for a constraint violation
    pub fn constraint(field: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::ConstraintViolation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable kind, used in logs and HTTP bodies
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Unauthorized => "unauthorized",
            StoreError::ConstraintViolation { .. } => "constraint_violation",
            StoreError::NotFound(_) => "not_found",
            StoreError::TransactionFailure(_) => "transaction_failure",
        }
    }
}

/// Database errors become `TransactionFailure`, except constraint errors
/// raised by the schema itself, which keep the column name.
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err)
                if db_err.is_unique_violation()
                    || db_err.is_foreign_key_violation()
                    || db_err.is_check_violation() =>
            {
                let message = db_err.message().to_string();
                StoreError::ConstraintViolation {
                    field: constraint_field(&message).to_string(),
                    message,
                }
            }
            _ => StoreError::TransactionFailure(err.to_string()),
        }
    }
}

/// The first failing field, in field-name order so the choice is stable
impl From<ValidationErrors> for StoreError {
    fn from(errors: ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<_> = field_errors.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));

        match fields.first() {
            Some((field, errs)) => StoreError::ConstraintViolation {
                field: field.to_string(),
                message: errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Validation failed".to_string()),
            },
            None => StoreError::constraint("unknown", "Validation failed"),
        }
    }
}

/// Extracts the column name from a SQLite constraint message
///
/// `UNIQUE constraint failed: identities.email` gives `email`. Composite
/// uniques report the last column, check constraints the word after
/// `CHECK constraint failed:`. Anything unparseable gives `row`.
fn constraint_field(message: &str) -> &str {
    let Some((kind, detail)) = message.split_once("failed:") else {
        return "row";
    };

    // CHECK messages carry the expression text, keep the first column name in it
    if kind.trim_start().starts_with("CHECK") {
        return detail
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .find(|part| {
                part.chars().next().is_some_and(|c| c.is_alphabetic())
                    && !part.eq_ignore_ascii_case("length")
            })
            .unwrap_or("row");
    }

    let last = detail.split(',').last().unwrap_or(detail).trim();
    let column = last.rsplit('.').next().unwrap_or(last).trim();

    if column.is_empty() {
        "row"
    } else {
        column
    }
}
