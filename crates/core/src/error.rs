#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid condition element: {0}")]
    InvalidElement(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Value mismatch: element expects {expected}, got {found}")]
    ValueMismatch {
        expected: &'static str,
        found: &'static str,
    },
}
