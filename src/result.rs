use serde::Serialize;

/// Outcome of a mutating statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Key of the last document created, when the statement created any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_insert_key: Option<String>,
}

impl ExecResult {
    pub fn affected(rows: u64) -> Self {
        Self {
            rows_affected: rows,
            last_insert_key: None,
        }
    }

    pub fn inserted(rows: u64, last_key: Option<String>) -> Self {
        Self {
            rows_affected: rows,
            last_insert_key: last_key,
        }
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    pub fn last_insert_key(&self) -> Option<&str> {
        self.last_insert_key.as_deref()
    }

    /// Document keys are strings; there is never a numeric insert id.
    pub fn last_insert_id(&self) -> Option<i64> {
        None
    }
}
