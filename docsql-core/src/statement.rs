//! Statement classification and placeholder counting over raw SQL text.
//!
//! Both run at prepare time, before (and independently of) a full parse.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    CreateTable,
    DropTable,
    CreateIndex,
    DropIndex,
}

impl StatementKind {
    /// Classifies a statement by its leading keywords. Returns `None` for
    /// anything outside the supported set.
    pub fn classify(sql: &str) -> Option<Self> {
        let mut words = sql
            .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
            .filter(|w| !w.is_empty())
            .map(str::to_ascii_uppercase);

        match words.next()?.as_str() {
            "SELECT" => Some(StatementKind::Select),
            "INSERT" => Some(StatementKind::Insert),
            "UPDATE" => Some(StatementKind::Update),
            "DELETE" => Some(StatementKind::Delete),
            "CREATE" => match words.next()?.as_str() {
                "TABLE" => Some(StatementKind::CreateTable),
                "INDEX" => Some(StatementKind::CreateIndex),
                "UNIQUE" if words.next()? == "INDEX" => Some(StatementKind::CreateIndex),
                _ => None,
            },
            "DROP" => match words.next()?.as_str() {
                "TABLE" => Some(StatementKind::DropTable),
                "INDEX" => Some(StatementKind::DropIndex),
                _ => None,
            },
            _ => None,
        }
    }

    /// Whether statements of this kind produce rows rather than an exec result.
    pub fn is_query(self) -> bool {
        self == StatementKind::Select
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
            StatementKind::CreateTable => "CREATE TABLE",
            StatementKind::DropTable => "DROP TABLE",
            StatementKind::CreateIndex => "CREATE INDEX",
            StatementKind::DropIndex => "DROP INDEX",
        };
        f.write_str(name)
    }
}

/// Counts `?` and `$` markers outside single-quoted literals. A backslash
/// escapes the next character inside a literal, so `\'` does not close it.
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut in_literal = false;
    let mut escaped = false;

    for ch in sql.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_literal => escaped = true,
            '\'' => in_literal = !in_literal,
            '?' | '$' if !in_literal => count += 1,
            _ => {}
        }
    }

    count
}
