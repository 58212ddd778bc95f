//! Abstract syntax tree for the accepted SQL subset.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    CreateTable(CreateTableStatement),
    DropTable(DropTableStatement),
    CreateIndex(CreateIndexStatement),
    DropIndex(DropIndexStatement),
}

/// A table reference, optionally narrowed to one document and one of its
/// child collections: `orders[id = 'o1'].items`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSelector {
    pub name: String,
    pub key: Option<KeySelector>,
    pub child: Option<Box<TableSelector>>,
}

impl TableSelector {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: None,
            child: None,
        }
    }

    /// Name of the innermost collection.
    pub fn leaf_name(&self) -> &str {
        match &self.child {
            Some(child) => child.leaf_name(),
            None => &self.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeySelector {
    pub field: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    Table {
        selector: TableSelector,
        alias: Option<String>,
    },
    Subquery {
        query: Box<SelectStatement>,
        alias: Option<String>,
    },
}

impl TableSource {
    pub fn alias(&self) -> Option<&str> {
        match self {
            TableSource::Table { alias, .. } | TableSource::Subquery { alias, .. } => {
                alias.as_deref()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub columns: Vec<SelectColumn>,
    pub from: TableSource,
    pub where_clause: Option<Expr>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumn {
    Star,
    Column {
        name: String,
        alias: Option<String>,
    },
    Function {
        name: String,
        args: Vec<Expr>,
        alias: Option<String>,
    },
    Expression {
        expr: Expr,
        alias: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub column: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: TableSelector,
    pub columns: Option<Vec<String>>,
    pub values: Vec<Vec<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: TableSelector,
    pub assignments: Vec<(String, Expr)>,
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: TableSelector,
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    pub name: String,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTableStatement {
    pub name: String,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexStatement {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropIndexStatement {
    pub name: String,
    pub table: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    String,
    Integer,
    Float,
    Boolean,
    Null,
}

/// A literal as written in the statement text.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub kind: LiteralKind,
    pub text: String,
}

impl Literal {
    pub fn new(kind: LiteralKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(String),
    QualifiedColumn { table: String, column: String },
    Literal(Literal),
    Placeholder(String),

    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    Negate(Box<Expr>),
    Not(Box<Expr>),
    IsNull(Box<Expr>),
    IsNotNull(Box<Expr>),

    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
    },

    Function {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn is_operand(&self) -> bool {
        matches!(self, Expr::Literal(_) | Expr::Placeholder(_))
    }

    /// Visits every placeholder in textual order.
    pub fn for_each_placeholder(&self, f: &mut impl FnMut(&str)) {
        match self {
            Expr::Placeholder(name) => f(name),
            Expr::Column(_) | Expr::QualifiedColumn { .. } | Expr::Literal(_) => {}
            Expr::BinaryOp { left, right, .. } => {
                left.for_each_placeholder(f);
                right.for_each_placeholder(f);
            }
            Expr::Negate(inner) | Expr::Not(inner) | Expr::IsNull(inner) | Expr::IsNotNull(inner) => {
                inner.for_each_placeholder(f)
            }
            Expr::Between { expr, low, high } => {
                expr.for_each_placeholder(f);
                low.for_each_placeholder(f);
                high.for_each_placeholder(f);
            }
            Expr::InList { expr, list } => {
                expr.for_each_placeholder(f);
                for item in list {
                    item.for_each_placeholder(f);
                }
            }
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.for_each_placeholder(f);
                }
            }
        }
    }

    pub fn placeholder_count(&self) -> usize {
        let mut count = 0;
        self.for_each_placeholder(&mut |_| count += 1);
        count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Like,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Like => "LIKE",
        };
        f.write_str(symbol)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => f.write_str(name),
            Expr::QualifiedColumn { table, column } => write!(f, "{}.{}", table, column),
            Expr::Literal(lit) => f.write_str(&lit.text),
            Expr::Placeholder(name) => f.write_str(name),
            Expr::BinaryOp { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Expr::Negate(inner) => write!(f, "-{}", inner),
            Expr::Not(inner) => write!(f, "NOT {}", inner),
            Expr::IsNull(inner) => write!(f, "{} IS NULL", inner),
            Expr::IsNotNull(inner) => write!(f, "{} IS NOT NULL", inner),
            Expr::Between { expr, low, high } => {
                write!(f, "{} BETWEEN {} AND {}", expr, low, high)
            }
            Expr::InList { expr, list } => {
                write!(f, "{} IN (", expr)?;
                write_list(f, list)?;
                f.write_str(")")
            }
            Expr::Function { name, args } => {
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for SelectColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alias = match self {
            SelectColumn::Star => return f.write_str("*"),
            SelectColumn::Column { name, alias } => {
                f.write_str(name)?;
                alias
            }
            SelectColumn::Function { name, args, alias } => {
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                f.write_str(")")?;
                alias
            }
            SelectColumn::Expression { expr, alias } => {
                write!(f, "{}", expr)?;
                alias
            }
        };
        match alias {
            Some(alias) => write!(f, " AS {}", alias),
            None => Ok(()),
        }
    }
}
