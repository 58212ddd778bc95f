use crate::ast::*;
use crate::error::{SqlError, SqlResult};
use crate::lexer::{SqlLexer, Token};

/// Recursive-descent parser over the token stream of a single statement.
pub struct SqlParser {
    tokens: Vec<Token>,
    position: usize,
}

impl SqlParser {
    pub fn new(input: &str) -> SqlResult<Self> {
        let mut lexer = SqlLexer::new(input);
        let tokens = lexer.tokenize()?;

        Ok(Self {
            tokens,
            position: 0,
        })
    }

    fn current_token(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    /// Consumes the current token if it matches.
    fn accept(&mut self, expected: &Token) -> bool {
        if self.current_token() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> SqlResult<()> {
        if self.accept(&expected) {
            Ok(())
        } else {
            Err(SqlError::ParseError(format!(
                "Expected {:?}, found {:?}",
                expected,
                self.current_token()
            )))
        }
    }

    fn expect_identifier(&mut self) -> SqlResult<String> {
        match self.current_token().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(SqlError::ParseError(format!(
                "Expected identifier, found {:?}",
                other
            ))),
        }
    }

    /// `a.b.c` joined with dots.
    fn expect_dotted_identifier(&mut self) -> SqlResult<String> {
        let mut name = self.expect_identifier()?;
        while self.accept(&Token::Dot) {
            name.push('.');
            name.push_str(&self.expect_identifier()?);
        }
        Ok(name)
    }

    pub fn parse(&mut self) -> SqlResult<Statement> {
        let stmt = match self.current_token() {
            Token::Select => Statement::Select(self.parse_select()?),
            Token::Insert => self.parse_insert()?,
            Token::Update => self.parse_update()?,
            Token::Delete => self.parse_delete()?,
            Token::Create => self.parse_create()?,
            Token::Drop => self.parse_drop()?,
            other => {
                return Err(SqlError::ParseError(format!(
                    "Unexpected token at start of statement: {:?}",
                    other
                )));
            }
        };

        self.accept(&Token::Semicolon);
        if *self.current_token() != Token::Eof {
            return Err(SqlError::ParseError(format!(
                "Unexpected token after end of statement: {:?}",
                self.current_token()
            )));
        }

        Ok(stmt)
    }

    fn parse_select(&mut self) -> SqlResult<SelectStatement> {
        self.expect(Token::Select)?;

        let columns = self.parse_select_columns()?;

        self.expect(Token::From)?;
        let from = if self.accept(&Token::LeftParen) {
            let query = self.parse_select()?;
            self.expect(Token::RightParen)?;
            TableSource::Subquery {
                query: Box::new(query),
                alias: self.parse_optional_alias()?,
            }
        } else {
            TableSource::Table {
                selector: self.parse_table_selector()?,
                alias: self.parse_optional_alias()?,
            }
        };

        let where_clause = self.parse_optional_where()?;

        let order_by = if self.accept(&Token::Order) {
            self.expect(Token::By)?;
            self.parse_order_by_list()?
        } else {
            Vec::new()
        };

        let limit = if self.accept(&Token::Limit) {
            Some(self.parse_primary_expression()?)
        } else {
            None
        };

        let offset = if self.accept(&Token::Offset) {
            Some(self.parse_primary_expression()?)
        } else {
            None
        };

        Ok(SelectStatement {
            columns,
            from,
            where_clause,
            order_by,
            limit,
            offset,
        })
    }

    /// `name [ '[' field = operand ']' ] { . name [ '[' ... ']' ] }`
    fn parse_table_selector(&mut self) -> SqlResult<TableSelector> {
        let name = self.expect_identifier()?;

        let key = if self.accept(&Token::LeftBracket) {
            let field = self.expect_identifier()?;
            self.expect(Token::Equal)?;
            let value = self.parse_primary_expression()?;
            self.expect(Token::RightBracket)?;
            Some(KeySelector { field, value })
        } else {
            None
        };

        let child = if self.accept(&Token::Dot) {
            Some(Box::new(self.parse_table_selector()?))
        } else {
            None
        };

        Ok(TableSelector { name, key, child })
    }

    fn parse_optional_where(&mut self) -> SqlResult<Option<Expr>> {
        if self.accept(&Token::Where) {
            Ok(Some(self.parse_expression()?))
        } else {
            Ok(None)
        }
    }

    fn parse_select_columns(&mut self) -> SqlResult<Vec<SelectColumn>> {
        let mut columns = Vec::new();

        loop {
            columns.push(self.parse_select_column()?);
            if !self.accept(&Token::Comma) {
                break;
            }
        }

        Ok(columns)
    }

    fn parse_select_column(&mut self) -> SqlResult<SelectColumn> {
        if self.accept(&Token::Star) {
            return Ok(SelectColumn::Star);
        }

        let expr = self.parse_expression()?;
        let alias = self.parse_optional_alias()?;

        Ok(match expr {
            Expr::Column(name) => SelectColumn::Column { name, alias },
            Expr::QualifiedColumn { table, column } => SelectColumn::Column {
                name: format!("{}.{}", table, column),
                alias,
            },
            Expr::Function { name, args } => SelectColumn::Function { name, args, alias },
            expr => SelectColumn::Expression { expr, alias },
        })
    }

    fn parse_optional_alias(&mut self) -> SqlResult<Option<String>> {
        if self.accept(&Token::As) {
            return Ok(Some(self.expect_identifier()?));
        }
        if let Token::Identifier(name) = self.current_token() {
            let alias = name.clone();
            self.advance();
            return Ok(Some(alias));
        }
        Ok(None)
    }

    fn parse_identifier_list(&mut self) -> SqlResult<Vec<String>> {
        let mut list = Vec::new();

        loop {
            list.push(self.expect_dotted_identifier()?);
            if !self.accept(&Token::Comma) {
                break;
            }
        }

        Ok(list)
    }

    fn parse_order_by_list(&mut self) -> SqlResult<Vec<OrderByItem>> {
        let mut items = Vec::new();

        loop {
            let column = self.expect_dotted_identifier()?;

            let descending = if self.accept(&Token::Desc) {
                true
            } else {
                self.accept(&Token::Asc);
                false
            };

            items.push(OrderByItem { column, descending });

            if !self.accept(&Token::Comma) {
                break;
            }
        }

        Ok(items)
    }

    fn parse_expression_list(&mut self) -> SqlResult<Vec<Expr>> {
        let mut exprs = Vec::new();

        loop {
            exprs.push(self.parse_expression()?);
            if !self.accept(&Token::Comma) {
                break;
            }
        }

        Ok(exprs)
    }

    fn parse_expression(&mut self) -> SqlResult<Expr> {
        self.parse_or_expression()
    }

    fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    fn parse_or_expression(&mut self) -> SqlResult<Expr> {
        let mut left = self.parse_and_expression()?;

        while self.accept(&Token::Or) {
            let right = self.parse_and_expression()?;
            left = Self::binary(left, BinaryOp::Or, right);
        }

        Ok(left)
    }

    fn parse_and_expression(&mut self) -> SqlResult<Expr> {
        let mut left = self.parse_not_expression()?;

        while self.accept(&Token::And) {
            let right = self.parse_not_expression()?;
            left = Self::binary(left, BinaryOp::And, right);
        }

        Ok(left)
    }

    fn parse_not_expression(&mut self) -> SqlResult<Expr> {
        if self.accept(&Token::Not) {
            let expr = self.parse_not_expression()?;
            return Ok(Expr::Not(Box::new(expr)));
        }

        self.parse_comparison_expression()
    }

    fn parse_comparison_expression(&mut self) -> SqlResult<Expr> {
        let left = self.parse_additive_expression()?;

        if self.accept(&Token::Is) {
            let negated = self.accept(&Token::Not);
            self.expect(Token::Null)?;
            return Ok(if negated {
                Expr::IsNotNull(Box::new(left))
            } else {
                Expr::IsNull(Box::new(left))
            });
        }

        if self.accept(&Token::Between) {
            let low = self.parse_additive_expression()?;
            self.expect(Token::And)?;
            let high = self.parse_additive_expression()?;
            return Ok(Expr::Between {
                expr: Box::new(left),
                low: Box::new(low),
                high: Box::new(high),
            });
        }

        if self.accept(&Token::In) {
            self.expect(Token::LeftParen)?;
            let list = self.parse_expression_list()?;
            self.expect(Token::RightParen)?;
            return Ok(Expr::InList {
                expr: Box::new(left),
                list,
            });
        }

        let op = match self.current_token() {
            Token::Equal => BinaryOp::Eq,
            Token::NotEqual => BinaryOp::NotEq,
            Token::LessThan => BinaryOp::Lt,
            Token::LessThanEq => BinaryOp::LtEq,
            Token::GreaterThan => BinaryOp::Gt,
            Token::GreaterThanEq => BinaryOp::GtEq,
            Token::Like => BinaryOp::Like,
            _ => return Ok(left),
        };

        self.advance();
        let right = self.parse_additive_expression()?;
        Ok(Self::binary(left, op, right))
    }

    fn parse_additive_expression(&mut self) -> SqlResult<Expr> {
        let mut left = self.parse_multiplicative_expression()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOp::Plus,
                Token::Minus => BinaryOp::Minus,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative_expression()?;
            left = Self::binary(left, op, right);
        }

        Ok(left)
    }

    fn parse_multiplicative_expression(&mut self) -> SqlResult<Expr> {
        let mut left = self.parse_primary_expression()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOp::Multiply,
                Token::Slash => BinaryOp::Divide,
                Token::Percent => BinaryOp::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_primary_expression()?;
            left = Self::binary(left, op, right);
        }

        Ok(left)
    }

    fn parse_primary_expression(&mut self) -> SqlResult<Expr> {
        let token = self.current_token().clone();
        self.advance();

        match token {
            Token::Number(text) => {
                let kind = if text.contains('.') {
                    LiteralKind::Float
                } else {
                    LiteralKind::Integer
                };
                Ok(Expr::Literal(Literal::new(kind, text)))
            }
            Token::String(text) => Ok(Expr::Literal(Literal::new(LiteralKind::String, text))),
            Token::True => Ok(Expr::Literal(Literal::new(LiteralKind::Boolean, "true"))),
            Token::False => Ok(Expr::Literal(Literal::new(LiteralKind::Boolean, "false"))),
            Token::Null => Ok(Expr::Literal(Literal::new(LiteralKind::Null, "NULL"))),
            Token::Placeholder(name) => Ok(Expr::Placeholder(name)),
            Token::Minus => match self.parse_primary_expression()? {
                Expr::Literal(Literal {
                    kind: kind @ (LiteralKind::Integer | LiteralKind::Float),
                    text,
                }) => Ok(Expr::Literal(Literal::new(kind, format!("-{}", text)))),
                other => Ok(Expr::Negate(Box::new(other))),
            },
            Token::LeftParen => {
                let expr = self.parse_expression()?;
                self.expect(Token::RightParen)?;
                Ok(expr)
            }
            Token::Identifier(name) => {
                if self.accept(&Token::LeftParen) {
                    let args = if self.accept(&Token::Star) {
                        vec![Expr::Column("*".to_string())]
                    } else if *self.current_token() == Token::RightParen {
                        Vec::new()
                    } else {
                        self.parse_expression_list()?
                    };
                    self.expect(Token::RightParen)?;
                    return Ok(Expr::Function { name, args });
                }

                if self.accept(&Token::Dot) {
                    let column = self.expect_dotted_identifier()?;
                    return Ok(Expr::QualifiedColumn {
                        table: name,
                        column,
                    });
                }

                Ok(Expr::Column(name))
            }
            other => Err(SqlError::ParseError(format!(
                "Unexpected token in expression: {:?}",
                other
            ))),
        }
    }

    fn parse_insert(&mut self) -> SqlResult<Statement> {
        self.expect(Token::Insert)?;
        self.expect(Token::Into)?;

        let table = self.parse_table_selector()?;

        let columns = if self.accept(&Token::LeftParen) {
            let cols = self.parse_identifier_list()?;
            self.expect(Token::RightParen)?;
            Some(cols)
        } else {
            None
        };

        self.expect(Token::Values)?;

        let mut values = Vec::new();
        loop {
            self.expect(Token::LeftParen)?;
            values.push(self.parse_expression_list()?);
            self.expect(Token::RightParen)?;

            if !self.accept(&Token::Comma) {
                break;
            }
        }

        Ok(Statement::Insert(InsertStatement {
            table,
            columns,
            values,
        }))
    }

    fn parse_update(&mut self) -> SqlResult<Statement> {
        self.expect(Token::Update)?;

        let table = self.parse_table_selector()?;

        self.expect(Token::Set)?;

        let mut assignments = Vec::new();
        loop {
            let column = self.expect_dotted_identifier()?;
            self.expect(Token::Equal)?;
            let value = self.parse_expression()?;
            assignments.push((column, value));

            if !self.accept(&Token::Comma) {
                break;
            }
        }

        let where_clause = self.parse_optional_where()?;

        Ok(Statement::Update(UpdateStatement {
            table,
            assignments,
            where_clause,
        }))
    }

    fn parse_delete(&mut self) -> SqlResult<Statement> {
        self.expect(Token::Delete)?;
        self.expect(Token::From)?;

        let table = self.parse_table_selector()?;
        let where_clause = self.parse_optional_where()?;

        Ok(Statement::Delete(DeleteStatement {
            table,
            where_clause,
        }))
    }

    fn parse_create(&mut self) -> SqlResult<Statement> {
        self.expect(Token::Create)?;

        if self.accept(&Token::Table) {
            let if_not_exists = if self.accept(&Token::If) {
                self.expect(Token::Not)?;
                self.expect(Token::Exists)?;
                true
            } else {
                false
            };
            let name = self.expect_identifier()?;
            if *self.current_token() == Token::LeftParen {
                self.skip_parenthesized()?;
            }
            return Ok(Statement::CreateTable(CreateTableStatement {
                name,
                if_not_exists,
            }));
        }

        let unique = self.accept(&Token::Unique);
        self.expect(Token::Index)?;
        let name = self.expect_identifier()?;
        self.expect(Token::On)?;
        let table = self.expect_identifier()?;
        self.expect(Token::LeftParen)?;
        let columns = self.parse_identifier_list()?;
        self.expect(Token::RightParen)?;

        Ok(Statement::CreateIndex(CreateIndexStatement {
            name,
            table,
            columns,
            unique,
        }))
    }

    fn parse_drop(&mut self) -> SqlResult<Statement> {
        self.expect(Token::Drop)?;

        if self.accept(&Token::Index) {
            let name = self.expect_identifier()?;
            self.expect(Token::On)?;
            let table = self.expect_identifier()?;
            return Ok(Statement::DropIndex(DropIndexStatement { name, table }));
        }

        self.expect(Token::Table)?;
        let if_exists = if self.accept(&Token::If) {
            self.expect(Token::Exists)?;
            true
        } else {
            false
        };
        let name = self.expect_identifier()?;

        Ok(Statement::DropTable(DropTableStatement { name, if_exists }))
    }

    /// Column definitions carry no meaning for a schemaless store.
    fn skip_parenthesized(&mut self) -> SqlResult<()> {
        self.expect(Token::LeftParen)?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.current_token() {
                Token::LeftParen => depth += 1,
                Token::RightParen => depth -= 1,
                Token::Eof => return Err(SqlError::Unterminated("column definition list")),
                _ => {}
            }
            self.advance();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Statement {
        SqlParser::new(input).unwrap().parse().unwrap()
    }

    fn parse_err(input: &str) -> SqlError {
        SqlParser::new(input).and_then(|mut p| p.parse()).unwrap_err()
    }

    fn lit(kind: LiteralKind, text: &str) -> Expr {
        Expr::Literal(Literal::new(kind, text))
    }

    #[test]
    fn test_simple_select() {
        let stmt = parse("SELECT * FROM users");
        if let Statement::Select(s) = stmt {
            assert_eq!(s.columns, vec![SelectColumn::Star]);
            assert_eq!(
                s.from,
                TableSource::Table {
                    selector: TableSelector::named("users"),
                    alias: None
                }
            );
        } else {
            panic!("Expected SELECT statement");
        }
    }

    #[test]
    fn test_select_columns_and_alias() {
        let stmt = parse("SELECT u.name AS n, age FROM users u");
        if let Statement::Select(s) = stmt {
            assert_eq!(
                s.columns[0],
                SelectColumn::Column {
                    name: "u.name".to_string(),
                    alias: Some("n".to_string())
                }
            );
            assert_eq!(s.from.alias(), Some("u"));
        } else {
            panic!("Expected SELECT statement");
        }
    }

    #[test]
    fn test_select_with_where_placeholder() {
        let stmt = parse("SELECT * FROM users WHERE age > ?");
        if let Statement::Select(s) = stmt {
            assert_eq!(
                s.where_clause,
                Some(Expr::BinaryOp {
                    left: Box::new(Expr::Column("age".to_string())),
                    op: BinaryOp::Gt,
                    right: Box::new(Expr::Placeholder("?".to_string())),
                })
            );
        } else {
            panic!("Expected SELECT statement");
        }
    }

    #[test]
    fn test_select_with_order_limit_offset() {
        let stmt = parse("SELECT * FROM users ORDER BY name ASC, age DESC LIMIT 10 OFFSET ?");
        if let Statement::Select(s) = stmt {
            assert_eq!(s.order_by.len(), 2);
            assert!(!s.order_by[0].descending);
            assert!(s.order_by[1].descending);
            assert_eq!(s.limit, Some(lit(LiteralKind::Integer, "10")));
            assert_eq!(s.offset, Some(Expr::Placeholder("?".to_string())));
        } else {
            panic!("Expected SELECT statement");
        }
    }

    #[test]
    fn test_select_subquery_source() {
        let stmt = parse("SELECT x FROM (SELECT a AS x FROM t WHERE a > 1) sub");
        if let Statement::Select(s) = stmt {
            match s.from {
                TableSource::Subquery { query, alias } => {
                    assert_eq!(alias.as_deref(), Some("sub"));
                    assert!(query.where_clause.is_some());
                }
                other => panic!("Expected subquery source, got {:?}", other),
            }
        } else {
            panic!("Expected SELECT statement");
        }
    }

    #[test]
    fn test_path_selector() {
        let stmt = parse("SELECT * FROM orders[id = ?].items");
        if let Statement::Select(s) = stmt {
            let TableSource::Table { selector, .. } = s.from else {
                panic!("Expected table source");
            };
            assert_eq!(selector.name, "orders");
            let key = selector.key.expect("key selector");
            assert_eq!(key.field, "id");
            assert_eq!(key.value, Expr::Placeholder("?".to_string()));
            assert_eq!(selector.child.expect("child").name, "items");
        } else {
            panic!("Expected SELECT statement");
        }
    }

    #[test]
    fn test_negative_literal() {
        let stmt = parse("SELECT * FROM t WHERE a > -5");
        if let Statement::Select(s) = stmt {
            let Some(Expr::BinaryOp { right, .. }) = s.where_clause else {
                panic!("Expected comparison");
            };
            assert_eq!(*right, lit(LiteralKind::Integer, "-5"));
        } else {
            panic!("Expected SELECT statement");
        }
    }

    #[test]
    fn test_insert() {
        let stmt = parse("INSERT INTO users (id, name) VALUES ('k1', 'Alice'), (?, ?)");
        if let Statement::Insert(s) = stmt {
            assert_eq!(s.table, TableSelector::named("users"));
            assert_eq!(s.columns, Some(vec!["id".to_string(), "name".to_string()]));
            assert_eq!(s.values.len(), 2);
            assert_eq!(s.values[0][1], lit(LiteralKind::String, "'Alice'"));
        } else {
            panic!("Expected INSERT statement");
        }
    }

    #[test]
    fn test_update() {
        let stmt = parse("UPDATE users SET age = 31, active = true WHERE id = 'k1';");
        if let Statement::Update(s) = stmt {
            assert_eq!(s.assignments.len(), 2);
            assert_eq!(s.assignments[1].1, lit(LiteralKind::Boolean, "true"));
            assert!(s.where_clause.is_some());
        } else {
            panic!("Expected UPDATE statement");
        }
    }

    #[test]
    fn test_delete() {
        let stmt = parse("DELETE FROM users WHERE age < 18");
        if let Statement::Delete(s) = stmt {
            assert_eq!(s.table.name, "users");
            assert!(s.where_clause.is_some());
        } else {
            panic!("Expected DELETE statement");
        }
    }

    #[test]
    fn test_create_table_skips_columns() {
        let stmt = parse("CREATE TABLE IF NOT EXISTS users (id STRING, tags ARRAY(STRING))");
        assert_eq!(
            stmt,
            Statement::CreateTable(CreateTableStatement {
                name: "users".to_string(),
                if_not_exists: true,
            })
        );
    }

    #[test]
    fn test_drop_table() {
        assert_eq!(
            parse("DROP TABLE IF EXISTS users"),
            Statement::DropTable(DropTableStatement {
                name: "users".to_string(),
                if_exists: true,
            })
        );
    }

    #[test]
    fn test_create_and_drop_index() {
        assert_eq!(
            parse("CREATE UNIQUE INDEX by_email ON users (email, name)"),
            Statement::CreateIndex(CreateIndexStatement {
                name: "by_email".to_string(),
                table: "users".to_string(),
                columns: vec!["email".to_string(), "name".to_string()],
                unique: true,
            })
        );
        assert_eq!(
            parse("DROP INDEX email ON users"),
            Statement::DropIndex(DropIndexStatement {
                name: "email".to_string(),
                table: "users".to_string(),
            })
        );
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let err = parse_err("SELECT * FROM users users2 extra");
        assert!(matches!(err, SqlError::ParseError(_)));
    }

    #[test]
    fn test_unknown_statement() {
        let err = parse_err("GRANT ALL ON users");
        assert!(err.to_string().contains("Unexpected token at start of statement"));
    }

    #[test]
    fn test_function_projection() {
        let stmt = parse("SELECT COUNT(*) AS total FROM users");
        if let Statement::Select(s) = stmt {
            if let SelectColumn::Function { name, alias, .. } = &s.columns[0] {
                assert_eq!(name, "COUNT");
                assert_eq!(alias.as_deref(), Some("total"));
            } else {
                panic!("Expected function column");
            }
        } else {
            panic!("Expected SELECT statement");
        }
    }
}
