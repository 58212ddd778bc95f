use crate::error::{SqlError, SqlResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Statement keywords
    Select,
    From,
    Where,
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    Create,
    Drop,
    Table,
    Index,
    Unique,
    If,
    Exists,
    On,

    // Clauses
    Order,
    By,
    Limit,
    Offset,
    As,

    // Logical
    And,
    Or,
    Not,

    // Comparison
    Is,
    Null,
    Between,
    Like,
    In,

    // Boolean
    True,
    False,

    // Sort direction
    Asc,
    Desc,

    // Literals and identifiers. Literal tokens keep their source text;
    // decoding is left to the evaluator.
    Identifier(String),
    Number(String),
    String(String),
    Placeholder(String), // ? or $n

    // Operators
    Equal,         // =
    NotEqual,      // != or <>
    LessThan,      // <
    LessThanEq,    // <=
    GreaterThan,   // >
    GreaterThanEq, // >=
    Plus,          // +
    Minus,         // -
    Star,          // *
    Slash,         // /
    Percent,       // %

    // Delimiters
    Comma,        // ,
    Dot,          // .
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]
    Semicolon,    // ;

    Eof,
}

pub struct SqlLexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
}

impl SqlLexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Self {
            input: chars,
            position: 0,
            current_char,
        }
    }

    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn slice(&self, start: usize) -> String {
        self.input[start..self.position].iter().collect()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.current_char {
            self.advance();
            if ch == '\n' {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self) -> SqlResult<()> {
        self.advance(); // /
        self.advance(); // *
        while let Some(ch) = self.current_char {
            if ch == '*' && self.peek() == Some('/') {
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }
        Err(SqlError::Unterminated("block comment"))
    }

    fn read_number(&mut self) -> Token {
        let start = self.position;
        let mut has_dot = false;

        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() {
                self.advance();
            } else if ch == '.' && !has_dot && self.peek().is_some_and(|c| c.is_ascii_digit()) {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        Token::Number(self.slice(start))
    }

    /// Scans a quoted literal and returns it with its quotes. Doubled quotes
    /// and backslash escapes do not end the literal.
    fn read_string(&mut self) -> SqlResult<Token> {
        let start = self.position;
        let quote = self.current_char;
        self.advance();

        while let Some(ch) = self.current_char {
            if ch == '\\' {
                self.advance();
                self.advance();
            } else if Some(ch) == quote {
                if self.peek() == quote {
                    self.advance();
                    self.advance();
                } else {
                    self.advance();
                    return Ok(Token::String(self.slice(start)));
                }
            } else {
                self.advance();
            }
        }

        Err(SqlError::Unterminated("string literal"))
    }

    fn read_identifier(&mut self) -> Token {
        let start = self.position;

        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let ident = self.slice(start);
        match ident.to_uppercase().as_str() {
            "SELECT" => Token::Select,
            "FROM" => Token::From,
            "WHERE" => Token::Where,
            "INSERT" => Token::Insert,
            "INTO" => Token::Into,
            "VALUES" => Token::Values,
            "UPDATE" => Token::Update,
            "SET" => Token::Set,
            "DELETE" => Token::Delete,
            "CREATE" => Token::Create,
            "DROP" => Token::Drop,
            "TABLE" => Token::Table,
            "INDEX" => Token::Index,
            "UNIQUE" => Token::Unique,
            "IF" => Token::If,
            "EXISTS" => Token::Exists,
            "ON" => Token::On,
            "ORDER" => Token::Order,
            "BY" => Token::By,
            "LIMIT" => Token::Limit,
            "OFFSET" => Token::Offset,
            "AS" => Token::As,
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            "IS" => Token::Is,
            "NULL" => Token::Null,
            "BETWEEN" => Token::Between,
            "LIKE" => Token::Like,
            "IN" => Token::In,
            "TRUE" => Token::True,
            "FALSE" => Token::False,
            "ASC" => Token::Asc,
            "DESC" => Token::Desc,
            _ => Token::Identifier(ident),
        }
    }

    fn read_placeholder(&mut self) -> Token {
        let start = self.position;
        if self.current_char == Some('$') {
            self.advance();
            while self.current_char.is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        } else {
            self.advance();
        }
        Token::Placeholder(self.slice(start))
    }

    pub fn next_token(&mut self) -> SqlResult<Token> {
        loop {
            self.skip_whitespace();

            match self.current_char {
                Some('-') if self.peek() == Some('-') => self.skip_line_comment(),
                Some('/') if self.peek() == Some('*') => self.skip_block_comment()?,
                _ => break,
            }
        }

        let token = match self.current_char {
            None => Token::Eof,

            Some(ch) if ch.is_ascii_digit() => return Ok(self.read_number()),
            Some('\'') | Some('"') => return self.read_string(),
            Some(ch) if ch.is_alphabetic() || ch == '_' => return Ok(self.read_identifier()),
            Some('?') | Some('$') => return Ok(self.read_placeholder()),

            Some('=') => {
                self.advance();
                Token::Equal
            }
            Some('!') => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::NotEqual
                } else {
                    Token::Not
                }
            }
            Some('<') => {
                self.advance();
                match self.current_char {
                    Some('=') => {
                        self.advance();
                        Token::LessThanEq
                    }
                    Some('>') => {
                        self.advance();
                        Token::NotEqual
                    }
                    _ => Token::LessThan,
                }
            }
            Some('>') => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::GreaterThanEq
                } else {
                    Token::GreaterThan
                }
            }

            Some(ch) => {
                let token = match ch {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    ',' => Token::Comma,
                    '.' => Token::Dot,
                    '(' => Token::LeftParen,
                    ')' => Token::RightParen,
                    '[' => Token::LeftBracket,
                    ']' => Token::RightBracket,
                    ';' => Token::Semicolon,
                    other => {
                        return Err(SqlError::ParseError(format!(
                            "Unexpected character: {}",
                            other
                        )))
                    }
                };
                self.advance();
                token
            }
        };

        Ok(token)
    }

    pub fn tokenize(&mut self) -> SqlResult<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }

        Ok(tokens)
    }
}
