use std::cell::Cell;

use crate::ast::{BinaryOp, Expr, Program, Stmt, UnaryOp};
use crate::token::{Token, TokenKind};

type Result<T> = std::result::Result<T, ParseError>;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        // Guarantee the Eof sentinel so lookahead can never run off the end.
        if tokens.last().map_or(true, |t| t.kind != TokenKind::Eof) {
            let offset = tokens.last().map_or(0, |t| t.offset + t.text.len());
            tokens.push(Token::eof(offset));
        }
        Self { tokens, pos: 0 }
    }

    /// Parses the whole token stream into a program. No error recovery: the
    /// first malformed construct aborts.
    pub fn parse_program(mut self) -> Result<Program> {
        let mut body = Vec::new();
        while self.peek().kind != TokenKind::Eof {
            body.push(self.statement()?);
        }
        Ok(Program { body })
    }

    fn statement(&mut self) -> Result<Stmt> {
        if self.check_keyword("let") {
            return self.let_statement();
        }
        if self.check_keyword("if") {
            return self.if_statement();
        }
        if self.check_keyword("while") {
            return self.while_statement();
        }
        if self.check_keyword("fn") {
            return self.function_statement();
        }
        if self.check_op("{") {
            return Ok(Stmt::Block(self.block()?));
        }
        if self.check_keyword("return") {
            return self.return_statement();
        }
        if self.check_keyword("break") {
            self.advance();
            self.eat_op(";");
            return Ok(Stmt::Break);
        }
        if self.check_keyword("continue") {
            self.advance();
            self.eat_op(";");
            return Ok(Stmt::Continue);
        }
        if self.check_keyword("new") {
            return self.construct_statement();
        }
        if self.check_keyword("require") {
            return self.include_statement();
        }

        let expr = self.expression()?;
        self.eat_op(";");
        Ok(Stmt::Expression(expr))
    }

    fn let_statement(&mut self) -> Result<Stmt> {
        self.advance();
        let name = self.expect_binding_name()?;
        let init = if self.eat_op("=") {
            Some(self.expression()?)
        } else {
            None
        };
        self.eat_op(";");
        Ok(Stmt::Let { name, init })
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.advance();
        self.expect_op("(")?;
        let test = self.expression()?;
        self.expect_op(")")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.check_keyword("else") {
            self.advance();
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.advance();
        self.expect_op("(")?;
        let test = self.expression()?;
        self.expect_op(")")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { test, body })
    }

    fn function_statement(&mut self) -> Result<Stmt> {
        self.advance();
        let name = if self.peek().kind == TokenKind::Identifier {
            Some(self.expect_binding_name()?)
        } else {
            None
        };
        let parameters = self.parameter_list()?;
        let body = self.block()?;
        Ok(Stmt::Function {
            name,
            parameters,
            body,
        })
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        self.advance();
        if self.eat_op(";") {
            return Ok(Stmt::Return(None));
        }
        // a closing brace also ends a value-less return
        if self.check_op("}") {
            return Ok(Stmt::Return(None));
        }
        let value = self.expression()?;
        self.eat_op(";");
        Ok(Stmt::Return(Some(value)))
    }

    fn construct_statement(&mut self) -> Result<Stmt> {
        self.advance();
        let (class_name, args) = self.construct_parts()?;
        self.eat_op(";");
        Ok(Stmt::Construct {
            class_name,
            args,
            constructed: Cell::new(false),
        })
    }

    fn include_statement(&mut self) -> Result<Stmt> {
        self.advance();
        self.expect_op("(")?;
        let path = self.expression()?;
        self.expect_op(")")?;
        self.eat_op(";");
        Ok(Stmt::Include(path))
    }

    fn block(&mut self) -> Result<Vec<Stmt>> {
        let open = self.expect_op("{")?;
        let mut body = Vec::new();
        while !self.check_op("}") {
            if self.peek().kind == TokenKind::Eof {
                return Err(ParseError::UnterminatedBlock {
                    offset: open.offset,
                });
            }
            body.push(self.statement()?);
        }
        self.advance();
        Ok(body)
    }

    // Expressions, by precedence level from lowest to highest.
    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        let left = self.logic_or()?;
        if self.check_op("=") {
            let offset = self.peek().offset;
            self.advance();
            let value = Box::new(self.assignment()?);
            return match left {
                Expr::Variable { name } => Ok(Expr::Assign { name, value }),
                _ => Err(ParseError::InvalidAssignmentTarget { offset }),
            };
        }
        Ok(left)
    }

    fn logic_or(&mut self) -> Result<Expr> {
        self.binary_level(Self::logic_and, &[("||", BinaryOp::Or), ("or", BinaryOp::Or)])
    }

    fn logic_and(&mut self) -> Result<Expr> {
        self.binary_level(
            Self::equality,
            &[("&&", BinaryOp::And), ("and", BinaryOp::And)],
        )
    }

    fn equality(&mut self) -> Result<Expr> {
        self.binary_level(
            Self::comparison,
            &[
                ("==", BinaryOp::Eq),
                ("!=", BinaryOp::Ne),
                ("isnt", BinaryOp::Ne),
            ],
        )
    }

    fn comparison(&mut self) -> Result<Expr> {
        self.binary_level(
            Self::term,
            &[
                ("<", BinaryOp::Lt),
                (">", BinaryOp::Gt),
                ("<=", BinaryOp::Le),
                (">=", BinaryOp::Ge),
            ],
        )
    }

    fn term(&mut self) -> Result<Expr> {
        self.binary_level(
            Self::factor,
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
        )
    }

    fn factor(&mut self) -> Result<Expr> {
        self.binary_level(
            Self::unary,
            &[
                ("*", BinaryOp::Mul),
                ("/", BinaryOp::Div),
                ("%", BinaryOp::Rem),
            ],
        )
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = if self.check_op("-") {
            Some(UnaryOp::Neg)
        } else if self.check_op("!") {
            Some(UnaryOp::Not)
        } else {
            None
        };
        if let Some(op) = op {
            self.advance();
            let operand = Box::new(self.unary()?);
            return Ok(Expr::Unary { op, operand });
        }
        self.postfix()
    }

    /// Call and index postfix chains, left-associative: `f(a)(b)[0]`.
    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.check_op("(") {
                self.advance();
                let args = self.argument_list(")")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else if self.check_op("[") {
                self.advance();
                let index = Box::new(self.expression()?);
                self.expect_op("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number => {
                self.advance();
                token
                    .text
                    .parse()
                    .map(Expr::Number)
                    .map_err(|_| ParseError::InvalidNumber {
                        text: token.text,
                        offset: token.offset,
                    })
            }
            TokenKind::Str => {
                self.advance();
                Ok(Expr::Text(token.text))
            }
            TokenKind::Keyword if token.text == "true" || token.text == "false" => {
                self.advance();
                Ok(Expr::Bool(token.text == "true"))
            }
            TokenKind::Keyword if token.text == "fn" => {
                self.advance();
                let parameters = self.parameter_list()?;
                let body = self.block()?;
                Ok(Expr::Function { parameters, body })
            }
            TokenKind::Keyword if token.text == "require" => {
                self.advance();
                self.expect_op("(")?;
                let path = Box::new(self.expression()?);
                self.expect_op(")")?;
                Ok(Expr::Include { path })
            }
            TokenKind::Keyword if token.text == "new" => {
                self.advance();
                let (class_name, args) = self.construct_parts()?;
                Ok(Expr::Construct { class_name, args })
            }
            TokenKind::Op if token.text == "(" => {
                self.advance();
                let expr = self.expression()?;
                self.expect_op(")")?;
                Ok(expr)
            }
            TokenKind::Op if token.text == "[" => {
                self.advance();
                let elements = self.argument_list("]")?;
                Ok(Expr::Array(elements))
            }
            TokenKind::Identifier => {
                self.advance();
                Ok(path_expr(&token.text))
            }
            _ => Err(ParseError::NotExpression {
                found: token.text,
                offset: token.offset,
            }),
        }
    }

    // Helper functions
    fn binary_level<F>(&mut self, mut parse_operand: F, operators: &[(&str, BinaryOp)]) -> Result<Expr>
    where
        F: FnMut(&mut Self) -> Result<Expr>,
    {
        let mut expr = parse_operand(self)?;

        loop {
            let token = self.peek();
            if !matches!(token.kind, TokenKind::Op | TokenKind::Keyword) {
                break;
            }
            let Some(&(_, op)) = operators.iter().find(|(text, _)| *text == token.text) else {
                break;
            };
            self.advance();
            let right = parse_operand(self)?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    /// Comma-separated expressions up to `close`. A missing comma simply
    /// ends the list; a trailing comma is tolerated.
    fn argument_list(&mut self, close: &'static str) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        while !self.check_op(close) {
            args.push(self.expression()?);
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op(close)?;
        Ok(args)
    }

    fn parameter_list(&mut self) -> Result<Vec<String>> {
        self.expect_op("(")?;
        let mut parameters = Vec::new();
        while !self.check_op(")") {
            parameters.push(self.expect_binding_name()?);
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op(")")?;
        Ok(parameters)
    }

    fn construct_parts(&mut self) -> Result<(String, Vec<Expr>)> {
        let class_name = self.expect_binding_name()?;
        self.expect_op("(")?;
        let args = self.argument_list(")")?;
        Ok((class_name, args))
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn check_op(&self, text: &str) -> bool {
        self.peek().is_op(text)
    }

    fn check_keyword(&self, text: &str) -> bool {
        self.peek().is_keyword(text)
    }

    fn eat_op(&mut self, text: &str) -> bool {
        if self.check_op(text) {
            self.advance();
            return true;
        }
        false
    }

    fn expect_op(&mut self, text: &'static str) -> Result<Token> {
        if self.check_op(text) {
            return Ok(self.advance());
        }
        let token = self.peek();
        Err(ParseError::UnexpectedToken {
            expected: text,
            found: token.text.clone(),
            offset: token.offset,
        })
    }

    /// A plain, dot-free identifier usable as a binding name.
    fn expect_binding_name(&mut self) -> Result<String> {
        let token = self.peek();
        if token.kind == TokenKind::Identifier && !token.text.contains('.') {
            return Ok(self.advance().text);
        }
        Err(ParseError::UnexpectedToken {
            expected: "identifier",
            found: token.text.clone(),
            offset: token.offset,
        })
    }
}

/// Splits a dotted identifier lexeme into a member-access chain:
/// `a.b.c` becomes `Member { Member { a, "b" }, "c" }`.
fn path_expr(lexeme: &str) -> Expr {
    let mut segments = lexeme.split('.');
    let base = segments.next().unwrap_or_default();
    let mut expr = Expr::Variable {
        name: base.to_string(),
    };
    for segment in segments {
        expr = Expr::Member {
            object: Box::new(expr),
            property: segment.to_string(),
        };
    }
    expr
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("offset {offset}: expected {expected}, found '{found}'")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        offset: usize,
    },
    #[error("offset {offset}: expected expression, found '{found}'")]
    NotExpression { found: String, offset: usize },
    #[error("offset {offset}: unterminated block")]
    UnterminatedBlock { offset: usize },
    #[error("offset {offset}: assignment target must be an identifier")]
    InvalidAssignmentTarget { offset: usize },
    #[error("offset {offset}: invalid number literal '{text}'")]
    InvalidNumber { text: String, offset: usize },
}
