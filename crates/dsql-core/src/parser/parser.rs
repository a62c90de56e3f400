//! SQL Parser implementation.

use super::error::ParseError;
use super::pratt::{
    infix_binding_power, prefix_binding_power, token_to_binary_op, token_to_unary_op,
};
use crate::ast::{
    BinaryOp, DeleteStatement, Expr, FunctionCall, InsertSource, InsertStatement, JoinClause,
    JoinType, Literal, OrderBy, OrderDirection, SelectColumn, SelectStatement, Statement, TableRef,
    UpdateAssignment, UpdateStatement,
};
use crate::cursor::match_block;
use crate::lexer::{Keyword, Lexer, Span, Token, TokenKind};

/// SQL Parser.
///
/// Template selectors are accepted wherever an expression or a table may
/// appear. Errors inside WHERE, GROUP BY, HAVING, ORDER BY, LIMIT and OFFSET
/// are recovered from: the clause is dropped, the error is kept in
/// [`Parser::recovered`] and parsing resumes at the next clause keyword.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    previous: Token,
    recovered: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given input.
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            previous: Token::new(TokenKind::Eof, Span::new(0, 0)),
            recovered: Vec::new(),
        }
    }

    /// Returns the errors recovered from while parsing clauses.
    #[must_use]
    pub fn recovered(&self) -> &[ParseError] {
        &self.recovered
    }

    /// Parses a single SQL statement.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the input is not a valid SQL statement.
    pub fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        match &self.current.kind {
            TokenKind::Keyword(Keyword::Select) => {
                Ok(Statement::Select(self.parse_select_statement()?))
            }
            TokenKind::Keyword(Keyword::Insert) => {
                Ok(Statement::Insert(self.parse_insert_statement()?))
            }
            TokenKind::Keyword(Keyword::Update) => {
                Ok(Statement::Update(self.parse_update_statement()?))
            }
            TokenKind::Keyword(Keyword::Delete) => {
                Ok(Statement::Delete(self.parse_delete_statement()?))
            }
            _ => Err(ParseError::unexpected(
                "SELECT, INSERT, UPDATE, or DELETE",
                self.current.kind.clone(),
                self.current.span,
            )),
        }
    }

    /// Parses every `;`-separated statement up to the end of input.
    ///
    /// # Errors
    ///
    /// Returns the first `ParseError` encountered.
    pub fn parse_statements(&mut self) -> Result<Vec<Statement>, ParseError> {
        let mut statements = vec![];
        loop {
            while self.check(&TokenKind::Semicolon) {
                self.advance();
            }
            if self.current.is_eof() {
                return Ok(statements);
            }
            statements.push(self.parse_statement()?);
            if !self.check(&TokenKind::Semicolon) && !self.current.is_eof() {
                return Err(ParseError::unexpected(
                    "; or end of input",
                    self.current.kind.clone(),
                    self.current.span,
                ));
            }
        }
    }

    /// Parses a standalone predicate such as the body of a conditional block,
    /// ignoring one leading `AND`, `OR` or `WHERE`.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the input is not a single expression.
    pub fn parse_predicate(&mut self) -> Result<Expr, ParseError> {
        if self.check_keyword(Keyword::And)
            || self.check_keyword(Keyword::Or)
            || self.check_keyword(Keyword::Where)
        {
            self.advance();
        }
        let expr = self.parse_expression(0)?;
        self.skip_template_fragments();
        if self.current.is_eof() {
            Ok(expr)
        } else {
            Err(ParseError::unexpected(
                "end of predicate",
                self.current.kind.clone(),
                self.current.span,
            ))
        }
    }

    /// Parses a SELECT statement.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` for a malformed projection or FROM clause.
    pub fn parse_select_statement(&mut self) -> Result<SelectStatement, ParseError> {
        self.expect_keyword(Keyword::Select)?;

        // DISTINCT or ALL
        let distinct = if self.check_keyword(Keyword::Distinct) {
            self.advance();
            true
        } else if self.check_keyword(Keyword::All) {
            self.advance();
            false
        } else {
            false
        };

        // SELECT columns
        let columns = self.parse_select_columns()?;
        self.skip_template_fragments();

        // FROM clause (optional for expressions like SELECT 1+1)
        let (from, joins) = if self.check_keyword(Keyword::From) {
            self.advance();
            let from = self.parse_table_factor()?;
            (Some(from), self.parse_joins()?)
        } else {
            (None, vec![])
        };
        self.skip_template_fragments();

        // WHERE clause
        let where_clause = if self.check_keyword(Keyword::Where) {
            self.advance();
            let result = self.parse_expression(0);
            self.recover(result)
        } else {
            None
        };
        self.skip_template_fragments();

        // GROUP BY clause
        let group_by = if self.check_keyword(Keyword::Group) {
            self.advance();
            let result = self
                .expect_keyword(Keyword::By)
                .and_then(|()| self.parse_expression_list());
            self.recover(result).unwrap_or_default()
        } else {
            vec![]
        };
        self.skip_template_fragments();

        // HAVING clause
        let having = if self.check_keyword(Keyword::Having) {
            self.advance();
            let result = self.parse_expression(0);
            self.recover(result)
        } else {
            None
        };
        self.skip_template_fragments();

        // ORDER BY clause
        let order_by = if self.check_keyword(Keyword::Order) {
            self.advance();
            let result = self
                .expect_keyword(Keyword::By)
                .and_then(|()| self.parse_order_by_list());
            self.recover(result).unwrap_or_default()
        } else {
            vec![]
        };
        self.skip_template_fragments();

        // LIMIT clause
        let limit = if self.check_keyword(Keyword::Limit) {
            self.advance();
            let result = self.parse_expression(0);
            self.recover(result)
        } else {
            None
        };
        self.skip_template_fragments();

        // OFFSET clause
        let offset = if self.check_keyword(Keyword::Offset) {
            self.advance();
            let result = self.parse_expression(0);
            self.recover(result)
        } else {
            None
        };
        self.skip_template_fragments();

        Ok(SelectStatement {
            distinct,
            columns,
            from,
            joins,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
            offset,
        })
    }

    /// Parses SELECT columns.
    fn parse_select_columns(&mut self) -> Result<Vec<SelectColumn>, ParseError> {
        let mut columns = vec![];

        loop {
            let expr = self.parse_expression(0)?;

            let except = if matches!(expr, Expr::Wildcard { .. })
                && self.check_keyword(Keyword::Except)
            {
                self.advance();
                self.parse_except_list()?
            } else {
                vec![]
            };

            // Check for alias (AS name or just name)
            let alias = if self.check_keyword(Keyword::As) {
                self.advance();
                Some(self.expect_identifier()?)
            } else if matches!(&self.current.kind, TokenKind::Identifier(_)) {
                Some(self.expect_identifier()?)
            } else {
                None
            };

            columns.push(SelectColumn {
                expr,
                alias,
                except,
            });

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        Ok(columns)
    }

    /// Parses `(a, b)` or a bare `a, b` list after `alias.* EXCEPT`.
    ///
    /// The bare form stops before the first entry that is qualified, called or
    /// aliased, since that entry starts the next projection.
    fn parse_except_list(&mut self) -> Result<Vec<String>, ParseError> {
        if self.check(&TokenKind::LeftParen) {
            self.advance();
            let list = self.parse_identifier_list()?;
            self.expect(&TokenKind::RightParen)?;
            return Ok(list);
        }
        let mut list = vec![self.expect_identifier()?];
        while self.check(&TokenKind::Comma) {
            let mut ahead = self.lexer.clone();
            let next = ahead.next_token();
            let after = ahead.next_token();
            let bare = matches!(next.kind, TokenKind::Identifier(_))
                && !matches!(
                    after.kind,
                    TokenKind::Dot
                        | TokenKind::LeftParen
                        | TokenKind::Identifier(_)
                        | TokenKind::Keyword(Keyword::As)
                );
            if !bare {
                break;
            }
            self.advance();
            list.push(self.expect_identifier()?);
        }
        Ok(list)
    }

    /// Parses one FROM or JOIN item: a table, a sub-select or a template.
    fn parse_table_factor(&mut self) -> Result<TableRef, ParseError> {
        match &self.current.kind {
            TokenKind::LeftParen => {
                let (sql, span) = self.capture_parenthesised()?;
                let query = parse_subquery(&sql);
                let alias = self.parse_optional_alias()?;
                Ok(TableRef::Subquery {
                    sql,
                    span,
                    query,
                    alias,
                })
            }
            TokenKind::Selector(text) => {
                let selector = text.clone();
                self.advance();
                let alias = self.parse_optional_alias()?;
                Ok(TableRef::Template { selector, alias })
            }
            _ => {
                let (schema, name) = self.parse_qualified_name()?;
                let alias = self.parse_optional_alias()?;
                Ok(TableRef::Table {
                    schema,
                    name,
                    alias,
                })
            }
        }
    }

    /// Parses JOIN clauses and comma-separated FROM items.
    fn parse_joins(&mut self) -> Result<Vec<JoinClause>, ParseError> {
        let mut joins = vec![];
        loop {
            self.skip_template_fragments();
            let start = self.current.span.start;
            let join_type = if self.is_join_keyword() {
                self.parse_join_type()?
            } else if self.check(&TokenKind::Comma) {
                self.advance();
                JoinType::Cross
            } else {
                break;
            };
            let table = self.parse_table_factor()?;

            let (on, using) = if self.check_keyword(Keyword::On) {
                self.advance();
                (Some(self.parse_expression(0)?), vec![])
            } else if self.check_keyword(Keyword::Using) {
                self.advance();
                self.expect(&TokenKind::LeftParen)?;
                let cols = self.parse_identifier_list()?;
                self.expect(&TokenKind::RightParen)?;
                (None, cols)
            } else if join_type == JoinType::Cross {
                (None, vec![])
            } else {
                return Err(ParseError::new(
                    "Expected ON or USING clause",
                    self.current.span,
                ));
            };

            joins.push(JoinClause {
                join_type,
                table,
                on,
                using,
                span: Span::new(start, self.previous.span.end),
            });
        }
        Ok(joins)
    }

    /// Checks if current token is a join keyword.
    fn is_join_keyword(&self) -> bool {
        matches!(
            &self.current.kind,
            TokenKind::Keyword(
                Keyword::Join
                    | Keyword::Inner
                    | Keyword::Left
                    | Keyword::Right
                    | Keyword::Full
                    | Keyword::Cross
            )
        )
    }

    /// Parses a join type.
    fn parse_join_type(&mut self) -> Result<JoinType, ParseError> {
        let join_type = match &self.current.kind {
            TokenKind::Keyword(Keyword::Join) => {
                self.advance();
                return Ok(JoinType::Inner);
            }
            TokenKind::Keyword(Keyword::Inner) => JoinType::Inner,
            TokenKind::Keyword(Keyword::Left) => JoinType::Left,
            TokenKind::Keyword(Keyword::Right) => JoinType::Right,
            TokenKind::Keyword(Keyword::Full) => JoinType::Full,
            TokenKind::Keyword(Keyword::Cross) => JoinType::Cross,
            _ => {
                return Err(ParseError::unexpected(
                    "JOIN keyword",
                    self.current.kind.clone(),
                    self.current.span,
                ));
            }
        };
        self.advance();
        if self.check_keyword(Keyword::Outer) {
            self.advance();
        }
        self.expect_keyword(Keyword::Join)?;
        Ok(join_type)
    }

    /// Parses an optional table alias.
    fn parse_optional_alias(&mut self) -> Result<Option<String>, ParseError> {
        if self.check_keyword(Keyword::As) {
            self.advance();
            Ok(Some(self.expect_identifier()?))
        } else if matches!(&self.current.kind, TokenKind::Identifier(_)) {
            Ok(Some(self.expect_identifier()?))
        } else {
            Ok(None)
        }
    }

    /// Parses `name` or `schema.name`.
    fn parse_qualified_name(&mut self) -> Result<(Option<String>, String), ParseError> {
        let first = self.expect_identifier()?;
        if self.check(&TokenKind::Dot) {
            self.advance();
            let name = self.expect_identifier()?;
            Ok((Some(first), name))
        } else {
            Ok((None, first))
        }
    }

    /// Parses an INSERT statement.
    fn parse_insert_statement(&mut self) -> Result<InsertStatement, ParseError> {
        self.expect_keyword(Keyword::Insert)?;
        self.expect_keyword(Keyword::Into)?;

        let (schema, table) = self.parse_qualified_name()?;

        // Column list (optional)
        let columns = if self.check(&TokenKind::LeftParen) {
            self.advance();
            let cols = self.parse_identifier_list()?;
            self.expect(&TokenKind::RightParen)?;
            cols
        } else {
            vec![]
        };

        // VALUES or SELECT
        let values = if self.check_keyword(Keyword::Values) {
            self.advance();
            let mut rows = vec![];
            loop {
                self.expect(&TokenKind::LeftParen)?;
                let row = self.parse_expression_list()?;
                self.expect(&TokenKind::RightParen)?;
                rows.push(row);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
            InsertSource::Values(rows)
        } else if self.check_keyword(Keyword::Select) {
            InsertSource::Query(Box::new(self.parse_select_statement()?))
        } else {
            return Err(ParseError::unexpected(
                "VALUES or SELECT",
                self.current.kind.clone(),
                self.current.span,
            ));
        };

        Ok(InsertStatement {
            schema,
            table,
            columns,
            values,
        })
    }

    /// Parses an UPDATE statement.
    fn parse_update_statement(&mut self) -> Result<UpdateStatement, ParseError> {
        self.expect_keyword(Keyword::Update)?;

        let (schema, table) = self.parse_qualified_name()?;
        let alias = self.parse_optional_alias()?;

        self.expect_keyword(Keyword::Set)?;

        // Parse SET assignments
        let mut assignments = vec![];
        loop {
            let (_, column) = self.parse_qualified_name()?;
            self.expect(&TokenKind::Eq)?;
            let value = self.parse_expression(0)?;
            assignments.push(UpdateAssignment { column, value });

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.skip_template_fragments();

        // WHERE clause
        let where_clause = if self.check_keyword(Keyword::Where) {
            self.advance();
            let result = self.parse_expression(0);
            self.recover(result)
        } else {
            None
        };
        self.skip_template_fragments();

        Ok(UpdateStatement {
            schema,
            table,
            alias,
            assignments,
            where_clause,
        })
    }

    /// Parses a DELETE statement.
    fn parse_delete_statement(&mut self) -> Result<DeleteStatement, ParseError> {
        self.expect_keyword(Keyword::Delete)?;
        self.expect_keyword(Keyword::From)?;

        let (schema, table) = self.parse_qualified_name()?;
        let alias = self.parse_optional_alias()?;
        self.skip_template_fragments();

        // WHERE clause
        let where_clause = if self.check_keyword(Keyword::Where) {
            self.advance();
            let result = self.parse_expression(0);
            self.recover(result)
        } else {
            None
        };
        self.skip_template_fragments();

        Ok(DeleteStatement {
            schema,
            table,
            alias,
            where_clause,
        })
    }

    /// Parses an ORDER BY list.
    fn parse_order_by_list(&mut self) -> Result<Vec<OrderBy>, ParseError> {
        let mut items = vec![];
        loop {
            let expr = self.parse_expression(0)?;
            let direction = if self.check_keyword(Keyword::Desc) {
                self.advance();
                OrderDirection::Desc
            } else {
                if self.check_keyword(Keyword::Asc) {
                    self.advance();
                }
                OrderDirection::Asc
            };

            items.push(OrderBy { expr, direction });

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        Ok(items)
    }

    /// Parses an expression using Pratt parsing.
    #[allow(clippy::while_let_loop)]
    fn parse_expression(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        // Parse prefix (primary expression or unary operator)
        let mut lhs = self.parse_prefix()?;

        // Parse infix operators
        loop {
            let (l_bp, r_bp) = match infix_binding_power(&self.current.kind) {
                Some(bp) => bp,
                None => break,
            };

            if l_bp < min_bp {
                break;
            }

            // Handle special infix operators
            match &self.current.kind {
                TokenKind::Keyword(Keyword::Is) => {
                    self.advance();
                    let negated = if self.check_keyword(Keyword::Not) {
                        self.advance();
                        true
                    } else {
                        false
                    };
                    self.expect_keyword(Keyword::Null)?;
                    lhs = Expr::IsNull {
                        expr: Box::new(lhs),
                        negated,
                    };
                }
                TokenKind::Keyword(Keyword::In) => {
                    self.advance();
                    lhs = self.parse_in(lhs, false)?;
                }
                TokenKind::Keyword(Keyword::Between) => {
                    self.advance();
                    lhs = self.parse_between(lhs, r_bp, false)?;
                }
                TokenKind::Keyword(Keyword::Not) => match self.peek_kind() {
                    TokenKind::Keyword(Keyword::In) => {
                        self.advance();
                        self.advance();
                        lhs = self.parse_in(lhs, true)?;
                    }
                    TokenKind::Keyword(Keyword::Between) => {
                        self.advance();
                        self.advance();
                        lhs = self.parse_between(lhs, r_bp, true)?;
                    }
                    TokenKind::Keyword(Keyword::Like) => {
                        self.advance();
                        self.advance();
                        let rhs = self.parse_expression(r_bp)?;
                        lhs = lhs.binary(BinaryOp::NotLike, rhs);
                    }
                    _ => break,
                },
                TokenKind::DoubleColon => {
                    self.advance();
                    let data_type = self.parse_type_name()?;
                    lhs = Expr::Cast {
                        expr: Box::new(lhs),
                        data_type,
                    };
                }
                _ => {
                    // Standard binary operator
                    if let Some(op) = token_to_binary_op(&self.current.kind) {
                        self.advance();
                        let rhs = self.parse_expression(r_bp)?;
                        lhs = lhs.binary(op, rhs);
                    } else {
                        break;
                    }
                }
            }
        }

        Ok(lhs)
    }

    /// Parses the right side of `IN`: a list, a sub-select or a selector.
    fn parse_in(&mut self, lhs: Expr, negated: bool) -> Result<Expr, ParseError> {
        let list = if let TokenKind::Selector(text) = &self.current.kind {
            let expr = Expr::Selector {
                text: text.clone(),
                span: self.current.span,
            };
            self.advance();
            vec![expr]
        } else if self.check(&TokenKind::LeftParen)
            && matches!(self.peek_kind(), TokenKind::Keyword(Keyword::Select))
        {
            vec![self.parse_subquery_expression()?]
        } else {
            self.expect(&TokenKind::LeftParen)?;
            let list = if self.check(&TokenKind::RightParen) {
                vec![]
            } else {
                self.parse_expression_list()?
            };
            self.expect(&TokenKind::RightParen)?;
            list
        };
        Ok(Expr::In {
            expr: Box::new(lhs),
            list,
            negated,
        })
    }

    fn parse_between(&mut self, lhs: Expr, r_bp: u8, negated: bool) -> Result<Expr, ParseError> {
        let low = self.parse_expression(r_bp)?;
        self.expect_keyword(Keyword::And)?;
        let high = self.parse_expression(r_bp)?;
        Ok(Expr::Between {
            expr: Box::new(lhs),
            low: Box::new(low),
            high: Box::new(high),
            negated,
        })
    }

    /// Parses a prefix expression.
    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        // Check for unary operators
        if let Some(op) = token_to_unary_op(&self.current.kind) {
            let bp = prefix_binding_power(&self.current.kind).unwrap_or(17);
            self.advance();
            let operand = self.parse_expression(bp)?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }

        self.parse_primary()
    }

    /// Parses a primary expression.
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.current.clone();

        match &token.kind {
            // Literals
            TokenKind::Integer(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Integer(*n)))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Expr::Literal(Literal::Float(*f)))
            }
            TokenKind::String(s) => {
                let value = s.clone();
                self.advance();
                Ok(Expr::Literal(Literal::String(value)))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(true)))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(false)))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }

            // Template selector
            TokenKind::Selector(text) => {
                let text = text.clone();
                self.advance();
                Ok(Expr::Selector {
                    text,
                    span: token.span,
                })
            }

            // Wildcard
            TokenKind::Star => {
                self.advance();
                Ok(Expr::Wildcard { table: None })
            }

            // Parenthesized expression or subquery
            TokenKind::LeftParen => {
                if matches!(self.peek_kind(), TokenKind::Keyword(Keyword::Select)) {
                    return self.parse_subquery_expression();
                }
                self.advance();
                let expr = self.parse_expression(0)?;
                self.expect(&TokenKind::RightParen)?;
                Ok(Expr::Paren(Box::new(expr)))
            }

            TokenKind::Keyword(Keyword::Cast) => {
                self.advance();
                self.parse_cast_expression()
            }

            // CASE expression
            TokenKind::Keyword(Keyword::Case) => self.parse_case_expression(),

            // EXISTS
            TokenKind::Keyword(Keyword::Exists) => {
                self.advance();
                let subquery = self.parse_subquery_expression()?;
                Ok(Expr::Function(FunctionCall {
                    name: String::from("EXISTS"),
                    args: vec![subquery],
                    distinct: false,
                }))
            }

            // LEFT(...) and RIGHT(...) string functions
            TokenKind::Keyword(kw @ (Keyword::Left | Keyword::Right))
                if self.peek_kind() == TokenKind::LeftParen =>
            {
                let name = kw.as_str().to_string();
                self.advance();
                self.parse_function_call(name)
            }

            // Identifier (column reference or function call)
            TokenKind::Identifier(name) => {
                let name = name.clone();
                let span = token.span;
                self.advance();

                // Check for function call
                if self.check(&TokenKind::LeftParen) {
                    return self.parse_function_call(name);
                }

                // Check for qualified name (table.column or table.*)
                if self.check(&TokenKind::Dot) {
                    self.advance();
                    if self.check(&TokenKind::Star) {
                        self.advance();
                        return Ok(Expr::Wildcard { table: Some(name) });
                    }
                    let column = self.expect_identifier()?;
                    return Ok(Expr::Column {
                        table: Some(name),
                        name: column,
                        span: Span::new(span.start, self.previous.span.end),
                    });
                }

                Ok(Expr::Column {
                    table: None,
                    name,
                    span,
                })
            }

            _ => Err(ParseError::unexpected(
                "expression",
                self.current.kind.clone(),
                self.current.span,
            )),
        }
    }

    /// Parses `( SELECT ... )` keeping its raw text.
    fn parse_subquery_expression(&mut self) -> Result<Expr, ParseError> {
        let (sql, _) = self.capture_parenthesised()?;
        let query = parse_subquery(&sql).ok();
        Ok(Expr::Subquery { sql, query })
    }

    /// Parses a function call.
    fn parse_function_call(&mut self, name: String) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LeftParen)?;

        let distinct = if self.check_keyword(Keyword::Distinct) {
            self.advance();
            true
        } else {
            false
        };

        let args = if self.check(&TokenKind::RightParen) {
            vec![]
        } else if self.check(&TokenKind::Star) {
            self.advance();
            vec![Expr::Wildcard { table: None }]
        } else {
            self.parse_expression_list()?
        };

        self.expect(&TokenKind::RightParen)?;

        Ok(Expr::Function(FunctionCall {
            name,
            args,
            distinct,
        }))
    }

    /// Parses a CAST expression.
    fn parse_cast_expression(&mut self) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LeftParen)?;
        let expr = self.parse_expression(0)?;
        self.expect_keyword(Keyword::As)?;
        let data_type = self.parse_type_name()?;
        self.expect(&TokenKind::RightParen)?;

        Ok(Expr::Cast {
            expr: Box::new(expr),
            data_type,
        })
    }

    /// Parses a type name with optional length or precision, e.g. `VARCHAR(20)`.
    fn parse_type_name(&mut self) -> Result<String, ParseError> {
        let mut name = match &self.current.kind {
            TokenKind::Identifier(name) => name.clone(),
            TokenKind::Keyword(kw) => kw.as_str().to_string(),
            _ => {
                return Err(ParseError::unexpected(
                    "data type",
                    self.current.kind.clone(),
                    self.current.span,
                ));
            }
        };
        self.advance();
        if self.check(&TokenKind::LeftParen) {
            self.advance();
            let mut sizes = vec![];
            loop {
                match &self.current.kind {
                    TokenKind::Integer(n) => sizes.push(n.to_string()),
                    _ => {
                        return Err(ParseError::unexpected(
                            "integer",
                            self.current.kind.clone(),
                            self.current.span,
                        ));
                    }
                }
                self.advance();
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
            self.expect(&TokenKind::RightParen)?;
            name = format!("{name}({})", sizes.join(","));
        }
        Ok(name)
    }

    /// Parses a CASE expression.
    fn parse_case_expression(&mut self) -> Result<Expr, ParseError> {
        self.expect_keyword(Keyword::Case)?;

        // Check for simple CASE (CASE expr WHEN ...)
        let operand = if self.check_keyword(Keyword::When) {
            None
        } else {
            Some(Box::new(self.parse_expression(0)?))
        };

        // Parse WHEN/THEN clauses
        let mut when_clauses = vec![];
        while self.check_keyword(Keyword::When) {
            self.advance();
            let when_expr = self.parse_expression(0)?;
            self.expect_keyword(Keyword::Then)?;
            let then_expr = self.parse_expression(0)?;
            when_clauses.push((when_expr, then_expr));
        }

        // Parse ELSE clause
        let else_clause = if self.check_keyword(Keyword::Else) {
            self.advance();
            Some(Box::new(self.parse_expression(0)?))
        } else {
            None
        };

        self.expect_keyword(Keyword::End)?;

        Ok(Expr::Case {
            operand,
            when_clauses,
            else_clause,
        })
    }

    /// Parses a comma-separated list of expressions.
    fn parse_expression_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut exprs = vec![];
        loop {
            exprs.push(self.parse_expression(0)?);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        Ok(exprs)
    }

    /// Parses a comma-separated list of identifiers.
    fn parse_identifier_list(&mut self) -> Result<Vec<String>, ParseError> {
        let mut idents = vec![];
        loop {
            idents.push(self.expect_identifier()?);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        Ok(idents)
    }

    // --- Helper methods ---

    /// Advances to the next token.
    fn advance(&mut self) {
        self.previous = core::mem::replace(&mut self.current, self.lexer.next_token());
    }

    /// Returns the kind of the token after the current one.
    fn peek_kind(&self) -> TokenKind {
        self.lexer.clone().next_token().kind
    }

    /// Consumes a balanced `( ... )` starting at the current token and returns
    /// the raw text between the parentheses with its span.
    fn capture_parenthesised(&mut self) -> Result<(String, Span), ParseError> {
        if !self.check(&TokenKind::LeftParen) {
            return Err(ParseError::unexpected(
                "(",
                self.current.kind.clone(),
                self.current.span,
            ));
        }
        let open = self.current.span.start;
        let input = self.lexer.input();
        let n = match_block(input, open, b'(', b')');
        if n == 0 {
            return Err(ParseError::unexpected_eof(")", Span::new(open, input.len())));
        }
        let inner = Span::new(open + 1, open + n - 1);
        let close = open + n;
        self.lexer.seek(close);
        self.previous = Token::new(TokenKind::RightParen, Span::new(close - 1, close));
        self.current = self.lexer.next_token();
        Ok((inner.text(input).to_string(), inner))
    }

    /// Skips selector tokens standing in clause position, such as
    /// `$predicate.Builder().Build("AND")` after a WHERE expression.
    fn skip_template_fragments(&mut self) {
        while matches!(self.current.kind, TokenKind::Selector(_)) {
            self.advance();
        }
    }

    /// Keeps a clause result, or records the error and skips to the next
    /// clause boundary.
    fn recover<T>(&mut self, result: Result<T, ParseError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.recovered.push(err);
                self.skip_to_clause_boundary();
                None
            }
        }
    }

    fn skip_to_clause_boundary(&mut self) {
        let mut depth = 0usize;
        loop {
            match &self.current.kind {
                TokenKind::Eof | TokenKind::Semicolon => return,
                TokenKind::LeftParen => depth += 1,
                TokenKind::RightParen => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                TokenKind::Keyword(
                    Keyword::Group
                    | Keyword::Having
                    | Keyword::Order
                    | Keyword::Limit
                    | Keyword::Offset
                    | Keyword::Union
                    | Keyword::Intersect,
                ) if depth == 0 => return,
                _ => {}
            }
            self.advance();
        }
    }

    /// Checks if the current token matches the given kind.
    fn check(&self, kind: &TokenKind) -> bool {
        core::mem::discriminant(&self.current.kind) == core::mem::discriminant(kind)
    }

    /// Checks if the current token is the given keyword.
    fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(&self.current.kind, TokenKind::Keyword(kw) if *kw == keyword)
    }

    /// Expects the current token to be the given kind.
    fn expect(&mut self, kind: &TokenKind) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::unexpected(
                format!("{kind:?}"),
                self.current.kind.clone(),
                self.current.span,
            ))
        }
    }

    /// Expects the current token to be the given keyword.
    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), ParseError> {
        if self.check_keyword(keyword) {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::unexpected(
                keyword.as_str(),
                self.current.kind.clone(),
                self.current.span,
            ))
        }
    }

    /// Expects and returns an identifier.
    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(ParseError::unexpected(
                "identifier",
                self.current.kind.clone(),
                self.current.span,
            )),
        }
    }
}

/// Parses the body of a parenthesised sub-select.
fn parse_subquery(sql: &str) -> Result<Box<SelectStatement>, ParseError> {
    Parser::new(sql).parse_select_statement().map(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(sql: &str) -> Result<Statement, ParseError> {
        Parser::new(sql).parse_statement()
    }

    fn select(sql: &str) -> SelectStatement {
        match parse(sql).unwrap() {
            Statement::Select(select) => select,
            other => panic!("Expected SELECT statement, got {other:?}"),
        }
    }

    #[test]
    fn test_simple_select() {
        let stmt = parse("SELECT id, name FROM users").unwrap();
        assert!(matches!(stmt, Statement::Select(_)));
    }

    #[test]
    fn test_select_with_where() {
        let select = select("SELECT * FROM users WHERE id = 1");
        assert!(select.where_clause.is_some());
    }

    #[test]
    fn test_select_with_join() {
        let select = select("SELECT u.id, o.amount FROM users u JOIN orders o ON u.id = o.user_id");
        assert_eq!(select.joins.len(), 1);
        assert_eq!(select.joins[0].join_type, JoinType::Inner);
        assert_eq!(select.joins[0].table.alias(), Some("o"));
        assert_eq!(
            select.joins[0].on.as_ref().map(ToString::to_string),
            Some("u.id = o.user_id".to_string())
        );
    }

    #[test]
    fn test_expression_precedence() {
        // 1 + 2 * 3 should be parsed as 1 + (2 * 3)
        let select = select("SELECT 1 + 2 * 3");
        if let Expr::Binary { op, right, .. } = &select.columns[0].expr {
            assert_eq!(*op, BinaryOp::Add);
            assert!(matches!(
                right.as_ref(),
                Expr::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            ));
        } else {
            panic!("Expected binary expression");
        }
    }

    #[test]
    fn test_insert_values() {
        let stmt =
            parse("INSERT INTO users (name, email) VALUES ('Alice', $criteria.AppendBinding($Unsafe.Email))")
                .unwrap();
        if let Statement::Insert(insert) = stmt {
            assert_eq!(insert.table, "users");
            assert_eq!(insert.columns, vec!["name", "email"]);
            let InsertSource::Values(rows) = &insert.values else {
                panic!("Expected VALUES");
            };
            assert!(matches!(rows[0][1], Expr::Selector { .. }));
        } else {
            panic!("Expected INSERT statement");
        }
    }

    #[test]
    fn test_update_with_selectors() {
        let stmt = parse(
            "UPDATE AD_ORDER o SET o.STATUS = $criteria.AppendBinding($Unsafe.Status) \
             WHERE ID IN ($criteria.AppendBinding($Unsafe.Ids))",
        )
        .unwrap();
        let Statement::Update(update) = stmt else {
            panic!("Expected UPDATE statement");
        };
        assert_eq!(update.table, "AD_ORDER");
        assert_eq!(update.alias.as_deref(), Some("o"));
        assert_eq!(update.assignments[0].column, "STATUS");
        assert!(matches!(
            update.where_clause,
            Some(Expr::In { negated: false, .. })
        ));
    }

    #[test]
    fn test_delete() {
        let stmt = parse("DELETE FROM users WHERE id = 1").unwrap();
        if let Statement::Delete(delete) = stmt {
            assert_eq!(delete.table, "users");
            assert!(delete.where_clause.is_some());
        } else {
            panic!("Expected DELETE statement");
        }
    }

    #[test]
    fn test_case_expression() {
        let select =
            select("SELECT CASE WHEN status = 1 THEN 'active' ELSE 'inactive' END FROM users");
        assert!(matches!(select.columns[0].expr, Expr::Case { .. }));
    }

    #[test]
    fn test_aggregate_functions() {
        let select = select("SELECT COUNT(*), SUM(amount), AVG(price) FROM orders");
        assert_eq!(select.columns.len(), 3);
        assert!(matches!(select.columns[0].expr, Expr::Function(_)));
    }

    #[test]
    fn test_subquery_keeps_raw_text() {
        let select = select(
            "SELECT o.* FROM ORDERS o \
             LEFT JOIN (SELECT /* {\"Cache\":\"c1\"} */ ID, ORDER_ID FROM ITEMS) i ON o.ID = i.ORDER_ID AND 1 = 1",
        );
        let join = &select.joins[0];
        assert_eq!(join.join_type, JoinType::Left);
        let TableRef::Subquery {
            sql, query, alias, ..
        } = &join.table
        else {
            panic!("Expected sub-select");
        };
        assert!(sql.contains("/* {\"Cache\":\"c1\"} */"));
        assert_eq!(alias.as_deref(), Some("i"));
        let query = query.as_ref().unwrap();
        assert_eq!(query.columns.len(), 2);
    }

    #[test]
    fn test_template_table_and_unparsable_subquery() {
        let select = select("SELECT * FROM ($View.items.SQL) i JOIN $View.other.SQL x ON 1 = 1");
        match &select.from {
            Some(TableRef::Subquery { sql, query, .. }) => {
                assert_eq!(sql, "$View.items.SQL");
                assert!(query.is_err());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            &select.joins[0].table,
            TableRef::Template { selector, alias } if selector == "$View.other.SQL" && alias.as_deref() == Some("x")
        ));
    }

    #[test]
    fn test_except_lists() {
        let select = select("SELECT o.* EXCEPT ID, NAME, i.* EXCEPT (A, B), i.X FROM ORDERS o");
        assert_eq!(select.columns.len(), 3);
        assert_eq!(select.columns[0].except, vec!["ID", "NAME"]);
        assert_eq!(select.columns[1].except, vec!["A", "B"]);
        assert!(select.columns[2].except.is_empty());
    }

    #[test]
    fn test_negated_predicates_and_cast() {
        let select = select(
            "SELECT * FROM t WHERE a NOT IN (1, 2) AND b NOT LIKE 'x%' AND c::int NOT BETWEEN 1 AND 2",
        );
        assert_eq!(
            select.where_clause.unwrap().to_string(),
            "a NOT IN (1, 2) AND b NOT LIKE 'x%' AND CAST(c AS int) NOT BETWEEN 1 AND 2"
        );
    }

    #[test]
    fn test_in_subquery() {
        let select = select("SELECT * FROM t WHERE ID IN (SELECT ORDER_ID FROM ITEMS)");
        match select.where_clause {
            Some(Expr::In { list, .. }) => {
                assert!(matches!(&list[0], Expr::Subquery { query: Some(_), .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_tolerates_template_fragments() {
        let mut parser = Parser::new(
            "SELECT * FROM t WHERE 1 = 1 $predicate.Builder().Build(\"AND\") ORDER BY ID",
        );
        let Statement::Select(select) = parser.parse_statement().unwrap() else {
            panic!("Expected SELECT statement");
        };
        assert!(select.where_clause.is_some());
        assert_eq!(select.order_by.len(), 1);
        assert!(parser.recovered().is_empty());
    }

    #[test]
    fn test_recovers_from_broken_where() {
        let mut parser = Parser::new("SELECT * FROM t WHERE ID = = 1 ORDER BY ID");
        let Statement::Select(select) = parser.parse_statement().unwrap() else {
            panic!("Expected SELECT statement");
        };
        assert!(select.where_clause.is_none());
        assert_eq!(select.order_by.len(), 1);
        assert_eq!(parser.recovered().len(), 1);
    }

    #[test]
    fn test_parse_predicate() {
        let expr = Parser::new(" AND STATUS = $criteria.AppendBinding($Unsafe.Status)")
            .parse_predicate()
            .unwrap();
        assert_eq!(
            expr.to_string(),
            "STATUS = $criteria.AppendBinding($Unsafe.Status)"
        );
        assert!(Parser::new("a = 1 b").parse_predicate().is_err());
    }

    #[test]
    fn test_parse_statements() {
        let statements = Parser::new("UPDATE t SET a = 1; DELETE FROM t;")
            .parse_statements()
            .unwrap();
        assert_eq!(statements.len(), 2);
        assert!(Parser::new("SELECT 1 SELECT 2").parse_statements().is_err());
    }
}
