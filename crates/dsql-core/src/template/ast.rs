//! Template statement tree.

use crate::lexer::Span;

/// A parsed template: SQL text interleaved with directives and references.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    /// Top-level nodes in source order.
    pub nodes: Vec<Node>,
}

/// A template node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Plain SQL text.
    Text(Span),
    /// A `/* ... */` comment, kept opaque.
    Comment(Span),
    /// A `$` reference appearing in SQL text.
    Reference {
        /// The referenced expression.
        expr: Expr,
        /// Source range of the whole reference.
        span: Span,
    },
    /// `#set(target = value)`
    Set {
        /// Assigned expression.
        target: Expr,
        /// Assigned value.
        value: Expr,
        /// Source range of the directive.
        span: Span,
    },
    /// `#if(...) ... #elseif(...) ... #else ... #end`
    If {
        /// The `#if` branch followed by every `#elseif` branch.
        branches: Vec<Branch>,
        /// The `#else` body.
        otherwise: Option<Vec<Node>>,
        /// Source range from `#if` to `#end`.
        span: Span,
    },
    /// `#foreach(item in set) ... #end`
    ForEach {
        /// Loop variable.
        item: Expr,
        /// Iterated collection.
        set: Expr,
        /// Loop body.
        body: Vec<Node>,
        /// Source range from `#foreach` to `#end`.
        span: Span,
    },
}

/// One conditional branch.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    /// Branch condition.
    pub condition: Expr,
    /// Branch body.
    pub body: Vec<Node>,
}

/// The root of a reference chain: `$name`, `$!name` or `${name...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    /// Identifier following `$`.
    pub name: String,
    /// Range from `$` to the end of the identifier.
    pub span: Span,
    /// `${...}` form.
    pub braced: bool,
    /// `$!name` form.
    pub quiet: bool,
}

/// A literal value inside a directive.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Quoted string.
    String(String),
    /// Integer literal.
    Integer(i64),
    /// Float literal.
    Float(f64),
    /// `true` or `false`.
    Bool(bool),
    /// `null`.
    Null,
}

/// Binary operators in directive expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    /// Returns `(left, right)` binding power; higher binds tighter.
    #[must_use]
    pub const fn binding_power(self) -> (u8, u8) {
        match self {
            Self::Or => (1, 2),
            Self::And => (3, 4),
            Self::Eq | Self::NotEq => (5, 6),
            Self::Lt | Self::LtEq | Self::Gt | Self::GtEq => (7, 8),
            Self::Add | Self::Sub => (9, 10),
            Self::Mul | Self::Div | Self::Mod => (11, 12),
        }
    }
}

/// Unary operators in directive expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!` or `not`
    Not,
    /// `-`
    Neg,
}

/// A template expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Root selector.
    Selector(Selector),
    /// Literal value.
    Literal(Literal),
    /// `base.name`
    Member {
        /// Accessed expression.
        base: Box<Expr>,
        /// Member name.
        name: String,
    },
    /// `base[index]`
    Index {
        /// Indexed expression.
        base: Box<Expr>,
        /// Index expression.
        index: Box<Expr>,
    },
    /// `callee(args...)`
    Call {
        /// Called expression, usually a member chain.
        callee: Box<Expr>,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// Prefix operator.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Infix operator.
    Binary {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: BinaryOp,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `[a, b, c]`
    List(Vec<Expr>),
}

impl Expr {
    /// Returns the selector at the root of a member/index/call chain.
    #[must_use]
    pub fn root(&self) -> Option<&Selector> {
        match self {
            Self::Selector(selector) => Some(selector),
            Self::Member { base, .. } | Self::Index { base, .. } => base.root(),
            Self::Call { callee, .. } => callee.root(),
            _ => None,
        }
    }

    /// Returns the member names following the root selector, outermost last.
    ///
    /// `$Unsafe.Name.Length()` yields `["Name", "Length"]`.
    #[must_use]
    pub fn path(&self) -> Vec<&str> {
        let mut names = vec![];
        let mut node = self;
        loop {
            match node {
                Self::Member { base, name } => {
                    names.push(name.as_str());
                    node = base;
                }
                Self::Index { base, .. } => node = base,
                Self::Call { callee, .. } => node = callee,
                _ => break,
            }
        }
        names.reverse();
        names
    }
}
