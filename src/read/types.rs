use std::{cell::RefCell, rc::Rc};

use thiserror::Error;

use crate::{class::Uninitialized, Func};

pub type QResult<T> = Result<T, QnErr>;

/// A class whose constants are host values.
pub type Class = crate::class::Class<Expr, QnErr>;

/// cheap to clone, only contains small values (with copy)
/// or `Rc`s
#[derive(Clone, Default)]
pub enum Expr {
    Atom(Rc<RefCell<Expr>>),
    Func(Func),
    Class(ClassRef),
    Int(i64),
    String(Rc<str>),
    Sym(Rc<str>),
    /// `Owner::NAME`
    Path {
        owner: Rc<str>,
        name: Rc<str>,
    },
    List(Rc<[Expr]>),
    Bool(bool),
    #[default]
    Nil,
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // atoms are mutable cells and may contain themselves
            (Self::Atom(a), Self::Atom(b)) => Rc::ptr_eq(a, b),
            (Self::Func(a), Self::Func(b)) => a == b,
            (Self::Class(a), Self::Class(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::String(a), Self::String(b)) | (Self::Sym(a), Self::Sym(b)) => a == b,
            (
                Self::Path { owner, name },
                Self::Path {
                    owner: other_owner,
                    name: other_name,
                },
            ) => owner == other_owner && name == other_name,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Nil, Self::Nil) => true,
            _ => false,
        }
    }
}

/// Shared handle to a [`Class`]; two handles are equal only if they point
/// at the same class.
#[derive(Clone, Debug)]
pub struct ClassRef(pub Rc<Class>);

impl PartialEq for ClassRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::ops::Deref for ClassRef {
    type Target = Class;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Error, Debug)]
pub enum QnErr {
    #[error("Interrupted, Stop")]
    Stop,

    #[error(transparent)]
    Any(#[from] anyhow::Error),

    #[error(transparent)]
    Uninitialized(#[from] Uninitialized),

    #[error("Unbound identifier [ {0} ]")]
    UnboundSymbol(Rc<str>),

    #[error("Mismatched Paren {0}")]
    MismatchedParen(ParenType),

    #[error("Missing Token: {0}")]
    MissingToken(anyhow::Error),

    #[error("Wrong / Missing argument for {1}, received: {0:?}")]
    NoArgs(Vec<Expr>, &'static str),

    #[error("Type error, expected: {expected}, found {}: {found:?}", .found.type_name())]
    TypeErr { expected: &'static str, found: Expr },

    #[error("{0}")]
    Thrown(Expr),

    #[error("Evaluation nested deeper than {0} levels")]
    DepthExceeded(usize),

    #[error("Input nested deeper than {0} levels")]
    NestingTooDeep(usize),
}

impl Expr {
    #[must_use]
    pub const fn is_truthy(&self) -> bool {
        !matches!(self, Self::Bool(false) | Self::Nil)
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Atom(_) => "atom",
            Self::Func(_) => "function",
            Self::Class(_) => "class",
            Self::Int(_) => "int",
            Self::String(_) => "string",
            Self::Sym(_) => "symbol",
            Self::Path { .. } => "path",
            Self::List(_) => "list",
            Self::Bool(_) => "bool",
            Self::Nil => "nil",
        }
    }

    pub fn type_err(&self, expected: &'static str) -> QnErr {
        QnErr::TypeErr {
            expected,
            found: self.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ParenType {
    Open,
    Close,
}

impl std::fmt::Display for ParenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "("),
            Self::Close => write!(f, ")"),
        }
    }
}

impl std::fmt::Debug for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

pub struct Input(pub Rc<str>);
impl Input {
    pub fn get(ctx: &mut crate::Term) -> QResult<Self> {
        Ok(Self(super::get_inp(ctx)?.into()))
    }

    pub fn tokenize(&self) -> QResult<super::stream::TokenStream> {
        super::tokenize(&self.0)
    }
}
