use core::fmt;
use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;

use crate::read::{ClassRef, Expr};
use colored::Colorize;

pub fn pp_ast(ast: &Expr) {
    println!(";; => {ast:?}",);
}

fn write_list(f: &mut fmt::Formatter, list: &[Expr]) -> fmt::Result {
    write!(f, "(")?;

    let mut iter = list.iter();
    if let Some(first) = iter.next() {
        write_item(f, first)?;
    }

    for it in iter {
        write!(f, " ")?;
        write_item(f, it)?;
    }

    write!(f, ")")
}

fn write_item(f: &mut fmt::Formatter, it: &Expr) -> fmt::Result {
    if f.alternate() {
        write!(f, "{it:#}")
    } else {
        write!(f, "{it}")
    }
}

thread_local! {
    /// atoms whose contents are being written, innermost last
    static OPEN_ATOMS: RefCell<Vec<*const RefCell<Expr>>> = const { RefCell::new(Vec::new()) };
}

/// Writes the contents of `atom`, or `...` where it contains itself.
fn write_atom(f: &mut fmt::Formatter, atom: &Rc<RefCell<Expr>>) -> fmt::Result {
    let ptr = Rc::as_ptr(atom);
    let cyclic = OPEN_ATOMS.with_borrow(|open| open.contains(&ptr));

    let inner = if cyclic {
        "...".to_owned()
    } else {
        OPEN_ATOMS.with_borrow_mut(|open| open.push(ptr));
        let inner = if f.alternate() {
            format!("{:#}", atom.borrow())
        } else {
            atom.borrow().to_string()
        };
        OPEN_ATOMS.with_borrow_mut(|open| open.pop());
        inner
    };

    if f.alternate() {
        inner.fmt(f)
    } else {
        format!("<Atom ({inner})>").fmt(f)
    }
}

impl fmt::Display for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pending = self
            .lazy_registry()
            .map_or(0, |registry| {
                registry
                    .names()
                    .iter()
                    .filter(|name| !self.const_defined(name))
                    .count()
            });

        write!(f, "<class {}", self.name())?;
        if pending > 0 {
            write!(f, " ({pending} lazy pending)")?;
        }
        write!(f, ">")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            match self {
                Self::Atom(it) => write_atom(f, it),
                Self::Int(int) => int.to_string().fmt(f),
                Self::Sym(sym) => write!(f, "{sym}"),
                Self::Path { owner, name } => write!(f, "{owner}::{name}"),
                Self::String(string) => write!(f, "{string}"),
                Self::Nil => "nil".fmt(f),
                Self::Func(func) => write!(f, "{}", func.name()),
                Self::Class(class) => class.name().fmt(f),
                Self::Bool(b) => b.to_string().fmt(f),
                Self::List(it) => write_list(f, it),
            }
        } else {
            match self {
                Self::Atom(it) => write_atom(f, it),
                Self::Int(int) => int.to_string().cyan().fmt(f),
                Self::Sym(sym) => sym.to_string().red().fmt(f),
                Self::Path { owner, name } => format!("{owner}::{name}").yellow().fmt(f),
                Self::String(string) => format!(r#""{string}""#).bright_green().fmt(f),
                Self::Nil => "nil".bold().blue().fmt(f),
                Self::Func(func) => format!("<Func \"{}\">", func.name()).red().fmt(f),
                Self::Class(class) => class.to_string().purple().fmt(f),
                Self::Bool(b) => b.to_string().bright_blue().fmt(f),
                Self::List(it) => write_list(f, it),
            }
        }
    }
}
