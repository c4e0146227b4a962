use std::cell::RefCell;
use std::fmt::Write;
use std::rc::Rc;

use anyhow::Context;

use crate::read::{Expr, QResult, QnErr};
use crate::{Func, Runtime};

/// ## DSL for native Func Objects
///
/// example usage:
/// ```ignore
///     funcmatch! {
///         match ident {
///             "=", [lhs, rhs] => Expr::Bool(lhs == rhs),
///             // bind `&Runtime` to `ctx`,
///             // return errors using Propagation of a `Result<Expr, QnErr>`
///             "eval", [ast], ctx: ctx => ctx.eval(ast)?,
///         }
///     }
/// ```
macro_rules! funcmatch {
    (
		match $it:ident {
			$($name:literal, $args:pat $(, ctx: $ctx:pat)? => $exp:expr,)*
		}) => {
			match $it {
				$(
					$name => Func::new_expr($name, |args: &[Expr], _ctx: &Runtime| {
						$( let $ctx = _ctx; )?

						#[allow(irrefutable_let_patterns)]
						let $args = args else {
							return Err(QnErr::NoArgs(args.to_vec(), $name));
						};

						Ok($exp)
					}),
				)*

				_ => None?,
			}
	};
}

#[must_use]
pub fn core_map(sym: &str) -> Option<Expr> {
    int_ops(sym)
        .or_else(|| cmp_ops(sym))
        .or_else(|| builtins(sym))
        .or_else(|| list_builtins(sym))
}

pub fn core_func_names() -> Vec<&'static str> {
    vec![
        "+",
        "-",
        "*",
        "/",
        "%",
        ">",
        "<",
        ">=",
        "<=",
        "=",
        "not",
        "list",
        "count",
        "str",
        "prn",
        "println",
        "atom",
        "deref",
        "reset!",
        "swap!",
        "throw",
        "read-string",
        "slurp",
        "bye",
        // special forms
        "def!",
        "let*",
        "do",
        "if",
        "quote",
        "defclass",
        "include-lazy",
        "lazy-const",
        "const-set",
        "const-defined?",
        "constants",
    ]
}

fn int_args(name: &'static str, args: &[Expr]) -> QResult<Vec<i64>> {
    args.iter()
        .map(|it| match it {
            Expr::Int(i) => Ok(*i),
            _ => Err(QnErr::NoArgs(args.to_vec(), name)),
        })
        .collect()
}

fn int_fold(
    name: &'static str,
    args: &[Expr],
    op: fn(i64, i64) -> Option<i64>,
) -> QResult<Expr> {
    let ints = int_args(name, args)?;
    let [init, rest @ ..] = ints.as_slice() else {
        return Err(QnErr::NoArgs(args.to_vec(), name));
    };

    rest.iter()
        .try_fold(*init, |acc, it| {
            op(acc, *it).with_context(|| format!("Arithmetic error in ({name} {acc} {it})"))
        })
        .map(Expr::Int)
        .map_err(QnErr::Any)
}

pub fn int_ops(ident: &str) -> Option<Expr> {
    Some(match ident {
        "+" => Func::new_expr("+", |args, _| int_fold("+", args, i64::checked_add)),
        "*" => Func::new_expr("*", |args, _| int_fold("*", args, i64::checked_mul)),
        "-" => Func::new_expr("-", |args, _| match args {
            [Expr::Int(it)] => it
                .checked_neg()
                .map(Expr::Int)
                .context("Integer Overflow")
                .map_err(QnErr::Any),
            _ => int_fold("-", args, i64::checked_sub),
        }),
        "/" => Func::new_expr("/", |args, _| int_fold("/", args, i64::checked_div)),
        "%" => Func::new_expr("%", |args, _| int_fold("%", args, i64::checked_rem)),
        _ => None?,
    })
}

pub fn cmp_ops(ident: &str) -> Option<Expr> {
    macro_rules! cmp_ops {
		(match $ident:ident => { $($op:tt),+ }) => {
			match $ident {
				$(
					stringify!($op) => Func::new_expr(stringify!($op), |args, _| match args {
						[Expr::Int(l), Expr::Int(r)] => Ok(Expr::Bool(l $op r)),
						_ => Err(QnErr::NoArgs(args.to_vec(), stringify!($op))),
					}),
				)+
				_ => None?,
			}
		};
	}

    Some(cmp_ops!(match ident => { >, <, <=, >= }))
}

pub fn list_builtins(ident: &str) -> Option<Expr> {
    Some(funcmatch! {
        match ident {
            "list", items => Expr::List(items.into()),
            "count", [coll] => match coll {
                Expr::List(l) => Expr::Int(l.len().try_into().context("Integer Overflow")?),
                Expr::Nil => Expr::Int(0),
                other => Err(other.type_err("list"))?,
            },
        }
    })
}

pub fn builtins(ident: &str) -> Option<Expr> {
    Some(funcmatch! {
        match ident {
            "=", [lhs, rhs] => Expr::Bool(lhs == rhs),
            "not", [it] => Expr::Bool(!it.is_truthy()),
            "str", any => Expr::String(
                any.iter()
                    .try_fold(String::new(), |mut acc, it| write!(acc, "{it:#}").map(|()| acc))
                    .map_err(|err| QnErr::Any(err.into()))?
                    .into(),
            ),
            "prn", any => {
                let line = any.iter().map(ToString::to_string).collect::<Vec<_>>();
                println!("{}", line.join(" "));
                Expr::Nil
            },
            "println", any => {
                let line = any.iter().map(|it| format!("{it:#}")).collect::<Vec<_>>();
                println!("{}", line.join(" "));
                Expr::Nil
            },
            "atom", [it] => Expr::Atom(Rc::new(RefCell::new(it.clone()))),
            "deref", [Expr::Atom(it)] => it.borrow().clone(),
            "reset!", [Expr::Atom(atom), new] => {
                atom.replace(new.clone());
                new.clone()
            },
            "swap!", [Expr::Atom(atom), Expr::Func(func), rest @ ..], ctx: ctx => {
                let mut args = vec![atom.borrow().clone()];
                args.extend_from_slice(rest);

                let res = func.apply(ctx, &args)?;
                atom.replace(res.clone());
                res
            },
            "throw", [it] => Err(QnErr::Thrown(it.clone()))?,
            "read-string", [Expr::String(s)] => s.parse()?,
            "slurp", [Expr::String(s)] => Expr::String(
                std::fs::read_to_string(&**s)
                    .with_context(|| format!("Could not read {s}"))?
                    .into(),
            ),
            "bye", [] => Err(QnErr::Stop)?,
        }
    })
}

#[cfg(test)]
mod test {
    use crate::read::{Expr, QnErr};
    use crate::{expr, Runtime};

    use super::core_map;

    fn call(name: &str, args: &[Expr]) -> Result<Expr, QnErr> {
        let Some(Expr::Func(func)) = core_map(name) else {
            panic!("{name} is not a builtin");
        };

        func.apply(&Runtime::new(), args)
    }

    #[test]
    fn test_int_ops() {
        assert_eq!(call("+", &[expr!(int 1), expr!(int 2), expr!(int 3)]).unwrap(), expr!(int 6));
        assert_eq!(call("-", &[expr!(int 5)]).unwrap(), expr!(int -5));
        assert_eq!(call("-", &[expr!(int 5), expr!(int 2)]).unwrap(), expr!(int 3));
        assert_eq!(call("%", &[expr!(int 7), expr!(int 4)]).unwrap(), expr!(int 3));
        assert!(call("/", &[expr!(int 1), expr!(int 0)]).is_err());
        assert!(call("+", &[expr!(int i64::MAX), expr!(int 1)]).is_err());
        assert!(matches!(
            call("+", &[expr!(str "1")]),
            Err(QnErr::NoArgs(_, "+"))
        ));
    }

    #[test]
    fn test_cmp_ops() {
        assert_eq!(call("<", &[expr!(int 1), expr!(int 2)]).unwrap(), expr!(bool true));
        assert_eq!(call(">=", &[expr!(int 1), expr!(int 2)]).unwrap(), expr!(bool false));
        assert!(call("<", &[expr!(int 1)]).is_err());
    }

    #[test]
    fn test_atoms() {
        let atom = call("atom", &[expr!(int 0)]).unwrap();
        let Some(plus) = core_map("+") else { unreachable!() };

        assert_eq!(call("swap!", &[atom.clone(), plus.clone(), expr!(int 2)]).unwrap(), expr!(int 2));
        assert_eq!(call("swap!", &[atom.clone(), plus, expr!(int 3)]).unwrap(), expr!(int 5));
        assert_eq!(call("deref", &[atom.clone()]).unwrap(), expr!(int 5));

        call("reset!", &[atom.clone(), expr!(nil)]).unwrap();
        assert_eq!(call("deref", &[atom]).unwrap(), expr!(nil));
    }

    #[test]
    fn test_misc() {
        assert_eq!(
            call("str", &[expr!(str "a"), expr!(int 1), expr!(nil)]).unwrap(),
            expr!(str "a1nil")
        );
        assert_eq!(
            call("count", &[expr!(list expr!(int 1), expr!(int 2))]).unwrap(),
            expr!(int 2)
        );
        assert!(matches!(call("throw", &[expr!(int 7)]), Err(QnErr::Thrown(Expr::Int(7)))));
        assert!(matches!(call("bye", &[]), Err(QnErr::Stop)));
        assert_eq!(
            call("read-string", &[expr!(str "(+ 1 2)")]).unwrap(),
            expr!(list expr!(sym "+"), expr!(int 1), expr!(int 2))
        );
    }
}
