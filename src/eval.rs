use std::rc::Rc;

use anyhow::anyhow;

use crate::env::Env;
use crate::read::{Class, ClassRef, Expr, QResult, QnErr};
use crate::Runtime;

macro_rules! err {
    (form: $form:literal) => {
        return ControlFlow::Break(Err(QnErr::Any(anyhow!(concat!("Correct Form: ", $form)))))
    };
}

macro_rules! ret_ok {
    ($ex:expr) => {
        ControlFlow::Break(Ok($ex))
    };
}

macro_rules! early_ret {
    ($e:expr) => {
        match $e {
            Ok(o) => o,
            Err(e) => return ControlFlow::Break(Err(e)),
        }
    };
}

enum ControlFlow<B, C> {
    Break(B),
    BreakNone,
    Continue(C),
}

struct EvalTco {
    ast: Expr,
    env: Option<Env>,
}

/// Counts nested evaluations for as long as it is alive.
struct Depth<'a>(&'a Runtime);

impl<'a> Depth<'a> {
    fn enter(rt: &'a Runtime) -> QResult<Self> {
        let depth = rt.depth.get() + 1;
        if depth > Runtime::MAX_DEPTH {
            return Err(QnErr::DepthExceeded(Runtime::MAX_DEPTH));
        }

        rt.depth.set(depth);
        Ok(Self(rt))
    }
}

impl Drop for Depth<'_> {
    fn drop(&mut self) {
        self.0.depth.set(self.0.depth.get() - 1);
    }
}

impl Runtime {
    /// How deeply evaluations may nest, e.g. through lazy constants that refer to each other.
    pub const MAX_DEPTH: usize = 256;

    pub fn eval_mult(&self, ast: &[Expr], env: Option<&Env>) -> QResult<Vec<Expr>> {
        ast.iter()
            .map(|it| self.eval(it.clone(), env.cloned()))
            .collect()
    }

    pub fn eval(&self, mut ast: Expr, mut env: Option<Env>) -> QResult<Expr> {
        let _depth = Depth::enter(self)?;

        'l: loop {
            return match ast {
                Expr::List(ref lst) if lst.is_empty() => Ok(ast.clone()),
                Expr::List(ref lst) => {
                    let Expr::Sym(ident) = &lst[0] else {
                        return self.apply_func(lst, env.as_ref());
                    };

                    match self.specials(ident, lst, env.as_ref()) {
                        ControlFlow::Break(res) => res,
                        ControlFlow::BreakNone => self.apply_func(lst, env.as_ref()),
                        ControlFlow::Continue(EvalTco {
                            ast: new_ast,
                            env: new_env,
                        }) => {
                            ast = new_ast;
                            env = new_env.or(env);
                            continue 'l;
                        }
                    }
                }

                _ => self.replace_eval(ast.clone(), env.as_ref()),
            };
        }
    }

    #[allow(clippy::too_many_lines)]
    fn specials(
        &self,
        ident: &str,
        lst: &[Expr],
        env: Option<&Env>,
    ) -> ControlFlow<QResult<Expr>, EvalTco> {
        match (ident, &lst[1..]) {
            ("def!", [Expr::Sym(ident), expr]) => {
                let res = early_ret!(self.eval(expr.clone(), env.cloned()));
                env.unwrap_or(&self.env).set(ident, res.clone());

                ret_ok!(res)
            }
            ("def!", _) => err!(form: "(def! <sym> <expr>)"),

            ("let*", [Expr::List(new_bindings), to_eval]) => {
                let env = Env::with_outer(env.unwrap_or(&self.env).clone());

                for pair in new_bindings.chunks(2) {
                    let [Expr::Sym(ident), expr] = pair else {
                        err!(form: "(let* (<sym> <expr>)* <expr>)")
                    };

                    let val = early_ret!(self.eval(expr.clone(), Some(env.clone())));
                    env.set(ident, val);
                }

                ControlFlow::Continue(EvalTco {
                    ast: to_eval.clone(),
                    env: Some(env),
                })
            }
            ("let*", _) => err!(form: "(let* (<sym> <expr>)* <expr>)"),

            ("if", [cond, then, rest @ ..]) if rest.len() <= 1 => {
                let cond = early_ret!(self.eval(cond.clone(), env.cloned()));

                ControlFlow::Continue(EvalTco {
                    ast: if cond.is_truthy() {
                        then.clone()
                    } else {
                        rest.first().cloned().unwrap_or_default()
                    },
                    env: None,
                })
            }
            ("if", _) => err!(form: "(if <condition> <then> ?<else>)"),

            ("do", [start @ .., end]) => {
                for exp in start {
                    early_ret!(self.eval(exp.clone(), env.cloned()));
                }

                ControlFlow::Continue(EvalTco {
                    ast: end.clone(),
                    env: None,
                })
            }
            ("do", []) => ret_ok!(Expr::Nil),

            ("quote", [it]) => ret_ok!(it.clone()),
            ("quote", _) => err!(form: "(quote <expr>)"),

            ("defclass", [Expr::Sym(name)]) => {
                if let Some(Expr::Class(class)) = self.env.get(name) {
                    return ret_ok!(Expr::Class(class));
                }

                let class = Expr::Class(ClassRef(Rc::new(Class::new(Rc::clone(name)))));
                self.env.set(name, class.clone());

                ret_ok!(class)
            }
            ("defclass", _) => err!(form: "(defclass <sym>)"),

            ("include-lazy", [class]) => {
                let class = early_ret!(self.eval_class(class, env));
                class.include_lazy_constants();

                ret_ok!(Expr::Class(class))
            }
            ("include-lazy", _) => err!(form: "(include-lazy <class>)"),

            ("lazy-const", [class, Expr::Sym(name), body]) => {
                let class = early_ret!(self.eval_class(class, env));
                class.lazy_const(name, self.deferred(&class, name, body.clone(), env));

                ret_ok!(Expr::Nil)
            }
            ("lazy-const", _) => err!(form: "(lazy-const <class> <sym> <expr>)"),

            ("const-set", [class, Expr::Sym(name), expr]) => {
                let class = early_ret!(self.eval_class(class, env));
                let val = early_ret!(self.eval(expr.clone(), env.cloned()));
                class.const_set(name, val.clone());

                ret_ok!(val)
            }
            ("const-set", _) => err!(form: "(const-set <class> <sym> <expr>)"),

            ("const-defined?", [class, Expr::Sym(name)]) => {
                let class = early_ret!(self.eval_class(class, env));

                ret_ok!(Expr::Bool(class.const_defined(name)))
            }
            ("const-defined?", _) => err!(form: "(const-defined? <class> <sym>)"),

            ("constants", [class]) => {
                let class = early_ret!(self.eval_class(class, env));

                ret_ok!(Expr::List(
                    class.constants().into_iter().map(Expr::Sym).collect()
                ))
            }
            ("constants", _) => err!(form: "(constants <class>)"),

            _ => ControlFlow::BreakNone,
        }
    }

    /// The computation behind `(lazy-const <class> <name> <body>)`.
    ///
    /// `body` is evaluated in the scope it was written in. The local frames
    /// are kept, the global environment only weakly, as the class itself is
    /// bound there.
    fn deferred(
        &self,
        class: &Class,
        name: &Rc<str>,
        body: Expr,
        env: Option<&Env>,
    ) -> impl Fn() -> QResult<Expr> + 'static {
        let runtime = self.downgrade();
        let frames = env.map(|it| it.frames_until(&self.env)).unwrap_or_default();
        let owner = class.name();
        let name = Rc::clone(name);

        move || {
            let runtime = runtime.upgrade().ok_or_else(|| {
                anyhow!("Environment of {owner}::{name} was dropped before its first use")
            })?;
            let scope = Env::rebuild(&frames, runtime.env.clone());

            runtime.eval(body.clone(), Some(scope))
        }
    }

    fn eval_class(&self, class: &Expr, env: Option<&Env>) -> QResult<ClassRef> {
        match self.eval(class.clone(), env.cloned())? {
            Expr::Class(class) => Ok(class),
            other => Err(other.type_err("class")),
        }
    }

    fn apply_func(&self, lst: &[Expr], env: Option<&Env>) -> QResult<Expr> {
        match self.eval_mult(lst, env)?.as_slice() {
            [Expr::Func(func), args @ ..] => func.apply(self, args),
            [other, ..] => Err(other.type_err("function")),
            [] => Ok(Expr::Nil),
        }
    }

    /// named eval_ast in mal:
    /// resolves symbols and constant paths, other atoms evaluate to themselves
    pub fn replace_eval(&self, ast: Expr, env: Option<&Env>) -> QResult<Expr> {
        let env = env.unwrap_or(&self.env);

        match ast {
            Expr::Sym(sym) => env.get(&sym).ok_or(QnErr::UnboundSymbol(sym)),
            Expr::Path { owner, name } => match env.get(&owner) {
                Some(Expr::Class(class)) => class.const_get(&name),
                Some(other) => Err(other.type_err("class")),
                None => Err(QnErr::UnboundSymbol(owner)),
            },
            val => Ok(val),
        }
    }
}
