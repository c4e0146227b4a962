#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

use std::{cell::Cell, path::PathBuf, rc::Rc};

use anyhow::Context;
use reedline::{DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline};

use env::{Env, WeakEnv};
use read::{Expr, QResult};
use tap::Pipe;

type FuncT = fn(&[Expr], &Runtime) -> QResult<Expr>;

/// Evaluation state shared by everything evaluated with it.
///
/// Cloning is cheap and the clones share one global environment.
#[derive(Clone, Default)]
pub struct Runtime {
    env: Env,
    depth: Rc<Cell<usize>>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(Runtime))
            .field("env", &self.env)
            .finish_non_exhaustive()
    }
}

/// A [`Runtime`] that does not keep the global environment alive.
#[derive(Clone, Debug)]
pub struct WeakRuntime {
    env: WeakEnv,
    depth: Rc<Cell<usize>>,
}

impl WeakRuntime {
    pub fn upgrade(&self) -> Option<Runtime> {
        Some(Runtime {
            env: self.env.upgrade()?,
            depth: Rc::clone(&self.depth),
        })
    }
}

#[derive(Clone)]
pub struct Func(&'static str, FuncT);

impl Eq for Func {}
// No two builtins share a name
impl PartialEq for Func {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

pub struct Term {
    prompt: DefaultPrompt,
    reedline: Reedline,
}

impl Func {
    #[inline]
    pub fn apply(&self, ctx: &Runtime, args: &[Expr]) -> QResult<Expr> {
        self.1(args, ctx)
    }

    #[inline]
    pub fn new_expr(label: &'static str, f: FuncT) -> Expr {
        Expr::Func(Self(label, f))
    }

    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl Runtime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// the global environment
    pub const fn env(&self) -> &Env {
        &self.env
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakRuntime {
        WeakRuntime {
            env: self.env.downgrade(),
            depth: Rc::clone(&self.depth),
        }
    }

    /// Evaluate every form of `src`, returning the value of the last one.
    pub fn eval_str(&self, src: &str) -> QResult<Expr> {
        read::read_all(src)?
            .into_iter()
            .try_fold(Expr::Nil, |_, form| self.eval(form, None))
    }

    pub fn load_file(&self, path: &str) -> QResult<Expr> {
        std::fs::read_to_string(path)
            .with_context(|| format!("Could not read {path}"))?
            .pipe(|src| self.eval_str(&src))
    }
}

impl Term {
    pub fn read_expr(&mut self) -> QResult<Expr> {
        read::Input::get(self)?.tokenize()?.try_into()
    }
}

impl Default for Term {
    fn default() -> Self {
        Self::new()
    }
}

impl Term {
    #[must_use]
    pub fn new() -> Self {
        let path = history_path();

        let commands = env::core_func_names();
        let highlighter = highlighter::Lisp::new(commands);

        let mut reedline = Reedline::create().with_highlighter(Box::new(highlighter));

        match FileBackedHistory::with_file(50, path.clone()) {
            Ok(history) => reedline = reedline.with_history(Box::new(history)),
            Err(err) => tracing::warn!(?path, %err, "history disabled"),
        }

        Self {
            prompt: DefaultPrompt {
                left_prompt: DefaultPromptSegment::Basic("qonst".to_owned()),
                right_prompt: DefaultPromptSegment::Empty,
            },
            reedline,
        }
    }
}

/// `history.txt` inside the data directory, which is created if needed.
fn history_path() -> PathBuf {
    let Some(dirs) = directories_next::ProjectDirs::from("io", "qonst", "qonst") else {
        return PathBuf::from(".qonst-history");
    };

    let dir = dirs.data_dir();
    if let Err(err) = std::fs::create_dir_all(dir) {
        tracing::warn!(?dir, %err, "could not create data directory");
    }

    dir.join("history.txt")
}

pub mod class;
pub mod env;
pub mod eval;
pub mod lazy;
pub mod print;
pub mod read;
mod highlighter;
