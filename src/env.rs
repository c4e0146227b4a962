use std::cell::RefCell;
use std::rc::{Rc, Weak};

use fxhash::FxHashMap;

use crate::read::Expr;

pub use self::core::{core_func_names, core_map};

mod core;

/// The bindings of one scope, shared by every [`Env`] rebuilt from it.
pub type Frame = Rc<RefCell<FxHashMap<Rc<str>, Expr>>>;

#[derive(Default)]
pub struct Inner {
    pub(crate) outer: Option<Env>,
    pub(crate) data: Frame,
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Env::Inner")
            .field("outer", &self.outer)
            .field("data", &self.data)
            .finish()
    }
}

#[derive(Clone, Default, Debug)]
pub struct Env(Rc<Inner>);

/// An [`Env`] that does not keep its bindings alive.
///
/// Lazy constant bodies hold the global scope through one of these, since
/// the class they are registered on is itself bound there.
#[derive(Clone, Debug)]
pub struct WeakEnv(Weak<Inner>);

impl WeakEnv {
    #[must_use]
    pub fn upgrade(&self) -> Option<Env> {
        self.0.upgrade().map(Env)
    }
}

impl Env {
    #[must_use]
    pub fn new(outer: Option<Self>) -> Self {
        Self(Rc::new(Inner {
            outer,
            data: Frame::default(),
        }))
    }

    #[must_use]
    pub fn with_outer(outer: Self) -> Self {
        Self::new(Some(outer))
    }

    /// The frames between `self` and `global`, innermost first.
    ///
    /// `global` itself is not included. Together with [`Env::rebuild`] this
    /// lets a scope be kept without keeping `global` alive.
    #[must_use]
    pub fn frames_until(&self, global: &Self) -> Vec<Frame> {
        let mut frames = vec![];
        let mut env = Some(self);

        while let Some(it) = env.filter(|it| !Rc::ptr_eq(&it.0, &global.0)) {
            frames.push(Rc::clone(&it.0.data));
            env = it.0.outer.as_ref();
        }

        frames
    }

    /// Stack `frames` (innermost first) back on top of `global`.
    #[must_use]
    pub fn rebuild(frames: &[Frame], global: Self) -> Self {
        frames.iter().rev().fold(global, |outer, data| {
            Self(Rc::new(Inner {
                outer: Some(outer),
                data: Rc::clone(data),
            }))
        })
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakEnv {
        WeakEnv(Rc::downgrade(&self.0))
    }

    #[allow(clippy::must_use_candidate)]
    pub fn remove(&self, ident: &str) -> Option<Expr> {
        self.0.data.borrow_mut().remove(ident)
    }

    /// Bound value of `ident` in this or an enclosing scope, else the builtin of that name.
    #[must_use]
    pub fn get(&self, ident: &str) -> Option<Expr> {
        self.find(ident).map_or_else(
            || core_map(ident),
            |env| env.0.data.borrow().get(ident).cloned(),
        )
    }

    pub fn set(&self, ident: &Rc<str>, val: Expr) {
        self.0.data.borrow_mut().insert(Rc::clone(ident), val);
    }

    #[must_use]
    pub fn find(&self, ident: &str) -> Option<Self> {
        // check if self contains the key,
        self.0
            .data
            .borrow()
            .contains_key(ident)
            // then return self
            .then(|| self.clone())
            // or delegate to the outer env
            .or_else(|| self.0.outer.as_ref().and_then(|it| it.find(ident)))
    }
}
