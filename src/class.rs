//! Owning classes and their lazily evaluated constants.
//!
//! A [`Class`] keeps a table of ordinary constants. Looking up a name that
//! is not in the table is handed to the class's [`ConstMissing`] handler.
//! The default handler fails with [`Uninitialized`]. Including lazy
//! constants swaps in a handler that evaluates a registered computation,
//! installs the result as an ordinary constant and returns it, or hands the
//! lookup on to the handler it replaced.
//!
//! ```
//! use qonst::class::Class;
//! use qonst::read::QnErr;
//!
//! let model = Class::<i64, QnErr>::new("Model");
//! model.lazy_const("TOTAL", || Ok(2 + 2));
//!
//! assert!(!model.const_defined("TOTAL"));
//! assert_eq!(model.const_get("TOTAL").unwrap(), 4);
//! assert!(model.const_defined("TOTAL"));
//! assert!(model.const_get("MISSING_NAME").is_err());
//! ```

use std::cell::{OnceCell, RefCell};
use std::rc::Rc;

use fxhash::FxHashMap;
use thiserror::Error;

pub mod registry;
pub use registry::{Computation, Registry};

/// The error for a constant that is neither defined nor resolvable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("uninitialized constant {owner}::{name}")]
pub struct Uninitialized {
    pub owner: Rc<str>,
    pub name: Rc<str>,
}

/// Handles lookups of names the class has no constant for.
pub trait ConstMissing<V, E> {
    fn const_missing(&self, class: &Class<V, E>, name: &str) -> Result<V, E>;
}

/// The handler every class starts out with.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

impl<V, E: From<Uninitialized>> ConstMissing<V, E> for Unbound {
    fn const_missing(&self, class: &Class<V, E>, name: &str) -> Result<V, E> {
        Err(Uninitialized {
            owner: class.name(),
            name: name.into(),
        }
        .into())
    }
}

/// Resolves missing constants from a [`Registry`], falling back to the
/// handler that was installed before it.
pub struct LazyConstants<V, E> {
    registry: Rc<Registry<V, E>>,
    previous: Rc<dyn ConstMissing<V, E>>,
}

impl<V: Clone, E> ConstMissing<V, E> for LazyConstants<V, E> {
    fn const_missing(&self, class: &Class<V, E>, name: &str) -> Result<V, E> {
        let Some(computation) = self.registry.computation(name) else {
            tracing::debug!(owner = %class.name, name, "no lazy constant, falling back");
            return self.previous.const_missing(class, name);
        };

        tracing::debug!(owner = %class.name, name, "evaluating lazy constant");
        let val = computation().inspect_err(|_| {
            tracing::debug!(owner = %class.name, name, "lazy constant failed, left pending");
        })?;

        class.const_set(name, val.clone());
        Ok(val)
    }
}

pub struct Class<V, E> {
    name: Rc<str>,
    consts: RefCell<FxHashMap<Rc<str>, V>>,
    missing: RefCell<Rc<dyn ConstMissing<V, E>>>,
    lazy: OnceCell<Rc<Registry<V, E>>>,
}

impl<V, E> std::fmt::Debug for Class<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("constants", &self.constants())
            .field("lazy", &self.lazy.get())
            .finish_non_exhaustive()
    }
}

impl<V: 'static, E: From<Uninitialized> + 'static> Class<V, E> {
    #[must_use]
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Self::with_const_missing(name, Rc::new(Unbound))
    }
}

impl<V, E> Class<V, E> {
    /// A class whose missing constants go to `missing` instead of [`Unbound`].
    #[must_use]
    pub fn with_const_missing(
        name: impl Into<Rc<str>>,
        missing: Rc<dyn ConstMissing<V, E>>,
    ) -> Self {
        Self {
            name: name.into(),
            consts: RefCell::default(),
            missing: RefCell::new(missing),
            lazy: OnceCell::new(),
        }
    }

    pub fn name(&self) -> Rc<str> {
        Rc::clone(&self.name)
    }

    pub fn const_set(&self, name: &str, val: V) {
        self.consts.borrow_mut().insert(name.into(), val);
    }

    #[must_use]
    pub fn const_defined(&self, name: &str) -> bool {
        self.consts.borrow().contains_key(name)
    }

    /// names of the constants defined directly on the class, sorted
    #[must_use]
    pub fn constants(&self) -> Vec<Rc<str>> {
        let mut names = self.consts.borrow().keys().cloned().collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    /// The registry of pending lazy constants, if the class has included them.
    pub fn lazy_registry(&self) -> Option<&Registry<V, E>> {
        self.lazy.get().map(|it| &**it)
    }
}

impl<V: Clone + 'static, E: 'static> Class<V, E> {
    pub fn const_get(&self, name: &str) -> Result<V, E> {
        if let Some(val) = self.consts.borrow().get(name) {
            return Ok(val.clone());
        }

        // the handler may run arbitrary code, including lookups on this class
        let missing = Rc::clone(&self.missing.borrow());
        missing.const_missing(self, name)
    }

    /// Opt the class into lazy constants.
    ///
    /// The current missing handler is kept as the fallback of the lazy one.
    /// Calling this again returns the registry installed the first time.
    pub fn include_lazy_constants(&self) -> &Registry<V, E> {
        self.lazy.get_or_init(|| {
            let registry = Rc::new(Registry::new());
            let previous = Rc::clone(&self.missing.borrow());

            *self.missing.borrow_mut() = Rc::new(LazyConstants {
                registry: Rc::clone(&registry),
                previous,
            });

            tracing::trace!(owner = %self.name, "included lazy constants");
            registry
        })
    }

    /// Define `name` to be the result of `computation`, run on first lookup.
    ///
    /// Once `name` has been looked up, registering it again has no effect:
    /// the class already holds the constant and never asks the registry.
    pub fn lazy_const<F>(&self, name: &str, computation: F)
    where
        F: Fn() -> Result<V, E> + 'static,
    {
        tracing::trace!(owner = %self.name, name, "registered lazy constant");
        self.include_lazy_constants()
            .register(&Rc::from(name), Rc::new(computation));
    }
}

#[cfg(test)]
mod test {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::{Class, ConstMissing, Uninitialized};

    #[derive(Debug, PartialEq)]
    enum TestErr {
        Uninitialized(Uninitialized),
        Boom(u32),
    }

    impl From<Uninitialized> for TestErr {
        fn from(value: Uninitialized) -> Self {
            Self::Uninitialized(value)
        }
    }

    fn counted<T: Clone + 'static>(
        calls: &Rc<Cell<u32>>,
        val: T,
    ) -> impl Fn() -> Result<T, TestErr> + 'static {
        let calls = Rc::clone(calls);
        move || {
            calls.set(calls.get() + 1);
            Ok(val.clone())
        }
    }

    #[test]
    fn test_single_evaluation() {
        let calls = Rc::new(Cell::new(0));
        let model = Class::<i64, TestErr>::new("Model");
        model.lazy_const("TOTAL", counted(&calls, 2 + 2));

        assert_eq!(calls.get(), 0);
        assert_eq!(model.const_get("TOTAL"), Ok(4));
        assert_eq!(model.const_get("TOTAL"), Ok(4));
        assert_eq!(model.const_get("TOTAL"), Ok(4));
        assert_eq!(calls.get(), 1);
        assert_eq!(model.constants(), vec![Rc::from("TOTAL")]);
    }

    #[test]
    fn test_value_identity() {
        let model = Class::<Rc<String>, TestErr>::new("Model");
        model.lazy_const("ROOT", || Ok(Rc::new("root".to_owned())));

        let first = model.const_get("ROOT").unwrap();
        let second = model.const_get("ROOT").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_overwrite_before_use() {
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));
        let model = Class::<&str, TestErr>::new("Model");

        model.lazy_const("NAME", counted(&first, "first"));
        model.lazy_const("NAME", counted(&second, "second"));

        assert_eq!(model.const_get("NAME"), Ok("second"));
        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
    }

    #[test]
    fn test_overwrite_after_use_is_noop() {
        let calls = Rc::new(Cell::new(0));
        let model = Class::<i64, TestErr>::new("Model");

        model.lazy_const("X", || Ok(1));
        assert_eq!(model.const_get("X"), Ok(1));

        model.lazy_const("X", counted(&calls, 2));
        assert_eq!(model.const_get("X"), Ok(1));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_fallback_matches_plain_class() {
        let plain = Class::<i64, TestErr>::new("Model");
        let lazy = Class::<i64, TestErr>::new("Model");
        lazy.lazy_const("OTHER", || Ok(0));

        let expected = TestErr::Uninitialized(Uninitialized {
            owner: "Model".into(),
            name: "MISSING_NAME".into(),
        });
        assert_eq!(plain.const_get("MISSING_NAME"), Err(expected));
        assert_eq!(
            lazy.const_get("MISSING_NAME"),
            plain.const_get("MISSING_NAME")
        );
        assert_eq!(
            lazy.const_get("MISSING_NAME").unwrap_err().to_string_lossy(),
            "uninitialized constant Model::MISSING_NAME"
        );
    }

    impl TestErr {
        fn to_string_lossy(&self) -> String {
            match self {
                Self::Uninitialized(it) => it.to_string(),
                Self::Boom(n) => format!("boom {n}"),
            }
        }
    }

    #[test]
    fn test_errors_are_not_cached() {
        let calls = Rc::new(Cell::new(0));
        let model = Class::<i64, TestErr>::new("Model");

        let counter = Rc::clone(&calls);
        model.lazy_const("FLAKY", move || {
            counter.set(counter.get() + 1);
            match counter.get() {
                1 => Err(TestErr::Boom(1)),
                n => Ok(i64::from(n)),
            }
        });

        assert_eq!(model.const_get("FLAKY"), Err(TestErr::Boom(1)));
        assert!(!model.const_defined("FLAKY"));
        assert_eq!(model.const_get("FLAKY"), Ok(2));
        assert_eq!(model.const_get("FLAKY"), Ok(2));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_custom_fallback_is_preserved() {
        struct Default42;
        impl ConstMissing<i64, TestErr> for Default42 {
            fn const_missing(&self, _: &Class<i64, TestErr>, name: &str) -> Result<i64, TestErr> {
                if name == "ANSWER" {
                    Ok(42)
                } else {
                    Err(TestErr::Boom(404))
                }
            }
        }

        let class = Class::<i64, TestErr>::with_const_missing("Deep", Rc::new(Default42));
        class.lazy_const("TOTAL", || Ok(4));

        assert_eq!(class.const_get("TOTAL"), Ok(4));
        assert_eq!(class.const_get("ANSWER"), Ok(42));
        assert_eq!(class.const_get("NOPE"), Err(TestErr::Boom(404)));
        assert!(!class.const_defined("ANSWER"));
    }

    #[test]
    fn test_include_is_idempotent() {
        let model = Class::<i64, TestErr>::new("Model");
        assert!(model.lazy_registry().is_none());

        model.include_lazy_constants();
        model.lazy_const("A", || Ok(1));
        model.include_lazy_constants();
        model.lazy_const("B", || Ok(2));

        let registry = model.lazy_registry().unwrap();
        assert_eq!(registry.names(), vec![Rc::from("A"), Rc::from("B")]);
        assert_eq!(model.const_get("A"), Ok(1));
        assert_eq!(
            model.const_get("C"),
            Err(TestErr::Uninitialized(Uninitialized {
                owner: "Model".into(),
                name: "C".into(),
            }))
        );
    }

    #[test]
    fn test_computation_may_reference_other_constants() {
        let model = Rc::new(Class::<i64, TestErr>::new("Model"));
        model.const_set("BASE", 10);

        let weak = Rc::downgrade(&model);
        model.lazy_const("DOUBLE", move || {
            let model = weak.upgrade().ok_or(TestErr::Boom(0))?;
            Ok(model.const_get("BASE")? * 2)
        });

        let weak = Rc::downgrade(&model);
        model.lazy_const("QUAD", move || {
            let model = weak.upgrade().ok_or(TestErr::Boom(0))?;
            Ok(model.const_get("DOUBLE")? * 2)
        });

        assert_eq!(model.const_get("QUAD"), Ok(40));
        assert_eq!(model.constants().len(), 3);
    }

    #[test]
    fn test_computation_may_register_constants() {
        let model = Rc::new(Class::<i64, TestErr>::new("Model"));
        let other = Rc::new(Class::<i64, TestErr>::new("Other"));

        let (weak_model, weak_other) = (Rc::downgrade(&model), Rc::downgrade(&other));
        model.lazy_const("A", move || {
            let model = weak_model.upgrade().ok_or(TestErr::Boom(0))?;
            let other = weak_other.upgrade().ok_or(TestErr::Boom(0))?;

            model.lazy_const("B", || Ok(2));
            // first registration on `other` also swaps its handler
            other.lazy_const("C", || Ok(3));
            Ok(1)
        });

        assert!(!model.const_defined("B"));
        assert_eq!(model.const_get("A"), Ok(1));
        assert_eq!(model.const_get("B"), Ok(2));
        assert_eq!(other.const_get("C"), Ok(3));

        let names = model.lazy_registry().map(|it| it.names()).unwrap_or_default();
        let expected: [Rc<str>; 2] = [Rc::from("A"), Rc::from("B")];
        assert_eq!(names, expected);
        assert_eq!(model.constants(), expected);
    }

    #[test]
    fn test_registries_are_per_class() {
        let left = Class::<i64, TestErr>::new("Left");
        let right = Class::<i64, TestErr>::new("Right");
        left.lazy_const("SAME", || Ok(1));
        right.lazy_const("SAME", || Ok(2));

        assert_eq!(left.const_get("SAME"), Ok(1));
        assert_eq!(right.const_get("SAME"), Ok(2));
    }
}
