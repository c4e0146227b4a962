use std::cell::RefCell;
use std::rc::Rc;

use fxhash::FxHashMap;

/// A deferred computation producing the value of a lazy constant.
pub type Computation<V, E> = Rc<dyn Fn() -> Result<V, E>>;

/// Pending computations of one class, keyed by constant name.
///
/// Entries are never removed: once a constant has been evaluated the class
/// holds it directly and the registry is not consulted for that name again.
pub struct Registry<V, E> {
    pending: RefCell<FxHashMap<Rc<str>, Computation<V, E>>>,
}

impl<V, E> Default for Registry<V, E> {
    fn default() -> Self {
        Self {
            pending: RefCell::default(),
        }
    }
}

impl<V, E> std::fmt::Debug for Registry<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

impl<V, E> Registry<V, E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `computation` under `name`. An earlier entry of the same name is replaced.
    pub fn register(&self, name: &Rc<str>, computation: Computation<V, E>) {
        self.pending
            .borrow_mut()
            .insert(Rc::clone(name), computation);
    }

    /// The computation stored for `name`.
    ///
    /// Cloned out so that no borrow is held while it runs.
    #[must_use]
    pub fn computation(&self, name: &str) -> Option<Computation<V, E>> {
        self.pending.borrow().get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.pending.borrow().contains_key(name)
    }

    /// registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<Rc<str>> {
        let mut names = self.pending.borrow().keys().cloned().collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }
}
