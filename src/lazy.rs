use std::convert::Infallible;
use std::sync::OnceLock;

/// A value computed on first use and cached afterwards.
///
/// The initializer may fail. A failure is handed to the caller and nothing
/// is cached, so the next [`Lazy::force`] runs the initializer again.
/// Concurrent first uses may both run `init`; the first value stored wins.
pub struct Lazy<T: 'static, E = Infallible> {
    cell: OnceLock<T>,
    init: fn() -> Result<T, E>,
}

impl<T, E> Lazy<T, E> {
    pub const fn new(init: fn() -> Result<T, E>) -> Self {
        Self {
            cell: OnceLock::new(),
            init,
        }
    }

    pub fn force(&self) -> Result<&T, E> {
        if let Some(val) = self.cell.get() {
            return Ok(val);
        }

        let val = (self.init)()?;
        Ok(self.cell.get_or_init(|| val))
    }

    /// the cached value, without running the initializer
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }
}

impl<T> std::ops::Deref for Lazy<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        match self.force() {
            Ok(val) => val,
            Err(never) => match never {},
        }
    }
}
