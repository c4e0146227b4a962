#[macro_export]
macro_rules! expr {
    (str $it:expr) => {
        $crate::read::Expr::String($it.into())
    };

    (int $it:expr) => {
        $crate::read::Expr::Int($it)
    };

    (sym $it:expr) => {
        $crate::read::Expr::Sym($it.into())
    };

    (path $owner:expr, $name:expr) => {
        $crate::read::Expr::Path {
            owner: $owner.into(),
            name: $name.into(),
        }
    };

    (list $($it:expr),*) => {
        $crate::read::Expr::List(::std::rc::Rc::new([$($it), *]))
    };

    (nil) => {
        $crate::read::Expr::Nil
    };

    (bool $it:literal) => {
        $crate::read::Expr::Bool($it)
    };

    (atom $it:expr) => {
        $crate::read::Expr::Atom(::std::rc::Rc::new(::std::cell::RefCell::new($it)))
    };

	($it:ident) => {
        $crate::read::Expr::Sym(stringify!($it).into())
    };
}
