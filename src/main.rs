use std::rc::Rc;

use qonst::{expr, print::pp_ast, read::{Expr, QnErr}, Runtime, Term};
use tracing_subscriber::EnvFilter;

fn setup_tracing() {
    let filter = EnvFilter::try_from_env("QONST_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    setup_tracing();

    let runtime = Runtime::new();
    let mut args = std::env::args().skip(1);
    let script = args.next();

    runtime.env().set(
        &Rc::from("*ARGS*"),
        Expr::List(args.map(|it| expr!(str it)).collect()),
    );

    if let Some(path) = script {
        tracing::info!(%path, "loading script");

        match runtime.load_file(&path) {
            Ok(_) => {}
            Err(QnErr::Stop) => return,
            Err(e) => eprintln!("Exception before REPL: {e}"),
        }
    }

    let mut term = Term::new();
    loop {
        match rep(&runtime, &mut term) {
            Ok(()) => {}
            Err(QnErr::Stop) => return,
            Err(e) => eprintln!("Exception: {e}"),
        }
    }
}

fn rep(runtime: &Runtime, term: &mut Term) -> Result<(), QnErr> {
    let inp = term.read_expr()?;
    let result = runtime.eval(inp, None)?;
    pp_ast(&result);

    Ok(())
}
