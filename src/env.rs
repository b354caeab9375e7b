use std::{cell::RefCell, ffi::OsStr, path::PathBuf};

#[derive(Clone, Debug, Default)]
struct Env {
    /// Directory relative source paths are looked up in.
    source_dir: Option<PathBuf>,
    /// Default instruction limit for `run`.
    step_limit: Option<u64>,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

pub fn init() {
    let value = Env {
        source_dir: var_nonempty("MASM_DIR").map(PathBuf::from),
        step_limit: var_nonempty("MASM_STEP_LIMIT").and_then(|v| v.parse().ok()),
    };
    set_env(value);
}

pub fn source_dir() -> Option<PathBuf> {
    with_env(|env| env.source_dir.clone())
}

pub fn step_limit() -> Option<u64> {
    with_env(|env| env.step_limit)
}

/// Resolve a source path given on the command line against `MASM_DIR`.
pub fn resolve_source(path: PathBuf) -> PathBuf {
    match source_dir() {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path,
    }
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let env = env.as_ref().unwrap_or_else(|| {
            panic!("tried to access environment state before initialization");
        });
        callback(env)
    })
}

fn var_nonempty(name: impl AsRef<OsStr>) -> Option<String> {
    std::env::var(name.as_ref()).ok().filter(|v| !v.is_empty())
}
