use thiserror::Error;

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum PipeErr {
    #[error("[Pipe] Pipeline already consumed by a terminal operation")]
    ReuseErr,

    #[error("[Collect] Duplicate key `{key}` for to-map collector")]
    DuplicateKeyErr { key: String },

    #[error("[Sort] Elements have no usable natural ordering")]
    UncomparableErr,

    #[error("[Builder] Builder already frozen by `build`")]
    BuilderBuiltErr,

    #[error("[Arg] Count `{count}` of op `{op}` must be non-negative")]
    BadCountErr { op: &'static str, count: i64 },
}
