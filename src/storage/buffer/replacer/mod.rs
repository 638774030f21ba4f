mod lru_k;

pub use lru_k::{LruKReplacer, ReplacerError};
