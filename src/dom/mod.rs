pub mod selector;

pub use selector::{IntoSelector, Selector, SelectorKind};
