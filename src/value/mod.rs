// Typed field decoding: strategy implementations per value family.

pub mod boolean;
pub mod date;
pub mod key;
pub mod locale;
pub mod nested;
pub mod number;

pub use locale::{DateStyle, DefaultLocaleOps, LocaleOps};
pub use nested::{JsonCodec, NestedCodec};
