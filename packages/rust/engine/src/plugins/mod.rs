//! Built-in plugins registered by [`Registry::with_builtins`](crate::Registry::with_builtins).

mod banner;
mod strip_comments;
mod trim_whitespace;

pub use banner::Banner;
pub use strip_comments::StripComments;
pub use trim_whitespace::TrimWhitespace;
