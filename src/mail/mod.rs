pub mod digest;
pub mod flags;
pub mod headers;

pub use digest::ContentDigest;
pub use flags::{Flag, FlagSet};
pub use headers::{Address, MailHeaders, ParsedHeaders};
