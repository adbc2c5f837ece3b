pub mod config;
pub mod decompress;
pub mod inspect;
pub mod metadata;
pub mod util;

pub use config::*;
pub use decompress::*;
pub use inspect::*;
pub use metadata::*;
pub use util::*;
