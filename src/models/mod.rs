pub mod token;

pub use token::{now_millis, StoredToken, Token};
