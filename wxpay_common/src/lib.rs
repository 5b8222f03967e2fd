mod fen;
mod helpers;
mod secret;

pub use fen::{Fen, FenConversionError, CNY_CURRENCY_CODE};
pub use helpers::parse_boolean_flag;
pub use secret::Secret;
