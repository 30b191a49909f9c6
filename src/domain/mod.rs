pub mod charge;
pub mod token;
pub mod txid;

pub use charge::*;
pub use token::*;
pub use txid::{generate_txid, is_valid_txid, TXID_LEN};
