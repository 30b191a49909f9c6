pub mod charges;
pub mod root;
pub mod tokens;
