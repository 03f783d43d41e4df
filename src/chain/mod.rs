pub mod abi;
pub mod reader;
pub mod wallet;

pub use reader::{ChainReader, Position};
pub use wallet::load_wallet;
