mod chain;
mod header;

pub use chain::{HeaderChain, HeaderSource};
pub use header::BlockHeader;
