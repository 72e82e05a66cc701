//! The crawl engine.
//!
//! Discovery works outward: every node the network mentions gets asked for
//! more nodes and for peers of the target, so coverage grows with each
//! response. There is no termination condition; the crawl runs until the
//! caller stops driving it, bounded by the store's capacity and whatever
//! the network stops answering.

mod engine;
mod token;

pub use engine::Crawler;
pub use token::TokenRotator;

#[cfg(test)]
mod tests;
