//! Bencode encoding and decoding ([BEP-3]).
//!
//! Bencode is the serialization format the BitTorrent ecosystem uses on the
//! wire; every KRPC datagram is a single bencoded dictionary. Four term
//! types exist: integers (`i42e`), byte strings (`4:spam`), lists
//! (`l...e`) and dictionaries (`d...e`, keys sorted lexicographically).
//!
//! Encoding cannot fail; decoding is strict about integer syntax, rejects
//! trailing bytes and caps nesting depth so a hostile datagram cannot
//! recurse the parser into the ground.
//!
//! # Examples
//!
//! ```
//! use dht_sonar::bencode::{decode, encode, Value};
//!
//! let value = decode(b"d3:fooi42ee").unwrap();
//! assert_eq!(value.get(b"foo").and_then(Value::as_int), Some(42));
//! assert_eq!(encode(&value), b"d3:fooi42ee");
//! ```
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html

mod decode;
mod encode;
mod error;
mod value;

pub use decode::decode;
pub use encode::encode;
pub use error::BencodeError;
pub use value::Value;

#[cfg(test)]
mod tests;
