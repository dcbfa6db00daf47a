//! Bencode encoding and decoding ([BEP-3]).
//!
//! Tracker responses, the BEP-10 extension handshake, ut_metadata headers and
//! `.torrent` files are all bencoded. The decoder is strict: integers with
//! leading zeros, non-string dictionary keys and trailing bytes are rejected.
//!
//! ```
//! use btcore::bencode::{decode, encode, Value};
//!
//! let value = decode(b"d8:intervali1800e5:peers0:e").unwrap();
//! assert_eq!(value.get(b"interval").and_then(Value::as_integer), Some(1800));
//! assert_eq!(encode(&value), b"d8:intervali1800e5:peers0:e");
//! ```
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html

mod decode;
mod encode;
mod error;
mod value;

pub use decode::{decode, decode_prefix, raw_dict_entry, Decoder};
pub use encode::encode;
pub use error::BencodeError;
pub use value::Value;

#[cfg(test)]
mod tests;
