//! # Codec
//!
//! Reversible text encoding for the payloads nodes exchange.
//!
//! ## Format
//!
//! A minimal brace/bracket/quote grammar:
//!
//! - maps: `{"key":<value>,...}`
//! - lists: `[<value>,...]`
//! - strings: `"..."` with `\"` and `\\` escapes
//! - anything unquoted is taken verbatim as a scalar string
//!
//! There are no numbers or booleans; everything is text. Nested structures
//! are located by depth counting, so nesting is unbounded.
//!
//! ## Channel encryption
//!
//! [`encrypt`]/[`decrypt`] XOR text against a repeating passcode and mark
//! the result with [`ENCRYPTION_MARKER`]. There is no integrity check: a
//! wrong passcode silently yields garbage.
//!
//! ## Example
//!
//! ```
//! use codec::{deserialize, serialize, Value, ValueMap};
//!
//! let mut map = ValueMap::new();
//! map.insert("Command".to_string(), Value::from("ping"));
//! let text = serialize(&Value::Map(map.clone()));
//! assert_eq!(text, r#"{"Command":"ping"}"#);
//! assert_eq!(deserialize(&text).unwrap(), Value::Map(map));
//! ```

mod cipher;
mod error;
mod text;
mod value;

pub use cipher::{decrypt, encrypt, is_encrypted, ENCRYPTION_MARKER};
pub use error::CodecError;
pub use text::{deserialize, deserialize_map, serialize, serialize_map};
pub use value::{Value, ValueMap};
