//! # Routine
//!
//! The node's command language.
//!
//! ## Grammar
//!
//! - A **command** is whitespace separated terms: `name arg... --flag --key=value`.
//!   Double quotes group a term (`print "two words"`); there are no escapes.
//! - A **routine** is commands separated by `;`, optionally addressed:
//!   `@Miner1 lights on; wait 2` runs on node `Miner1`, `* ping` on every
//!   known node, anything else on this node.
//! - **Macros** are named routine snippets. [`Routine::unpack`] expands
//!   them (whole words only) before a routine is sent elsewhere.
//!
//! ## Example
//!
//! ```
//! use routine::{MacroTable, Routine};
//!
//! let mut macros = MacroTable::new();
//! macros.insert("lights", "light/on --all");
//!
//! let mut routine = Routine::parse("@Miner1 lights; wait 2").unwrap();
//! assert_eq!(routine.target(), "Miner1");
//! assert_eq!(routine.unpack(&macros), "light/on --all;wait 2;");
//! ```

mod command;
mod error;
mod macros;
mod routine;

pub use command::Command;
pub use error::ParseError;
pub use macros::MacroTable;
pub use routine::{Routine, ALL_TARGETS, SELF_TARGET};
