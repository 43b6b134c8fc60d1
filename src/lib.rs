//! Reflection-based Protocol Buffers runtime.
//!
//! `protodyn` loads message schemas at runtime and decodes the protobuf wire
//! format against them, with no generated code. Schemas arrive as JSON
//! descriptors (built in) or `.proto` text (through a parser collaborator),
//! are resolved into an indexed type registry, and drive a generic,
//! table-interpreting decoder.
//!
//! ```no_run
//! use protodyn::{Decoder, Root};
//!
//! fn main() -> protodyn::Result<()> {
//!     let mut root = Root::new();
//!     root.add_json_str(None, r#"{
//!         "nested": { "M": { "fields": {
//!             "a": { "type": "int32", "id": 1 },
//!             "b": { "type": "string", "id": 2 }
//!         } } }
//!     }"#)?;
//!     root.resolve_all()?;
//!
//!     let decoder = Decoder::new(&root)?;
//!     let msg = decoder.decode("M", &[0x08, 0x96, 0x01, 0x12, 0x02, 0x68, 0x69])?;
//!     assert_eq!(msg.get(&root, "a").and_then(|v| v.as_i32()), Some(150));
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod bundled;
pub mod decode;
pub mod error;
pub mod load;
pub mod paths;
pub mod reader;
pub mod schema;
pub mod value;
pub mod wire;

pub use decode::Decoder;
pub use error::{Error, Result};
pub use load::{Fetch, FsFetch, LoadOptions, Loader, Parse, ParseOutput};
pub use reader::Reader;
pub use schema::Root;
pub use value::{MapKey, MessageValue, Value};
