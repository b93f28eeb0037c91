//! S3 XML bodies for unis3.
//!
//! Both directions of the RestXml protocol live here. The client serializes
//! request bodies and parses response bodies; the in-memory server does the
//! reverse with the same code, so the two always agree on the wire format.
//!
//! # Key components
//!
//! - [`S3Serialize`] and [`to_xml`] write a value as a complete document
//! - [`S3Deserialize`] and [`from_xml`] parse a document into a value
//! - [`error_to_xml`] and [`parse_error_body`] handle `<Error>` bodies
//! - [`wire`] holds the small body shapes that have no model counterpart
//!
//! # S3 XML conventions
//!
//! - Namespace: `http://s3.amazonaws.com/doc/2006-03-01/`
//! - Booleans: lowercase `true`/`false`
//! - Timestamps: ISO 8601 with milliseconds (`2006-02-03T16:45:09.000Z`)
//! - XML declaration: `<?xml version="1.0" encoding="UTF-8"?>`

pub mod deserialize;
pub mod error;
pub mod serialize;
pub mod wire;

pub use deserialize::{S3Deserialize, from_xml};
pub use error::{XmlError, error_to_xml, parse_error_body};
pub use serialize::{S3_NAMESPACE, S3Serialize, format_timestamp, to_xml};
