//! XML error type and `<Error>` body handling.

use std::io;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};
use unis3_model::{ErrorKind, S3Error, VendorErrorBody};

use crate::deserialize::{for_each_child, read_text_content};

/// Errors that can occur during S3 XML serialization or deserialization.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// An I/O error during XML writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An error from the underlying quick-xml library.
    #[error("XML processing error: {0}")]
    QuickXml(#[from] quick_xml::Error),

    /// A required XML element was missing.
    #[error("missing required XML element: {0}")]
    MissingElement(String),

    /// An unexpected XML element was encountered.
    #[error("unexpected XML element: {0}")]
    UnexpectedElement(String),

    /// An error parsing a value from XML text content.
    #[error("failed to parse value: {0}")]
    ParseError(String),
}

impl From<XmlError> for S3Error {
    fn from(err: XmlError) -> Self {
        S3Error::with_message(ErrorKind::MalformedResponse, err.to_string()).with_source(err)
    }
}

/// Format an S3 error as XML.
///
/// S3 errors are a flat `<Error>` element without a wrapper:
///
/// ```xml
/// <?xml version="1.0" encoding="UTF-8"?>
/// <Error>
///   <Code>NoSuchBucket</Code>
///   <Message>The specified bucket does not exist</Message>
///   <Resource>/mybucket</Resource>
///   <RequestId>tx00000...</RequestId>
/// </Error>
/// ```
pub fn error_to_xml(
    code: &str,
    message: &str,
    resource: Option<&str>,
    request_id: &str,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    if let Err(e) = write_error_xml(&mut buf, code, message, resource, request_id) {
        tracing::error!(error = %e, "failed to serialize S3 error XML");
        buf.clear();
    }
    buf
}

fn write_error_xml(
    buf: &mut Vec<u8>,
    code: &str,
    message: &str,
    resource: Option<&str>,
    request_id: &str,
) -> io::Result<()> {
    let mut writer = Writer::new(buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    writer.create_element("Error").write_inner_content(|w| {
        w.create_element("Code")
            .write_text_content(BytesText::new(code))?;
        w.create_element("Message")
            .write_text_content(BytesText::new(message))?;
        if let Some(res) = resource {
            w.create_element("Resource")
                .write_text_content(BytesText::new(res))?;
        }
        w.create_element("RequestId")
            .write_text_content(BytesText::new(request_id))?;
        Ok(())
    })?;

    Ok(())
}

/// Parse a vendor `<Error>` body.
///
/// Unknown elements are ignored. A body without a `Code` element is
/// rejected so the caller can fall back to status-based mapping.
///
/// # Errors
///
/// Returns `XmlError` if the body is not XML or carries no `Code`.
pub fn parse_error_body(xml: &[u8]) -> Result<VendorErrorBody, XmlError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if e.name().as_ref() != b"Error" {
                    return Err(XmlError::UnexpectedElement(
                        String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    ));
                }
                break;
            }
            Event::Eof => return Err(XmlError::MissingElement("Error".to_owned())),
            _ => {}
        }
    }

    let mut code = None;
    let mut body = VendorErrorBody::default();
    for_each_child(&mut reader, "Error", |reader, name| {
        match name {
            "Code" => code = Some(read_text_content(reader)?),
            "Message" => body.message = read_text_content(reader)?,
            "RequestId" => body.request_id = Some(read_text_content(reader)?),
            "HostId" => body.host_id = Some(read_text_content(reader)?),
            "Resource" => body.resource = Some(read_text_content(reader)?),
            _ => return Ok(false),
        }
        Ok(true)
    })?;

    body.code = code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| XmlError::MissingElement("Code".to_owned()))?;
    Ok(body)
}
