//! SOAP envelope decoding.

use super::xml::{self, Element};
use crate::error::{Error, Result};

/// Outcome of decoding one inbound HTTP body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Zero-length body: the CPE has nothing more to say and is polling
    /// for ACS requests.
    EmptyPoll,
    Envelope(Envelope),
}

/// A parsed envelope reduced to what the engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// `cwmp:ID` from the SOAP header, echoed by CPEs on responses.
    pub header_id: Option<String>,
    pub body: Element,
}

/// Decode a request body.
///
/// A declared `Content-Length` of zero, or a body with no content at all,
/// is an empty poll rather than an error.
pub fn decode(input: &[u8], content_length: Option<u64>) -> Result<Decoded> {
    if content_length == Some(0) || input.iter().all(u8::is_ascii_whitespace) {
        return Ok(Decoded::EmptyPoll);
    }

    let root = xml::parse(input)?;
    let body = root
        .find("Body")
        .cloned()
        .ok_or_else(|| Error::Protocol("no SOAP Body".into()))?;
    let header_id = root
        .child("Header")
        .and_then(|header| header.find_text("ID"));

    Ok(Decoded::Envelope(Envelope { header_id, body }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(decoded: Decoded) -> Envelope {
        match decoded {
            Decoded::Envelope(env) => env,
            Decoded::EmptyPoll => panic!("expected an envelope"),
        }
    }

    #[test]
    fn zero_content_length_is_an_empty_poll() {
        assert_eq!(decode(b"", Some(0)).unwrap(), Decoded::EmptyPoll);
        assert_eq!(decode(b"", None).unwrap(), Decoded::EmptyPoll);
        assert_eq!(decode(b"\r\n", Some(2)).unwrap(), Decoded::EmptyPoll);
    }

    #[test]
    fn body_found_under_any_prefix() {
        for (prefix, uri) in [
            ("soap", "http://schemas.xmlsoap.org/soap/envelope/"),
            ("SOAP-ENV", "http://schemas.xmlsoap.org/soap/envelope/"),
            ("soapenv", "http://schemas.xmlsoap.org/soap/envelope/"),
        ] {
            let doc = format!(
                r#"<{prefix}:Envelope xmlns:{prefix}="{uri}"><{prefix}:Body><Ping/></{prefix}:Body></{prefix}:Envelope>"#
            );
            let env = envelope(decode(doc.as_bytes(), None).unwrap());
            assert_eq!(env.body.local_name(), "Body");
            assert!(env.body.child("Ping").is_some());
        }
    }

    #[test]
    fn header_id_is_extracted() {
        let doc = br#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:cwmp="urn:dslforum-org:cwmp-1-0">
            <soap:Header><cwmp:ID soap:mustUnderstand="1">abc-1</cwmp:ID></soap:Header>
            <soap:Body/>
        </soap:Envelope>"#;
        let env = envelope(decode(doc, None).unwrap());
        assert_eq!(env.header_id.as_deref(), Some("abc-1"));
    }

    #[test]
    fn missing_header_is_fine() {
        let env = envelope(decode(b"<Envelope><Body/></Envelope>", None).unwrap());
        assert_eq!(env.header_id, None);
    }

    #[test]
    fn missing_body_is_a_protocol_failure() {
        let err = decode(b"<Envelope><Header/></Envelope>", None).unwrap_err();
        assert!(matches!(err, Error::Protocol(ref m) if m == "no SOAP Body"));
    }

    #[test]
    fn malformed_xml_is_a_parse_failure() {
        let err = decode(b"<soap:Envelope><soap:Body>", Some(26)).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
