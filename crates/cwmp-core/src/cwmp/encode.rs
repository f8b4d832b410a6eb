//! SOAP/CWMP envelope encoding.
//!
//! Envelopes are produced through `quick_xml::Writer`, so parameter names,
//! values and fault strings are escaped by the writer and can never break
//! the document.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::{Error, FaultCode, Result};

pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP_ENC_NS: &str = "http://schemas.xmlsoap.org/soap/encoding/";
pub const CWMP_NS: &str = "urn:dslforum-org:cwmp-1-0";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Fresh value for the `cwmp:ID` header.
pub fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// One entry of a `SetParameterValues` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetParameter {
    pub name: String,
    pub value: String,
    /// `xsi:type` to declare, e.g. `xsd:boolean`.
    pub xsd_type: &'static str,
}

/// ACS-to-CPE requests the engine can issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcRequest {
    GetParameterValues {
        names: Vec<String>,
    },
    SetParameterValues {
        parameters: Vec<SetParameter>,
        parameter_key: String,
    },
    Reboot {
        command_key: String,
    },
    FactoryReset,
}

impl RpcRequest {
    pub const fn method_name(&self) -> &'static str {
        match self {
            Self::GetParameterValues { .. } => "GetParameterValues",
            Self::SetParameterValues { .. } => "SetParameterValues",
            Self::Reboot { .. } => "Reboot",
            Self::FactoryReset => "FactoryReset",
        }
    }

    /// Encode as a complete envelope whose header carries `id`.
    pub fn encode(&self, id: &str) -> Result<String> {
        let mut w = SoapWriter::open(Some(id))?;
        match self {
            Self::GetParameterValues { names } => {
                w.start("cwmp:GetParameterValues", &[])?;
                let array_type = format!("xsd:string[{}]", names.len());
                w.start("ParameterNames", &[("soapenc:arrayType", array_type.as_str())])?;
                for name in names {
                    w.text_element("string", &[], name)?;
                }
                w.end("ParameterNames")?;
                w.end("cwmp:GetParameterValues")?;
            }
            Self::SetParameterValues {
                parameters,
                parameter_key,
            } => {
                w.start("cwmp:SetParameterValues", &[])?;
                let array_type = format!("cwmp:ParameterValueStruct[{}]", parameters.len());
                w.start("ParameterList", &[("soapenc:arrayType", array_type.as_str())])?;
                for param in parameters {
                    w.start("ParameterValueStruct", &[])?;
                    w.text_element("Name", &[], &param.name)?;
                    w.text_element("Value", &[("xsi:type", param.xsd_type)], &param.value)?;
                    w.end("ParameterValueStruct")?;
                }
                w.end("ParameterList")?;
                w.text_element("ParameterKey", &[], parameter_key)?;
                w.end("cwmp:SetParameterValues")?;
            }
            Self::Reboot { command_key } => {
                w.start("cwmp:Reboot", &[])?;
                w.text_element("CommandKey", &[], command_key)?;
                w.end("cwmp:Reboot")?;
            }
            Self::FactoryReset => w.empty("cwmp:FactoryReset")?,
        }
        w.close()
    }
}

/// `InformResponse` envelope.
pub fn inform_response(id: &str, max_envelopes: u32) -> Result<String> {
    let mut w = SoapWriter::open(Some(id))?;
    w.start("cwmp:InformResponse", &[])?;
    w.text_element("MaxEnvelopes", &[], &max_envelopes.to_string())?;
    w.end("cwmp:InformResponse")?;
    w.close()
}

/// SOAP fault envelope (no header).
pub fn fault(code: FaultCode, message: &str) -> Result<String> {
    let mut w = SoapWriter::open(None)?;
    w.start("soap:Fault", &[])?;
    w.text_element("faultcode", &[], code.as_str())?;
    w.text_element("faultstring", &[], message)?;
    w.end("soap:Fault")?;
    w.close()
}

/// Thin wrapper around `quick_xml::Writer` that knows the envelope frame.
struct SoapWriter {
    inner: Writer<Vec<u8>>,
}

impl SoapWriter {
    /// Write the declaration, the `Envelope` start, the optional header and
    /// the `Body` start.
    fn open(id: Option<&str>) -> Result<Self> {
        let mut w = Self {
            inner: Writer::new_with_indent(Vec::new(), b' ', 2),
        };
        w.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        w.start(
            "soap:Envelope",
            &[
                ("xmlns:soap", SOAP_ENV_NS),
                ("xmlns:soapenc", SOAP_ENC_NS),
                ("xmlns:cwmp", CWMP_NS),
                ("xmlns:xsd", XSD_NS),
                ("xmlns:xsi", XSI_NS),
            ],
        )?;
        if let Some(id) = id {
            w.start("soap:Header", &[])?;
            w.text_element("cwmp:ID", &[("soap:mustUnderstand", "1")], id)?;
            w.end("soap:Header")?;
        }
        w.start("soap:Body", &[])?;
        Ok(w)
    }

    fn close(mut self) -> Result<String> {
        self.end("soap:Body")?;
        self.end("soap:Envelope")?;
        String::from_utf8(self.inner.into_inner()).map_err(|e| Error::Encode(e.to_string()))
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let mut start = BytesStart::new(name);
        for &attr in attrs {
            start.push_attribute(attr);
        }
        self.write(Event::Start(start))
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, name: &str) -> Result<()> {
        self.write(Event::Empty(BytesStart::new(name)))
    }

    fn text_element(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<()> {
        self.start(name, attrs)?;
        // Written even when empty so the indenting writer keeps `<a></a>` on one line.
        self.write(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    fn write(&mut self, event: Event<'_>) -> Result<()> {
        self.inner
            .write_event(event)
            .map_err(|e| Error::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cwmp::envelope::{self, Decoded};
    use crate::cwmp::message::CwmpMessage;
    use crate::cwmp::xml;

    fn body_of(doc: &str) -> xml::Element {
        match envelope::decode(doc.as_bytes(), None).unwrap() {
            Decoded::Envelope(env) => env.body,
            Decoded::EmptyPoll => panic!("expected an envelope"),
        }
    }

    fn names(k: usize) -> Vec<String> {
        (0..k)
            .map(|i| format!("Device.DeviceInfo.Param{i}"))
            .collect()
    }

    #[test]
    fn get_parameter_values_array_length_matches_names() {
        for k in [0, 1, 7] {
            let doc = RpcRequest::GetParameterValues { names: names(k) }
                .encode("id-1")
                .unwrap();
            let body = body_of(&doc);
            let array = body.find("ParameterNames").expect("ParameterNames present");
            assert_eq!(
                array.attribute("arrayType"),
                Some(format!("xsd:string[{k}]").as_str())
            );
            assert_eq!(array.find_all("string").count(), k);
        }
    }

    #[test]
    fn header_carries_id_with_must_understand() {
        let doc = RpcRequest::FactoryReset.encode("msg-42").unwrap();
        let root = xml::parse(doc.as_bytes()).unwrap();
        let id = root.child("Header").and_then(|h| h.child("ID")).unwrap();
        assert_eq!(id.text(), "msg-42");
        assert_eq!(id.attribute("mustUnderstand"), Some("1"));
        assert!(root.find("FactoryReset").is_some());
    }

    #[test]
    fn set_parameter_values_escapes_content() {
        let request = RpcRequest::SetParameterValues {
            parameters: vec![SetParameter {
                name: "Device.WiFi.SSID.1.SSID".into(),
                value: "<guest> & \"friends\"".into(),
                xsd_type: "xsd:string",
            }],
            parameter_key: "key_1700000000".into(),
        };
        let doc = request.encode("id-2").unwrap();
        assert!(doc.contains("&lt;guest&gt; &amp;"));

        let body = body_of(&doc);
        let value = body.find("Value").unwrap();
        assert_eq!(value.text(), "<guest> & \"friends\"");
        assert_eq!(value.attribute("type"), Some("xsd:string"));
        assert_eq!(body.find_text("ParameterKey").as_deref(), Some("key_1700000000"));
        assert_eq!(
            body.find("ParameterList").unwrap().attribute("arrayType"),
            Some("cwmp:ParameterValueStruct[1]")
        );
    }

    #[test]
    fn set_parameter_values_decodes_as_parameter_structs() {
        let request = RpcRequest::SetParameterValues {
            parameters: vec![
                SetParameter {
                    name: "A.Enable".into(),
                    value: "true".into(),
                    xsd_type: "xsd:boolean",
                },
                SetParameter {
                    name: "A.Count".into(),
                    value: "3".into(),
                    xsd_type: "xsd:int",
                },
            ],
            parameter_key: "k".into(),
        };
        let body = body_of(&request.encode("id").unwrap());
        let structs: Vec<_> = body
            .find_all("ParameterValueStruct")
            .map(|s| (s.find_text("Name").unwrap(), s.find_text("Value").unwrap()))
            .collect();
        assert_eq!(
            structs,
            [
                ("A.Enable".to_string(), "true".to_string()),
                ("A.Count".to_string(), "3".to_string())
            ]
        );
    }

    #[test]
    fn reboot_carries_command_key() {
        let doc = RpcRequest::Reboot {
            command_key: "reboot_1".into(),
        }
        .encode("id")
        .unwrap();
        assert_eq!(body_of(&doc).find_text("CommandKey").as_deref(), Some("reboot_1"));
    }

    #[test]
    fn inform_response_has_max_envelopes() {
        let doc = inform_response("id-9", 1).unwrap();
        let body = body_of(&doc);
        let resp = body.find("InformResponse").unwrap();
        assert_eq!(resp.find_text("MaxEnvelopes").as_deref(), Some("1"));
    }

    #[test]
    fn fault_envelope_shape() {
        let doc = fault(FaultCode::Client, "Invalid XML: <eof>").unwrap();
        let body = body_of(&doc);
        assert_eq!(body.find_text("faultcode").as_deref(), Some("Client"));
        assert_eq!(
            body.find_text("faultstring").as_deref(),
            Some("Invalid XML: <eof>")
        );
        assert!(xml::parse(doc.as_bytes()).unwrap().child("Header").is_none());
    }

    #[test]
    fn our_fault_is_classified_as_fault() {
        let doc = fault(FaultCode::Server, "boom").unwrap();
        let CwmpMessage::Fault(f) = CwmpMessage::decode(&body_of(&doc)) else {
            panic!("expected Fault");
        };
        assert_eq!(f.code, "Server");
        assert_eq!(f.message, "boom");
    }

    #[test]
    fn message_ids_are_unique() {
        assert_ne!(new_message_id(), new_message_id());
    }
}
