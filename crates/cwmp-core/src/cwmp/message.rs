//! CWMP message classification and per-kind decoding.
//!
//! Classification is presence-based: the first element under the SOAP Body
//! (document order, any depth) whose local name is a known RPC decides the
//! kind. Anything else is [`MessageKind::Unknown`], which is not an error.

use super::xml::Element;

/// Event code a CPE reports after power-on or reboot.
pub const EVENT_BOOT: &str = "1 BOOT";

/// The closed set of inbound message kinds the ACS understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Inform,
    GetRpcMethodsResponse,
    SetParameterValuesResponse,
    GetParameterValuesResponse,
    RebootResponse,
    FactoryResetResponse,
    /// SOAP fault sent by the CPE in answer to one of our requests.
    Fault,
    Unknown,
}

impl MessageKind {
    /// Map an element local name to a known kind.
    pub fn from_local_name(name: &str) -> Option<Self> {
        match name {
            "Inform" => Some(Self::Inform),
            "GetRPCMethodsResponse" => Some(Self::GetRpcMethodsResponse),
            "SetParameterValuesResponse" => Some(Self::SetParameterValuesResponse),
            "GetParameterValuesResponse" => Some(Self::GetParameterValuesResponse),
            "RebootResponse" => Some(Self::RebootResponse),
            "FactoryResetResponse" => Some(Self::FactoryResetResponse),
            "Fault" => Some(Self::Fault),
            _ => None,
        }
    }

    /// Wire name of the RPC element.
    pub const fn rpc_name(self) -> &'static str {
        match self {
            Self::Inform => "Inform",
            Self::GetRpcMethodsResponse => "GetRPCMethodsResponse",
            Self::SetParameterValuesResponse => "SetParameterValuesResponse",
            Self::GetParameterValuesResponse => "GetParameterValuesResponse",
            Self::RebootResponse => "RebootResponse",
            Self::FactoryResetResponse => "FactoryResetResponse",
            Self::Fault => "Fault",
            Self::Unknown => "Unknown",
        }
    }
}

/// Classify a SOAP Body.
pub fn classify(body: &Element) -> MessageKind {
    rpc_element(body).map_or(MessageKind::Unknown, |(kind, _)| kind)
}

fn rpc_element(body: &Element) -> Option<(MessageKind, &Element)> {
    body.descendants()
        .find_map(|el| MessageKind::from_local_name(el.local_name()).map(|kind| (kind, el)))
}

/// One `ParameterValueStruct`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterValue {
    pub name: String,
    pub value: String,
    /// `xsi:type` of the value, e.g. `xsd:string`.
    pub value_type: Option<String>,
}

impl ParameterValue {
    fn from_struct(el: &Element) -> Option<Self> {
        let name = el.child("Name")?.non_empty_text()?.to_string();
        let value_el = el.child("Value");
        Some(Self {
            name,
            value: value_el.map(|v| v.text().to_string()).unwrap_or_default(),
            value_type: value_el
                .and_then(|v| v.attribute("type"))
                .map(str::to_string),
        })
    }
}

/// `DeviceId` block of an Inform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceId {
    pub manufacturer: Option<String>,
    pub oui: Option<String>,
    pub product_class: Option<String>,
    pub serial_number: Option<String>,
}

/// A decoded `Inform`. Every identity field is optional: CPEs omit things.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inform {
    pub device_id: DeviceId,
    pub events: Vec<String>,
    pub parameters: Vec<ParameterValue>,
    pub software_version: Option<String>,
    pub hardware_version: Option<String>,
    pub external_ip_address: Option<String>,
    pub connection_request_url: Option<String>,
}

impl Inform {
    fn decode(el: &Element) -> Self {
        let parameters = parameter_values(el);

        let device_id = DeviceId {
            manufacturer: el.find_text("Manufacturer"),
            oui: el.find_text("OUI"),
            product_class: el.find_text("ProductClass"),
            serial_number: el
                .find_text("SerialNumber")
                .or_else(|| parameter_ending_with(&parameters, "DeviceInfo.SerialNumber")),
        };

        let events = el
            .find_all("EventCode")
            .filter_map(Element::non_empty_text)
            .map(str::to_string)
            .collect();

        Self {
            device_id,
            events,
            software_version: el
                .find_text("SoftwareVersion")
                .or_else(|| parameter_ending_with(&parameters, "DeviceInfo.SoftwareVersion")),
            hardware_version: el
                .find_text("HardwareVersion")
                .or_else(|| parameter_ending_with(&parameters, "DeviceInfo.HardwareVersion")),
            external_ip_address: el
                .find_text("ExternalIPAddress")
                .or_else(|| parameter_ending_with(&parameters, "ExternalIPAddress")),
            connection_request_url: parameter_ending_with(
                &parameters,
                "ManagementServer.ConnectionRequestURL",
            ),
            parameters,
        }
    }

    pub fn has_event(&self, code: &str) -> bool {
        self.events.iter().any(|e| e == code)
    }

    /// Whether the CPE reports a (re)boot in this session.
    pub fn is_boot(&self) -> bool {
        self.has_event(EVENT_BOOT)
    }
}

/// Fault reported by the CPE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpeFault {
    pub code: String,
    pub message: String,
}

impl CpeFault {
    /// Prefer the CWMP detail (`FaultCode`/`FaultString`, e.g. `9005`) over
    /// the generic SOAP `faultcode`/`faultstring`.
    fn decode(el: &Element) -> Self {
        let code = el
            .find_text("FaultCode")
            .or_else(|| el.find_text("faultcode"))
            .unwrap_or_default();
        let message = el
            .find_text("FaultString")
            .or_else(|| el.find_text("faultstring"))
            .unwrap_or_default();
        Self { code, message }
    }
}

impl std::fmt::Display for CpeFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A classified, decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CwmpMessage {
    Inform(Inform),
    GetRpcMethodsResponse { methods: Vec<String> },
    SetParameterValuesResponse { status: i32 },
    GetParameterValuesResponse { parameters: Vec<ParameterValue> },
    RebootResponse,
    FactoryResetResponse,
    Fault(CpeFault),
    /// Nothing recognisable; carries the first element name under Body, if any.
    Unknown { name: Option<String> },
}

impl CwmpMessage {
    /// Classify `body` and run the decoder for that kind.
    ///
    /// Decoders are tolerant: missing fields become defaults rather than errors.
    pub fn decode(body: &Element) -> Self {
        let Some((kind, el)) = rpc_element(body) else {
            return Self::Unknown {
                name: body.children().first().map(|c| c.local_name().to_string()),
            };
        };

        match kind {
            MessageKind::Inform => Self::Inform(Inform::decode(el)),
            MessageKind::GetRpcMethodsResponse => Self::GetRpcMethodsResponse {
                methods: el
                    .find_all("string")
                    .filter_map(Element::non_empty_text)
                    .map(str::to_string)
                    .collect(),
            },
            MessageKind::SetParameterValuesResponse => Self::SetParameterValuesResponse {
                status: el
                    .find_text("Status")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
            },
            MessageKind::GetParameterValuesResponse => Self::GetParameterValuesResponse {
                parameters: parameter_values(el),
            },
            MessageKind::RebootResponse => Self::RebootResponse,
            MessageKind::FactoryResetResponse => Self::FactoryResetResponse,
            MessageKind::Fault => Self::Fault(CpeFault::decode(el)),
            MessageKind::Unknown => Self::Unknown {
                name: Some(el.local_name().to_string()),
            },
        }
    }

    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Inform(_) => MessageKind::Inform,
            Self::GetRpcMethodsResponse { .. } => MessageKind::GetRpcMethodsResponse,
            Self::SetParameterValuesResponse { .. } => MessageKind::SetParameterValuesResponse,
            Self::GetParameterValuesResponse { .. } => MessageKind::GetParameterValuesResponse,
            Self::RebootResponse => MessageKind::RebootResponse,
            Self::FactoryResetResponse => MessageKind::FactoryResetResponse,
            Self::Fault(_) => MessageKind::Fault,
            Self::Unknown { .. } => MessageKind::Unknown,
        }
    }
}

fn parameter_values(el: &Element) -> Vec<ParameterValue> {
    el.find_all("ParameterValueStruct")
        .filter_map(ParameterValue::from_struct)
        .collect()
}

fn parameter_ending_with(parameters: &[ParameterValue], suffix: &str) -> Option<String> {
    parameters
        .iter()
        .find(|p| p.name.ends_with(suffix) && !p.value.is_empty())
        .map(|p| p.value.clone())
}
