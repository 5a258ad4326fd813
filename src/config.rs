//! Loads the printer's identity from a JSON configuration file: the USB
//! descriptor tree, string descriptors, IEEE 1284 device id, the IPP
//! attribute groups, and (optionally) scanner capabilities.
//!
//! Loading is the one place allowed to be strict: any structural
//! problem — a descriptor whose `bLength` disagrees with its wire size,
//! an attribute value whose shape does not match its type, an oversized
//! string — is a fatal [`Error`] and the process exits before touching
//! the network.

use crate::escl::{ScannerCapabilities, SourceCapabilities};
use crate::ipp::{AttrValue, IppAttribute, IppTag};
use crate::ipp_service::AttributeTable;
use crate::wire::{
    self, ConfigurationDescriptor, DescriptorSet, DeviceDescriptor,
    DeviceQualifierDescriptor, EndpointDescriptor, InterfaceDescriptor,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::mem::size_of;
use std::path::Path;

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    Io(std::io::Error),
    Json(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "failed to read configuration: {}", e),
            Error::Json(e) => write!(f, "failed to parse configuration: {}", e),
            Error::Invalid(reason) => write!(f, "invalid configuration: {}", reason),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

fn invalid(reason: String) -> Error {
    Error::Invalid(reason)
}

/// Everything the emulator needs, validated and converted to wire form.
#[derive(Debug)]
pub struct Config {
    pub descriptors: DescriptorSet,
    pub attributes: AttributeTable,
    pub capabilities: ScannerCapabilities,
}

// The JSON mirrors the USB field names verbatim, hence the casing.

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct DeviceDescriptorConfig {
    bLength: u8,
    bDescriptorType: u8,
    bcdUSB: u16,
    bDeviceClass: u8,
    bDeviceSubClass: u8,
    bDeviceProtocol: u8,
    bMaxPacketSize0: u8,
    idVendor: u16,
    idProduct: u16,
    bcdDevice: u16,
    iManufacturer: u8,
    iProduct: u8,
    iSerialNumber: u8,
    bNumConfigurations: u8,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct ConfigurationDescriptorConfig {
    bLength: u8,
    bDescriptorType: u8,
    wTotalLength: u16,
    bNumInterfaces: u8,
    bConfigurationValue: u8,
    iConfiguration: u8,
    bmAttributes: u8,
    bMaxPower: u8,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct DeviceQualifierDescriptorConfig {
    bLength: u8,
    bDescriptorType: u8,
    bcdUSB: u16,
    bDeviceClass: u8,
    bDeviceSubClass: u8,
    bDeviceProtocol: u8,
    bMaxPacketSize0: u8,
    bNumConfigurations: u8,
    bReserved: u8,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct InterfaceDescriptorConfig {
    bLength: u8,
    bDescriptorType: u8,
    bInterfaceNumber: u8,
    bAlternateSetting: u8,
    bNumEndpoints: u8,
    bInterfaceClass: u8,
    bInterfaceSubClass: u8,
    bInterfaceProtocol: u8,
    iInterface: u8,
    endpoints: Vec<EndpointDescriptorConfig>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct EndpointDescriptorConfig {
    bLength: u8,
    bDescriptorType: u8,
    bEndpointAddress: u8,
    bmAttributes: u8,
    wMaxPacketSize: u16,
    bInterval: u8,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct LanguageDescriptorConfig {
    bLength: u8,
    bDescriptorType: u8,
    langID1: u8,
    langID2: u8,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct IeeeDeviceIdConfig {
    bLength1: u8,
    bLength2: u8,
    message: String,
}

#[derive(Debug, Deserialize)]
struct AttributeConfig {
    #[serde(rename = "type")]
    type_name: String,
    name: String,
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct PlatenConfig {
    ColorModes: Vec<String>,
    DocumentFormats: Vec<String>,
    Resolutions: Vec<i32>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct ScannerCapabilitiesConfig {
    MakeAndModel: String,
    SerialNumber: String,
    Platen: PlatenConfig,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct PrinterConfig {
    device_descriptor: DeviceDescriptorConfig,
    configuration_descriptor: ConfigurationDescriptorConfig,
    device_qualifier_descriptor: DeviceQualifierDescriptorConfig,
    interface_descriptors: Vec<InterfaceDescriptorConfig>,
    language_descriptor: LanguageDescriptorConfig,
    string_descriptors: Vec<String>,
    ieee_device_id: IeeeDeviceIdConfig,
    #[serde(default)]
    operationAttributes: Vec<AttributeConfig>,
    #[serde(default)]
    printerAttributes: Vec<AttributeConfig>,
    #[serde(default)]
    jobAttributes: Vec<AttributeConfig>,
    #[serde(default)]
    unsupportedAttributes: Vec<AttributeConfig>,
    scanner_capabilities: Option<ScannerCapabilitiesConfig>,
}

/// Loads and validates a configuration file.
pub fn load(path: &Path) -> Result<Config, Error> {
    let contents = std::fs::read_to_string(path)?;
    parse(&contents)
}

/// Parses and validates configuration JSON.
pub fn parse(contents: &str) -> Result<Config, Error> {
    let config: PrinterConfig = serde_json::from_str(contents)?;
    Ok(Config {
        descriptors: build_descriptors(&config)?,
        attributes: AttributeTable {
            operation: build_attributes(&config.operationAttributes)?,
            printer: build_attributes(&config.printerAttributes)?,
            job: build_attributes(&config.jobAttributes)?,
            unsupported: build_attributes(&config.unsupportedAttributes)?,
        },
        capabilities: build_capabilities(config.scanner_capabilities.as_ref()),
    })
}

fn check_length(name: &str, actual: u8, wire_size: usize) -> Result<(), Error> {
    if actual as usize != wire_size {
        return Err(invalid(format!(
            "{} has bLength {} but its wire size is {}",
            name, actual, wire_size
        )));
    }
    Ok(())
}

fn build_descriptors(config: &PrinterConfig) -> Result<DescriptorSet, Error> {
    let d = &config.device_descriptor;
    check_length("device_descriptor", d.bLength, size_of::<DeviceDescriptor>())?;
    let device = DeviceDescriptor {
        bLength: d.bLength,
        bDescriptorType: d.bDescriptorType,
        bcdUSB: d.bcdUSB.to_le_bytes(),
        bDeviceClass: d.bDeviceClass,
        bDeviceSubClass: d.bDeviceSubClass,
        bDeviceProtocol: d.bDeviceProtocol,
        bMaxPacketSize0: d.bMaxPacketSize0,
        idVendor: d.idVendor.to_le_bytes(),
        idProduct: d.idProduct.to_le_bytes(),
        bcdDevice: d.bcdDevice.to_le_bytes(),
        iManufacturer: d.iManufacturer,
        iProduct: d.iProduct,
        iSerialNumber: d.iSerialNumber,
        bNumConfigurations: d.bNumConfigurations,
    };

    let c = &config.configuration_descriptor;
    check_length(
        "configuration_descriptor",
        c.bLength,
        size_of::<ConfigurationDescriptor>(),
    )?;
    let configuration = ConfigurationDescriptor {
        bLength: c.bLength,
        bDescriptorType: c.bDescriptorType,
        wTotalLength: c.wTotalLength.to_le_bytes(),
        bNumInterfaces: c.bNumInterfaces,
        bConfigurationValue: c.bConfigurationValue,
        iConfiguration: c.iConfiguration,
        bmAttributes: c.bmAttributes,
        bMaxPower: c.bMaxPower,
    };

    let q = &config.device_qualifier_descriptor;
    check_length(
        "device_qualifier_descriptor",
        q.bLength,
        size_of::<DeviceQualifierDescriptor>(),
    )?;
    let qualifier = DeviceQualifierDescriptor {
        bLength: q.bLength,
        bDescriptorType: q.bDescriptorType,
        bcdUSB: q.bcdUSB.to_le_bytes(),
        bDeviceClass: q.bDeviceClass,
        bDeviceSubClass: q.bDeviceSubClass,
        bDeviceProtocol: q.bDeviceProtocol,
        bMaxPacketSize0: q.bMaxPacketSize0,
        bNumConfigurations: q.bNumConfigurations,
        bReserved: q.bReserved,
    };

    let mut interfaces = Vec::new();
    let mut endpoints = BTreeMap::new();
    for i in &config.interface_descriptors {
        check_length(
            "interface descriptor",
            i.bLength,
            size_of::<InterfaceDescriptor>(),
        )?;
        interfaces.push(InterfaceDescriptor {
            bLength: i.bLength,
            bDescriptorType: i.bDescriptorType,
            bInterfaceNumber: i.bInterfaceNumber,
            bAlternateSetting: i.bAlternateSetting,
            bNumEndpoints: i.bNumEndpoints,
            bInterfaceClass: i.bInterfaceClass,
            bInterfaceSubClass: i.bInterfaceSubClass,
            bInterfaceProtocol: i.bInterfaceProtocol,
            iInterface: i.iInterface,
        });
        let mut interface_endpoints = Vec::new();
        for e in &i.endpoints {
            check_length(
                "endpoint descriptor",
                e.bLength,
                size_of::<EndpointDescriptor>(),
            )?;
            interface_endpoints.push(EndpointDescriptor {
                bLength: e.bLength,
                bDescriptorType: e.bDescriptorType,
                bEndpointAddress: e.bEndpointAddress,
                bmAttributes: e.bmAttributes,
                wMaxPacketSize: e.wMaxPacketSize.to_le_bytes(),
                bInterval: e.bInterval,
            });
        }
        endpoints.insert(i.bInterfaceNumber, interface_endpoints);
    }

    if configuration.bNumInterfaces as usize != interfaces.len() {
        return Err(invalid(format!(
            "configuration_descriptor declares {} interfaces but {} are configured",
            configuration.bNumInterfaces,
            interfaces.len()
        )));
    }

    let l = &config.language_descriptor;
    let mut strings = vec![vec![
        l.bLength,
        l.bDescriptorType,
        l.langID1,
        l.langID2,
    ]];
    for s in &config.string_descriptors {
        let descriptor = wire::string_descriptor(s).ok_or_else(|| {
            invalid(format!("string {:?} is too large for a string descriptor", s))
        })?;
        strings.push(descriptor);
    }

    let id = &config.ieee_device_id;
    let mut ieee_device_id = vec![id.bLength1, id.bLength2];
    ieee_device_id.extend_from_slice(id.message.as_bytes());

    Ok(DescriptorSet {
        device,
        configuration,
        qualifier,
        strings,
        ieee_device_id,
        interfaces,
        endpoints,
    })
}

fn build_attributes(configs: &[AttributeConfig]) -> Result<Vec<IppAttribute>, Error> {
    configs.iter().map(build_attribute).collect()
}

fn build_attribute(config: &AttributeConfig) -> Result<IppAttribute, Error> {
    let tag = IppTag::from_type_name(&config.type_name).ok_or_else(|| {
        invalid(format!(
            "attribute {:?} has unknown type {:?}",
            config.name, config.type_name
        ))
    })?;
    let value = convert_value(tag, &config.name, &config.value)?;
    IppAttribute::new(tag, &config.name, value).map_err(|e| invalid(e.to_string()))
}

fn int_value(name: &str, value: &serde_json::Value) -> Result<i32, Error> {
    value
        .as_i64()
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| invalid(format!("attribute {:?} has a non-integer entry", name)))
}

fn byte_value(name: &str, value: &serde_json::Value) -> Result<u8, Error> {
    value
        .as_i64()
        .and_then(|v| u8::try_from(v).ok())
        .ok_or_else(|| invalid(format!("attribute {:?} has an out-of-range byte", name)))
}

/// Converts a JSON value into the [`AttrValue`] shape the tag expects.
/// dateTime and octetString carry their lists as bytes; every other
/// list must be homogeneous in its scalar type.
fn convert_value(
    tag: IppTag,
    name: &str,
    value: &serde_json::Value,
) -> Result<AttrValue, Error> {
    use serde_json::Value;
    match value {
        Value::Bool(b) => Ok(AttrValue::Bool(*b)),
        Value::Number(_) => Ok(AttrValue::Int(int_value(name, value)?)),
        Value::String(s) => Ok(AttrValue::Str(s.clone())),
        Value::Array(entries) => {
            if matches!(tag, IppTag::DateTime | IppTag::OctetString) {
                let bytes = entries
                    .iter()
                    .map(|e| byte_value(name, e))
                    .collect::<Result<Vec<u8>, Error>>()?;
                return Ok(AttrValue::ByteList(bytes));
            }
            match entries.first() {
                None => Err(invalid(format!("attribute {:?} has an empty list", name))),
                Some(Value::Bool(_)) => {
                    let values = entries
                        .iter()
                        .map(|e| {
                            e.as_bool().ok_or_else(|| {
                                invalid(format!(
                                    "attribute {:?} mixes booleans with other types",
                                    name
                                ))
                            })
                        })
                        .collect::<Result<Vec<bool>, Error>>()?;
                    Ok(AttrValue::BoolList(values))
                }
                Some(Value::Number(_)) => {
                    let values = entries
                        .iter()
                        .map(|e| int_value(name, e))
                        .collect::<Result<Vec<i32>, Error>>()?;
                    Ok(AttrValue::IntList(values))
                }
                Some(Value::String(_)) => {
                    let values = entries
                        .iter()
                        .map(|e| {
                            e.as_str().map(str::to_string).ok_or_else(|| {
                                invalid(format!(
                                    "attribute {:?} mixes strings with other types",
                                    name
                                ))
                            })
                        })
                        .collect::<Result<Vec<String>, Error>>()?;
                    Ok(AttrValue::StrList(values))
                }
                Some(_) => Err(invalid(format!(
                    "attribute {:?} has a list of unsupported values",
                    name
                ))),
            }
        }
        _ => Err(invalid(format!(
            "attribute {:?} has an unsupported value",
            name
        ))),
    }
}

fn build_capabilities(config: Option<&ScannerCapabilitiesConfig>) -> ScannerCapabilities {
    match config {
        Some(c) => ScannerCapabilities {
            make_and_model: c.MakeAndModel.clone(),
            serial_number: c.SerialNumber.clone(),
            platen: SourceCapabilities {
                color_modes: c.Platen.ColorModes.clone(),
                formats: c.Platen.DocumentFormats.clone(),
                resolutions: c.Platen.Resolutions.clone(),
            },
        },
        // A print-only configuration still serves eSCL with a stock
        // capability set.
        None => ScannerCapabilities {
            make_and_model: "Virtual USB Printer".to_string(),
            serial_number: "VUSB-0001".to_string(),
            platen: SourceCapabilities {
                color_modes: vec!["RGB24".to_string(), "Grayscale8".to_string()],
                formats: vec!["application/pdf".to_string(), "image/jpeg".to_string()],
                resolutions: vec![100, 200, 300, 600],
            },
        },
    }
}

#[cfg(test)]
#[path = "tests/config.rs"]
mod tests;
