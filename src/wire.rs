//! USB 2.0 descriptor and SETUP-packet wire formats.
//!
//! The structs here mirror the packed layouts of USB 2.0 section 9.6, so a
//! descriptor's wire image is exactly its in-memory representation
//! (multi-byte fields are kept as little-endian byte pairs to avoid any
//! padding or endianness surprises). `bytemuck::bytes_of` on one of these
//! values is the response payload for the corresponding GET_DESCRIPTOR.

use std::collections::BTreeMap;

/// A SETUP packet as carried in the last 8 bytes of a USB/IP CMD_SUBMIT
/// frame for a control transfer.
///
/// The format of this packet (and the un-Rust-like names of its fields)
/// are defined in the USB 2.0 specification, section 9.3.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(non_snake_case)] // These names are from USB 2.0 table 9-2
pub struct SetupPacket {
    /// The type and specific target of the request.
    pub bmRequestType: u8,
    /// The particular request.
    pub bRequest: u8,
    /// A parameter to the request.
    pub wValue: u16,
    /// A second parameter to the request.
    pub wIndex: u16,
    /// The length of the subsequent IN or OUT data phase.
    pub wLength: u16,
}

/// The "type" bits of `bmRequestType` (USB 2.0 table 9-2, bits 5..6).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RequestKind {
    Standard,
    Class,
    Vendor,
    Reserved,
}

impl SetupPacket {
    /// Unpacks a SETUP packet from the host-order `setup` word of a
    /// CMD_SUBMIT frame.
    ///
    /// The word's big-endian byte image is the raw SETUP packet, in which
    /// `wValue`, `wIndex` and `wLength` are little-endian per USB 2.0.
    pub fn from_word(setup: u64) -> Self {
        let b = setup.to_be_bytes();
        Self {
            bmRequestType: b[0],
            bRequest: b[1],
            wValue: u16::from_le_bytes([b[2], b[3]]),
            wIndex: u16::from_le_bytes([b[4], b[5]]),
            wLength: u16::from_le_bytes([b[6], b[7]]),
        }
    }

    pub fn kind(&self) -> RequestKind {
        match (self.bmRequestType >> 5) & 3 {
            0 => RequestKind::Standard,
            1 => RequestKind::Class,
            2 => RequestKind::Vendor,
            _ => RequestKind::Reserved,
        }
    }

    /// High byte of `wValue`: the descriptor type in a GET_DESCRIPTOR.
    pub fn value_high(&self) -> u8 {
        (self.wValue >> 8) as u8
    }

    /// Low byte of `wValue`: the descriptor index in a GET_DESCRIPTOR.
    pub fn value_low(&self) -> u8 {
        self.wValue as u8
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(non_snake_case)] // These names are from USB 2.0 table 9-8
pub struct DeviceDescriptor {
    pub bLength: u8,
    pub bDescriptorType: u8,
    pub bcdUSB: [u8; 2],
    pub bDeviceClass: u8,
    pub bDeviceSubClass: u8,
    pub bDeviceProtocol: u8,
    pub bMaxPacketSize0: u8,
    pub idVendor: [u8; 2],
    pub idProduct: [u8; 2],
    pub bcdDevice: [u8; 2],
    pub iManufacturer: u8,
    pub iProduct: u8,
    pub iSerialNumber: u8,
    pub bNumConfigurations: u8,
}

// SAFETY: all fields zeroable
unsafe impl bytemuck::Zeroable for DeviceDescriptor {}
// SAFETY: no padding, no disallowed bit patterns
unsafe impl bytemuck::Pod for DeviceDescriptor {}

impl DeviceDescriptor {
    pub fn id_vendor(&self) -> u16 {
        u16::from_le_bytes(self.idVendor)
    }

    pub fn id_product(&self) -> u16 {
        u16::from_le_bytes(self.idProduct)
    }

    pub fn bcd_device(&self) -> u16 {
        u16::from_le_bytes(self.bcdDevice)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(non_snake_case)] // These names are from USB 2.0 table 9-10
pub struct ConfigurationDescriptor {
    pub bLength: u8,
    pub bDescriptorType: u8,
    pub wTotalLength: [u8; 2],
    pub bNumInterfaces: u8,
    pub bConfigurationValue: u8,
    pub iConfiguration: u8,
    pub bmAttributes: u8,
    pub bMaxPower: u8,
}

// SAFETY: all fields zeroable
unsafe impl bytemuck::Zeroable for ConfigurationDescriptor {}
// SAFETY: no padding, no disallowed bit patterns
unsafe impl bytemuck::Pod for ConfigurationDescriptor {}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(non_snake_case)] // These names are from USB 2.0 table 9-12
pub struct InterfaceDescriptor {
    pub bLength: u8,
    pub bDescriptorType: u8,
    pub bInterfaceNumber: u8,
    pub bAlternateSetting: u8,
    pub bNumEndpoints: u8,
    pub bInterfaceClass: u8,
    pub bInterfaceSubClass: u8,
    pub bInterfaceProtocol: u8,
    pub iInterface: u8,
}

// SAFETY: all fields zeroable
unsafe impl bytemuck::Zeroable for InterfaceDescriptor {}
// SAFETY: no padding, no disallowed bit patterns
unsafe impl bytemuck::Pod for InterfaceDescriptor {}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(non_snake_case)] // These names are from USB 2.0 table 9-13
pub struct EndpointDescriptor {
    pub bLength: u8,
    pub bDescriptorType: u8,
    pub bEndpointAddress: u8,
    pub bmAttributes: u8,
    pub wMaxPacketSize: [u8; 2],
    pub bInterval: u8,
}

// SAFETY: all fields zeroable
unsafe impl bytemuck::Zeroable for EndpointDescriptor {}
// SAFETY: no padding, no disallowed bit patterns
unsafe impl bytemuck::Pod for EndpointDescriptor {}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(non_snake_case)] // These names are from USB 2.0 table 9-9
pub struct DeviceQualifierDescriptor {
    pub bLength: u8,
    pub bDescriptorType: u8,
    pub bcdUSB: [u8; 2],
    pub bDeviceClass: u8,
    pub bDeviceSubClass: u8,
    pub bDeviceProtocol: u8,
    pub bMaxPacketSize0: u8,
    pub bNumConfigurations: u8,
    pub bReserved: u8,
}

// SAFETY: all fields zeroable
unsafe impl bytemuck::Zeroable for DeviceQualifierDescriptor {}
// SAFETY: no padding, no disallowed bit patterns
unsafe impl bytemuck::Pod for DeviceQualifierDescriptor {}

// For bRequest (USB 2.0 table 9-4)
pub const GET_STATUS: u8 = 0x00;
pub const CLEAR_FEATURE: u8 = 0x01;
pub const SET_FEATURE: u8 = 0x03;
pub const SET_ADDRESS: u8 = 0x05;
pub const GET_DESCRIPTOR: u8 = 0x06;
pub const SET_DESCRIPTOR: u8 = 0x07;
pub const GET_CONFIGURATION: u8 = 0x08;
pub const SET_CONFIGURATION: u8 = 0x09;
pub const GET_INTERFACE: u8 = 0x0A;
pub const SET_INTERFACE: u8 = 0x0B;
pub const SET_FRAME: u8 = 0x0C;

// Descriptor types (USB 2.0 table 9-5)
pub const DEVICE_DESCRIPTOR: u8 = 1;
pub const CONFIGURATION_DESCRIPTOR: u8 = 2;
pub const STRING_DESCRIPTOR: u8 = 3;
pub const INTERFACE_DESCRIPTOR: u8 = 4;
pub const ENDPOINT_DESCRIPTOR: u8 = 5;
pub const DEVICE_QUALIFIER_DESCRIPTOR: u8 = 6;

// Printer-class bRequest values (USB printer class 1.1 section 4)
pub const GET_DEVICE_ID: u8 = 0;
pub const GET_PORT_STATUS: u8 = 1;
pub const SOFT_RESET: u8 = 2;

// Interface identity of an IPP-over-USB interface (ippusb 1.0 section 4)
pub const IPPUSB_CLASS: u8 = 7;
pub const IPPUSB_SUBCLASS: u8 = 1;
pub const IPPUSB_PROTOCOL: u8 = 4;

/// A USB string descriptor may hold at most this many UTF-16 code units.
pub const MAX_STRING_DESCRIPTOR_CHARS: usize = 126;

/// Converts a configuration string into a USB string descriptor:
/// a 2-byte header (`bLength`, `bDescriptorType`) followed by the string
/// as UTF-16LE. Returns `None` if the string needs more than
/// [`MAX_STRING_DESCRIPTOR_CHARS`] code units.
pub fn string_descriptor(s: &str) -> Option<Vec<u8>> {
    let units: Vec<u16> = s.encode_utf16().collect();
    if units.len() > MAX_STRING_DESCRIPTOR_CHARS {
        return None;
    }
    let mut descriptor = Vec::with_capacity(2 + 2 * units.len());
    descriptor.push((2 + 2 * units.len()) as u8);
    descriptor.push(STRING_DESCRIPTOR);
    for unit in units {
        descriptor.extend_from_slice(&unit.to_le_bytes());
    }
    Some(descriptor)
}

/// The full descriptor identity of the exported device, built once from
/// configuration and immutable afterwards.
///
/// String descriptors and the IEEE 1284 device id are kept as raw blobs:
/// both may contain interior NUL bytes (string descriptors are UTF-16LE,
/// and the device id starts with a big-endian length), so `String` is the
/// wrong shape for them.
#[derive(Debug, Clone)]
pub struct DescriptorSet {
    pub device: DeviceDescriptor,
    pub configuration: ConfigurationDescriptor,
    pub qualifier: DeviceQualifierDescriptor,
    /// Index 0 is the LANGID descriptor; index N is string descriptor N.
    pub strings: Vec<Vec<u8>>,
    pub ieee_device_id: Vec<u8>,
    pub interfaces: Vec<InterfaceDescriptor>,
    /// Endpoint descriptors keyed by `bInterfaceNumber`.
    pub endpoints: BTreeMap<u8, Vec<EndpointDescriptor>>,
}

impl DescriptorSet {
    /// True if the device is an IPP-over-USB printer: at least two
    /// interfaces with class 7, subclass 1, protocol 4.
    pub fn is_ipp_usb(&self) -> bool {
        self.interfaces
            .iter()
            .filter(|i| {
                i.bInterfaceClass == IPPUSB_CLASS
                    && i.bInterfaceSubClass == IPPUSB_SUBCLASS
                    && i.bInterfaceProtocol == IPPUSB_PROTOCOL
            })
            .count()
            >= 2
    }
}

#[cfg(test)]
#[path = "tests/wire.rs"]
mod tests;
