//! The USB/IP wire protocol, version 0x0111.
//!
//! Two frame families share the TCP stream. Before a device is imported
//! the client speaks "OP" messages (device list, import), identified by a
//! 2-byte version and 2-byte command; afterwards it submits URBs as
//! CMD_SUBMIT/CMD_UNLINK frames with 4-byte commands. All multi-byte
//! fields are big-endian on the wire.
//!
//! Reference:
//! <https://www.kernel.org/doc/Documentation/usb/usbip_protocol.txt>

use crate::buffer::Buffer;
use crate::wire::DescriptorSet;

pub const USBIP_VERSION: u16 = 0x0111;

// OP commands
pub const OP_REQ_DEVLIST: u16 = 0x8005;
pub const OP_REP_DEVLIST: u16 = 0x0005;
pub const OP_REQ_IMPORT: u16 = 0x8003;
pub const OP_REP_IMPORT: u16 = 0x0003;

// URB commands
pub const CMD_SUBMIT: i32 = 0x0001;
pub const CMD_UNLINK: i32 = 0x0002;
pub const RET_SUBMIT: i32 = 0x0003;
pub const RET_UNLINK: i32 = 0x0004;

// Transfer directions
pub const DIR_OUT: i32 = 0;
pub const DIR_IN: i32 = 1;

/// Size of an OP message header on the wire.
pub const OP_HEADER_SIZE: usize = 8;
/// Size of the bus id payload of an OP_REQ_IMPORT.
pub const BUS_ID_SIZE: usize = 32;
/// Size of a CMD_SUBMIT / CMD_UNLINK / RET_SUBMIT frame on the wire.
pub const URB_FRAME_SIZE: usize = 48;
/// Size of an exported-device record in OP_REP_DEVLIST / OP_REP_IMPORT.
pub const DEVICE_RECORD_SIZE: usize = 312;

// Identity of the single exported device.
pub const BUS_PATH: &str = "/sys/devices/pci0000:00/0000:00:01.2/usb1/1-1";
pub const BUS_ID: &str = "1-1";
pub const BUSNUM: i32 = 1;
pub const DEVNUM: i32 = 2;
/// Speed code 3 is a high-speed (USB 2.0) device.
pub const SPEED_HIGH: i32 = 3;

/// Header shared by all OP messages.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OpHeader {
    pub version: u16,
    pub command: u16,
    pub status: i32,
}

impl OpHeader {
    pub fn parse(bytes: &[u8; OP_HEADER_SIZE]) -> Self {
        Self {
            version: u16::from_be_bytes([bytes[0], bytes[1]]),
            command: u16::from_be_bytes([bytes[2], bytes[3]]),
            status: i32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }

    pub fn add_to(&self, buf: &mut Buffer) {
        buf.add_u16_be(self.version);
        buf.add_u16_be(self.command);
        buf.add_i32_be(self.status);
    }
}

/// Header shared by all URB frames.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HeaderBasic {
    pub command: i32,
    pub seqnum: i32,
    pub devid: i32,
    /// 0 = OUT (host to device), 1 = IN (device to host).
    pub direction: i32,
    pub ep: i32,
}

/// A submitted URB. For OUT transfers, `transfer_buffer_length` bytes of
/// payload follow the frame on the stream; for control transfers the
/// SETUP packet rides in `setup`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CmdSubmit {
    pub header: HeaderBasic,
    pub transfer_flags: i32,
    pub transfer_buffer_length: i32,
    pub start_frame: i32,
    pub number_of_packets: i32,
    pub interval: i32,
    /// The raw SETUP packet, stored host-order after decode; see
    /// [`crate::wire::SetupPacket::from_word`].
    pub setup: u64,
}

impl CmdSubmit {
    pub fn decode(bytes: &[u8; URB_FRAME_SIZE]) -> Self {
        let word = |i: usize| {
            i32::from_be_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]])
        };
        let mut setup = [0u8; 8];
        setup.copy_from_slice(&bytes[40..48]);
        Self {
            header: HeaderBasic {
                command: word(0),
                seqnum: word(4),
                devid: word(8),
                direction: word(12),
                ep: word(16),
            },
            transfer_flags: word(20),
            transfer_buffer_length: word(24),
            start_frame: word(28),
            number_of_packets: word(32),
            interval: word(36),
            setup: u64::from_be_bytes(setup),
        }
    }
}

/// Reply to a [`CmdSubmit`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetSubmit {
    pub header: HeaderBasic,
    pub status: i32,
    pub actual_length: i32,
    pub start_frame: i32,
    pub number_of_packets: i32,
    pub error_count: i32,
    pub setup: u64,
}

impl RetSubmit {
    /// A success reply echoing the identifying fields of `request`, with
    /// every other field zero.
    pub fn reply_to(request: &CmdSubmit) -> Self {
        Self {
            header: HeaderBasic {
                command: RET_SUBMIT,
                seqnum: request.header.seqnum,
                devid: request.header.devid,
                direction: request.header.direction,
                ep: request.header.ep,
            },
            status: 0,
            actual_length: 0,
            start_frame: 0,
            number_of_packets: 0,
            error_count: 0,
            setup: 0,
        }
    }

    pub fn add_to(&self, buf: &mut Buffer) {
        buf.add_i32_be(self.header.command);
        buf.add_i32_be(self.header.seqnum);
        buf.add_i32_be(self.header.devid);
        buf.add_i32_be(self.header.direction);
        buf.add_i32_be(self.header.ep);
        buf.add_i32_be(self.status);
        buf.add_i32_be(self.actual_length);
        buf.add_i32_be(self.start_frame);
        buf.add_i32_be(self.number_of_packets);
        buf.add_i32_be(self.error_count);
        buf.add_u64_be(self.setup);
    }

    /// Serializes the reply followed by `payload`, ready for one socket
    /// write.
    pub fn serialize_with_payload(&self, payload: &[u8]) -> Buffer {
        let mut buf = Buffer::with_capacity(URB_FRAME_SIZE + payload.len());
        self.add_to(&mut buf);
        buf.add_bytes(payload);
        buf
    }
}

/// Appends a NUL-padded fixed-width string field.
fn add_padded(buf: &mut Buffer, s: &str, width: usize) {
    debug_assert!(s.len() <= width);
    buf.add_bytes(s.as_bytes());
    for _ in s.len()..width {
        buf.add_u8(0);
    }
}

/// Appends the 312-byte exported-device record describing the printer.
fn add_device_record(buf: &mut Buffer, descriptors: &DescriptorSet) {
    let device = &descriptors.device;
    let configuration = &descriptors.configuration;
    add_padded(buf, BUS_PATH, 256);
    add_padded(buf, BUS_ID, BUS_ID_SIZE);
    buf.add_i32_be(BUSNUM);
    buf.add_i32_be(DEVNUM);
    buf.add_i32_be(SPEED_HIGH);
    buf.add_u16_be(device.id_vendor());
    buf.add_u16_be(device.id_product());
    buf.add_u16_be(device.bcd_device());
    buf.add_u8(device.bDeviceClass);
    buf.add_u8(device.bDeviceSubClass);
    buf.add_u8(device.bDeviceProtocol);
    buf.add_u8(configuration.bConfigurationValue);
    buf.add_u8(device.bNumConfigurations);
    buf.add_u8(configuration.bNumInterfaces);
}

/// Builds the OP_REP_DEVLIST message listing the single exported device:
/// a 12-byte header, the device record, and one 4-byte record per
/// interface.
pub fn devlist_reply(descriptors: &DescriptorSet) -> Buffer {
    let interfaces = &descriptors.interfaces;
    let mut buf = Buffer::with_capacity(
        OP_HEADER_SIZE + 4 + DEVICE_RECORD_SIZE + 4 * interfaces.len(),
    );
    OpHeader {
        version: USBIP_VERSION,
        command: OP_REP_DEVLIST,
        status: 0,
    }
    .add_to(&mut buf);
    buf.add_i32_be(1); // one exported device
    add_device_record(&mut buf, descriptors);
    for interface in interfaces {
        buf.add_u8(interface.bInterfaceClass);
        buf.add_u8(interface.bInterfaceSubClass);
        buf.add_u8(interface.bInterfaceProtocol);
        buf.add_u8(0); // padding
    }
    buf
}

/// Builds the OP_REP_IMPORT message confirming the attach.
pub fn import_reply(descriptors: &DescriptorSet) -> Buffer {
    let mut buf = Buffer::with_capacity(OP_HEADER_SIZE + DEVICE_RECORD_SIZE);
    OpHeader {
        version: USBIP_VERSION,
        command: OP_REP_IMPORT,
        status: 0,
    }
    .add_to(&mut buf);
    add_device_record(&mut buf, descriptors);
    buf
}

#[cfg(test)]
#[path = "tests/usbip.rs"]
mod tests;
