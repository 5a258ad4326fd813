use super::*;
use crate::wire::{
    ConfigurationDescriptor, DeviceDescriptor, InterfaceDescriptor,
};

fn sample_descriptors() -> DescriptorSet {
    let device = DeviceDescriptor {
        bLength: 18,
        bDescriptorType: 1,
        bcdUSB: 0x0200u16.to_le_bytes(),
        bDeviceClass: 0,
        bDeviceSubClass: 0,
        bDeviceProtocol: 0,
        bMaxPacketSize0: 64,
        idVendor: 0x04A9u16.to_le_bytes(),
        idProduct: 0x27E8u16.to_le_bytes(),
        bcdDevice: 0x0100u16.to_le_bytes(),
        iManufacturer: 1,
        iProduct: 2,
        iSerialNumber: 3,
        bNumConfigurations: 1,
    };
    let configuration = ConfigurationDescriptor {
        bLength: 9,
        bDescriptorType: 2,
        wTotalLength: 32u16.to_le_bytes(),
        bNumInterfaces: 2,
        bConfigurationValue: 1,
        iConfiguration: 0,
        bmAttributes: 0x80,
        bMaxPower: 50,
    };
    let interface = |number: u8| InterfaceDescriptor {
        bLength: 9,
        bDescriptorType: 4,
        bInterfaceNumber: number,
        bAlternateSetting: 0,
        bNumEndpoints: 2,
        bInterfaceClass: 7,
        bInterfaceSubClass: 1,
        bInterfaceProtocol: 4,
        iInterface: 0,
    };
    DescriptorSet {
        device,
        configuration,
        qualifier: bytemuck::Zeroable::zeroed(),
        strings: Vec::new(),
        ieee_device_id: Vec::new(),
        interfaces: vec![interface(0), interface(1)],
        endpoints: Default::default(),
    }
}

#[test]
fn parses_op_header() {
    let header = OpHeader::parse(&[0x01, 0x11, 0x80, 0x05, 0x00, 0x00, 0x00, 0x00]);
    assert_eq!(header.version, USBIP_VERSION);
    assert_eq!(header.command, OP_REQ_DEVLIST);
    assert_eq!(header.status, 0);
}

#[test]
fn op_header_round_trip() {
    let header = OpHeader {
        version: USBIP_VERSION,
        command: OP_REQ_IMPORT,
        status: -1,
    };
    let mut buf = Buffer::new();
    header.add_to(&mut buf);
    let mut bytes = [0u8; OP_HEADER_SIZE];
    bytes.copy_from_slice(buf.data());
    assert_eq!(OpHeader::parse(&bytes), header);
}

#[test]
fn builds_devlist_reply() {
    let reply = devlist_reply(&sample_descriptors());
    // Header, one device record, and two 4-byte interface records.
    assert_eq!(reply.len(), 12 + DEVICE_RECORD_SIZE + 2 * 4);
    assert_eq!(
        &reply.data()[..12],
        &[0x01, 0x11, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01]
    );
    // The device record starts with the NUL-padded bus path.
    let record = &reply.data()[12..];
    assert!(record.starts_with(BUS_PATH.as_bytes()));
    assert_eq!(record[BUS_PATH.len()], 0);
    assert!(record[256..].starts_with(BUS_ID.as_bytes()));
    // busnum, devnum, speed.
    assert_eq!(&record[288..300], &[0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3]);
    // idVendor and idProduct, big-endian on the wire.
    assert_eq!(&record[300..304], &[0x04, 0xA9, 0x27, 0xE8]);
    // Class triple, configuration value, configuration/interface counts.
    assert_eq!(&record[306..312], &[0, 0, 0, 1, 1, 2]);
    // Interface records: class, subclass, protocol, padding.
    assert_eq!(&reply.data()[12 + DEVICE_RECORD_SIZE..], &[7, 1, 4, 0, 7, 1, 4, 0]);
}

#[test]
fn builds_import_reply() {
    let reply = import_reply(&sample_descriptors());
    assert_eq!(reply.len(), OP_HEADER_SIZE + DEVICE_RECORD_SIZE);
    assert_eq!(
        &reply.data()[..8],
        &[0x01, 0x11, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00]
    );
}

#[test]
fn decodes_cmd_submit() {
    let mut frame = [0u8; URB_FRAME_SIZE];
    frame[3] = 0x01; // CMD_SUBMIT
    frame[7] = 0x05; // seqnum
    frame[15] = 0x01; // direction IN
    frame[19] = 0x00; // ep 0
    frame[24..28].copy_from_slice(&18i32.to_be_bytes());
    frame[40..48].copy_from_slice(&[0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x12, 0x00]);

    let command = CmdSubmit::decode(&frame);
    assert_eq!(command.header.command, CMD_SUBMIT);
    assert_eq!(command.header.seqnum, 5);
    assert_eq!(command.header.direction, DIR_IN);
    assert_eq!(command.header.ep, 0);
    assert_eq!(command.transfer_buffer_length, 18);

    let setup = crate::wire::SetupPacket::from_word(command.setup);
    assert_eq!(setup.bRequest, 0x06);
    assert_eq!(setup.wLength, 18);
}

#[test]
fn ret_submit_echoes_request() {
    let mut frame = [0u8; URB_FRAME_SIZE];
    frame[3] = 0x01;
    frame[4..8].copy_from_slice(&7i32.to_be_bytes());
    frame[8..12].copy_from_slice(&3i32.to_be_bytes());
    frame[12..16].copy_from_slice(&1i32.to_be_bytes());
    frame[16..20].copy_from_slice(&2i32.to_be_bytes());
    let command = CmdSubmit::decode(&frame);

    let reply = RetSubmit::reply_to(&command);
    assert_eq!(reply.header.command, RET_SUBMIT);
    assert_eq!(reply.header.seqnum, 7);
    assert_eq!(reply.header.devid, 3);
    assert_eq!(reply.header.direction, 1);
    assert_eq!(reply.header.ep, 2);
    assert_eq!(reply.status, 0);
    assert_eq!(reply.actual_length, 0);
}

#[test]
fn serializes_ret_submit_with_payload() {
    let command = CmdSubmit::decode(&{
        let mut frame = [0u8; URB_FRAME_SIZE];
        frame[4..8].copy_from_slice(&9i32.to_be_bytes());
        frame
    });
    let mut reply = RetSubmit::reply_to(&command);
    reply.actual_length = 3;
    let buf = reply.serialize_with_payload(b"abc");
    assert_eq!(buf.len(), URB_FRAME_SIZE + 3);
    // command RET_SUBMIT, seqnum 9.
    assert_eq!(&buf.data()[..8], &[0, 0, 0, 3, 0, 0, 0, 9]);
    // actual_length at offset 24.
    assert_eq!(&buf.data()[24..28], &[0, 0, 0, 3]);
    assert_eq!(&buf.data()[URB_FRAME_SIZE..], b"abc");
}
