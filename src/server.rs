//! The TCP front end: listener setup and the USB/IP session state
//! machine.
//!
//! A connection starts in the pre-import state, where the client may ask
//! for the device list (answered, then the connection closes — the
//! client reconnects to import) or import the device. After a
//! successful import the same connection carries URB traffic until EOF.
//! Connections are accepted one at a time and each URB is fully handled
//! before the next is read; there is no multiplexing to get wrong.

use crate::printer::UsbPrinter;
use crate::usbip::{self, CmdSubmit, OpHeader};
use std::io::{ErrorKind, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener};

/// The fixed port USB/IP clients connect to.
pub const USBIP_PORT: u16 = 3240;

/// Builds the IPv4 listener with `SO_REUSEADDR` set before binding, so a
/// restarted emulator can reclaim the port immediately.
fn setup_listener(port: u16) -> std::io::Result<TcpListener> {
    let socket =
        socket2::Socket::new(socket2::Domain::IPV4, socket2::Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.bind(&socket2::SockAddr::from(SocketAddrV4::new(
        Ipv4Addr::UNSPECIFIED,
        port,
    )))?;
    socket.listen(128)?;
    Ok(socket.into())
}

pub struct Server {
    printer: UsbPrinter,
    listener: TcpListener,
}

impl Server {
    /// Creates a server listening on the standard USB/IP port.
    ///
    /// # Errors
    ///
    /// Can return a `std::io::Error` if any of the underlying socket
    /// calls fail.
    pub fn new(printer: UsbPrinter) -> std::io::Result<Self> {
        Self::with_port(printer, USBIP_PORT)
    }

    /// Creates a server on an arbitrary port (port 0 picks an ephemeral
    /// one, which the tests rely on).
    pub fn with_port(printer: UsbPrinter, port: u16) -> std::io::Result<Self> {
        let listener = setup_listener(port)?;
        log::info!("bound server to {}", listener.local_addr()?);
        Ok(Self { printer, listener })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts and services connections forever, one at a time.
    pub fn run(&mut self) -> std::io::Result<()> {
        println!("usbip-printer: ready to accept connections");
        loop {
            let (mut stream, peer) = self.listener.accept()?;
            log::info!("connection from {}", peer);
            match handle_connection(&mut self.printer, &mut stream) {
                Ok(()) => log::info!("connection from {} closed", peer),
                Err(e) => log::error!("connection from {} failed: {}", peer, e),
            }
        }
    }
}

enum OpOutcome {
    Attached,
    Close,
}

/// Services one connection to completion: OP requests until an import
/// succeeds, then URBs until EOF or a framing error.
pub fn handle_connection<S: Read + Write>(
    printer: &mut UsbPrinter,
    socket: &mut S,
) -> std::io::Result<()> {
    let mut attached = false;
    loop {
        if !attached {
            match handle_op_request(printer, socket)? {
                OpOutcome::Attached => attached = true,
                OpOutcome::Close => return Ok(()),
            }
        } else if !handle_usb_request(printer, socket)? {
            return Ok(());
        }
    }
}

/// Reads exactly `buf.len()` bytes; `Ok(false)` means the peer closed
/// the connection instead.
fn read_frame<S: Read>(socket: &mut S, buf: &mut [u8]) -> std::io::Result<bool> {
    match socket.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
            log::info!("client closed connection");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

fn handle_op_request<S: Read + Write>(
    printer: &mut UsbPrinter,
    socket: &mut S,
) -> std::io::Result<OpOutcome> {
    let mut header_bytes = [0u8; usbip::OP_HEADER_SIZE];
    if !read_frame(socket, &mut header_bytes)? {
        return Ok(OpOutcome::Close);
    }
    let header = OpHeader::parse(&header_bytes);
    match header.command {
        usbip::OP_REQ_DEVLIST => {
            log::info!("listing devices...");
            socket.write_all(usbip::devlist_reply(printer.descriptors()).data())?;
            Ok(OpOutcome::Close)
        }
        usbip::OP_REQ_IMPORT => {
            log::info!("attaching device...");
            // Only one device is exported, so the requested bus id is
            // read off the stream and ignored.
            let mut bus_id = [0u8; usbip::BUS_ID_SIZE];
            if !read_frame(socket, &mut bus_id)? {
                return Ok(OpOutcome::Close);
            }
            socket.write_all(usbip::import_reply(printer.descriptors()).data())?;
            Ok(OpOutcome::Attached)
        }
        other => {
            log::error!("unknown op command {:#06x}", other);
            Ok(OpOutcome::Close)
        }
    }
}

/// Handles one URB frame. Returns whether the connection stays open.
fn handle_usb_request<S: Read + Write>(
    printer: &mut UsbPrinter,
    socket: &mut S,
) -> std::io::Result<bool> {
    let mut frame = [0u8; usbip::URB_FRAME_SIZE];
    if !read_frame(socket, &mut frame)? {
        return Ok(false);
    }
    let command = CmdSubmit::decode(&frame);
    match command.header.command {
        usbip::CMD_SUBMIT => {
            printer.handle_urb(socket, &command)?;
            Ok(true)
        }
        usbip::CMD_UNLINK => {
            // The victim seqnum rides in the first word after the basic
            // header. Unlink is acknowledged by doing nothing: the
            // submit reply is already on its way or never will be.
            log::info!("received unlink for seqnum {}; ignoring", command.transfer_flags);
            Ok(true)
        }
        other => {
            log::error!("unknown USB/IP command {}", other);
            Ok(false)
        }
    }
}

#[cfg(test)]
#[path = "tests/session.rs"]
mod tests;
