//! The emulated printer: control-request handling, bulk data paths, and
//! the per-interface HTTP reassembly that makes ippusb work.

use crate::buffer::Buffer;
use crate::escl::EsclManager;
use crate::http::{self, HttpRequest, HttpResponse};
use crate::ipp::{self, IppHeader};
use crate::ipp_service::IppManager;
use crate::sink::DocumentSink;
use crate::usbip::{self, CmdSubmit, RetSubmit};
use crate::wire::{self, DescriptorSet, RequestKind, SetupPacket};
use std::collections::VecDeque;
use std::io::{Read, Write};

/// Reassembly state for one ippusb interface.
///
/// Each interface owns a pair of bulk endpoints. HTTP requests arrive in
/// arbitrary slices on the OUT endpoint and accumulate in `message`;
/// completed responses wait in `queue` for IN URBs to carry them out,
/// fragmenting head-first when one URB cannot hold a whole response.
#[derive(Debug, Default)]
struct InterfaceState {
    queue: VecDeque<Buffer>,
    receiving_message: bool,
    receiving_chunked: bool,
    request: HttpRequest,
    message: Buffer,
}

/// A single USB printer: descriptors, the protocol handlers, and one
/// [`InterfaceState`] per configured interface.
#[derive(Debug)]
pub struct UsbPrinter {
    descriptors: DescriptorSet,
    ipp: IppManager,
    escl: EsclManager,
    sink: Option<DocumentSink>,
    interfaces: Vec<InterfaceState>,
}

impl UsbPrinter {
    pub fn new(
        descriptors: DescriptorSet,
        ipp: IppManager,
        escl: EsclManager,
        sink: Option<DocumentSink>,
    ) -> Self {
        let interfaces = descriptors
            .interfaces
            .iter()
            .map(|_| InterfaceState::default())
            .collect();
        Self {
            descriptors,
            ipp,
            escl,
            sink,
            interfaces,
        }
    }

    pub fn descriptors(&self) -> &DescriptorSet {
        &self.descriptors
    }

    /// Services one CMD_SUBMIT: decodes it into a control, bulk-IN or
    /// bulk-OUT transfer, performs it, and writes the RET_SUBMIT reply
    /// (plus payload) to `socket`.
    pub fn handle_urb<S: Read + Write>(
        &mut self,
        socket: &mut S,
        request: &CmdSubmit,
    ) -> std::io::Result<()> {
        if request.header.ep == 0 {
            self.handle_control(socket, request)
        } else if request.header.direction == usbip::DIR_IN {
            self.handle_bulk_in(socket, request)
        } else {
            self.handle_data_out(socket, request)
        }
    }

    fn handle_control<S: Read + Write>(
        &mut self,
        socket: &mut S,
        request: &CmdSubmit,
    ) -> std::io::Result<()> {
        let setup = SetupPacket::from_word(request.setup);
        match setup.kind() {
            RequestKind::Standard => self.handle_standard_control(socket, request, &setup),
            RequestKind::Class => self.handle_printer_control(socket, request, &setup),
            RequestKind::Vendor | RequestKind::Reserved => {
                log::error!("unable to handle control request {:?}", setup);
                send_control_response(socket, request, &[])
            }
        }
    }

    fn handle_standard_control<S: Read + Write>(
        &mut self,
        socket: &mut S,
        request: &CmdSubmit,
        setup: &SetupPacket,
    ) -> std::io::Result<()> {
        match setup.bRequest {
            wire::GET_STATUS => {
                log::debug!("GetStatus");
                send_control_response(socket, request, &[0, 0])
            }
            wire::GET_DESCRIPTOR => self.handle_get_descriptor(socket, request, setup),
            wire::GET_CONFIGURATION => {
                log::debug!("GetConfiguration");
                let value = self.descriptors.configuration.bConfigurationValue;
                send_control_response(socket, request, &[value])
            }
            wire::CLEAR_FEATURE
            | wire::SET_FEATURE
            | wire::SET_ADDRESS
            | wire::SET_DESCRIPTOR
            | wire::SET_CONFIGURATION
            | wire::GET_INTERFACE
            | wire::SET_INTERFACE
            | wire::SET_FRAME => {
                log::debug!("unsupported standard request {}", setup.bRequest);
                send_control_response(socket, request, &[])
            }
            other => {
                log::error!("unknown standard control request {}", other);
                send_control_response(socket, request, &[])
            }
        }
    }

    fn handle_get_descriptor<S: Read + Write>(
        &mut self,
        socket: &mut S,
        request: &CmdSubmit,
        setup: &SetupPacket,
    ) -> std::io::Result<()> {
        log::debug!(
            "GetDescriptor type {} index {}",
            setup.value_high(),
            setup.value_low()
        );
        match setup.value_high() {
            wire::DEVICE_DESCRIPTOR => {
                let bytes = bytemuck::bytes_of(&self.descriptors.device);
                let len = bytes.len().min(setup.wLength as usize);
                send_control_response(socket, request, &bytes[..len])
            }
            wire::CONFIGURATION_DESCRIPTOR => {
                let response = self.configuration_tree(setup.wLength as usize);
                send_control_response(socket, request, response.data())
            }
            wire::STRING_DESCRIPTOR => {
                let index = setup.value_low() as usize;
                match self.descriptors.strings.get(index) {
                    Some(blob) => {
                        let len = (blob[0] as usize).min(blob.len());
                        send_control_response(socket, request, &blob[..len])
                    }
                    None => {
                        log::error!("no string descriptor at index {}", index);
                        send_control_response(socket, request, &[])
                    }
                }
            }
            wire::DEVICE_QUALIFIER_DESCRIPTOR => {
                let bytes = bytemuck::bytes_of(&self.descriptors.qualifier);
                send_control_response(socket, request, bytes)
            }
            other => {
                log::error!("unknown descriptor type request {}", other);
                send_control_response(socket, request, &[])
            }
        }
    }

    /// Assembles the GET_DESCRIPTOR Configuration response. A request
    /// for exactly the bare configuration descriptor gets just that;
    /// any longer request gets the full tree: configuration, then each
    /// interface followed by its endpoint descriptors, in order.
    fn configuration_tree(&self, w_length: usize) -> Buffer {
        let mut response = Buffer::with_capacity(w_length);
        response.add_bytes(bytemuck::bytes_of(&self.descriptors.configuration));
        if w_length != response.len() {
            for interface in &self.descriptors.interfaces {
                response.add_bytes(bytemuck::bytes_of(interface));
                match self.descriptors.endpoints.get(&interface.bInterfaceNumber) {
                    Some(endpoints) => {
                        for endpoint in endpoints {
                            response.add_bytes(bytemuck::bytes_of(endpoint));
                        }
                    }
                    None => log::error!(
                        "no endpoints for interface {}",
                        interface.bInterfaceNumber
                    ),
                }
            }
        }
        if response.len() != w_length {
            log::error!(
                "configuration tree is {} bytes but {} were requested",
                response.len(),
                w_length
            );
            response.shrink(w_length);
        }
        response
    }

    fn handle_printer_control<S: Read + Write>(
        &mut self,
        socket: &mut S,
        request: &CmdSubmit,
        setup: &SetupPacket,
    ) -> std::io::Result<()> {
        match setup.bRequest {
            wire::GET_DEVICE_ID => {
                log::debug!("GetDeviceId");
                send_control_response(socket, request, &self.descriptors.ieee_device_id)
            }
            wire::GET_PORT_STATUS | wire::SOFT_RESET => {
                send_control_response(socket, request, &[])
            }
            other => {
                log::error!("unknown printer class request {}", other);
                send_control_response(socket, request, &[])
            }
        }
    }

    /// Receives a bulk-OUT payload, acknowledges it, and routes it to
    /// the HTTP assembler (ippusb printers) or the document sink.
    fn handle_data_out<S: Read + Write>(
        &mut self,
        socket: &mut S,
        request: &CmdSubmit,
    ) -> std::io::Result<()> {
        let length = request.transfer_buffer_length.max(0) as usize;
        let mut payload = vec![0u8; length];
        socket.read_exact(&mut payload)?;
        log::info!("received {} bytes", length);

        // Acknowledge receipt of the BULK transfer.
        let mut reply = RetSubmit::reply_to(request);
        reply.actual_length = length as i32;
        socket.write_all(reply.serialize_with_payload(&[]).data())?;

        if self.descriptors.is_ipp_usb() {
            self.handle_ippusb_data(request.header.ep, Buffer::from_vec(payload));
        } else if let Some(sink) = &self.sink {
            log::info!("recording document...");
            sink.append(&payload);
        }
        Ok(())
    }

    /// Endpoints come in OUT/IN pairs per interface: endpoints 1 and 2
    /// map to interface 0, endpoints 3 and 4 to interface 1, and so on.
    fn interface_index(&self, ep: i32) -> Option<usize> {
        if ep < 1 {
            log::error!("request on invalid endpoint {}", ep);
            return None;
        }
        let index = ((ep - 1) / 2) as usize;
        if index >= self.interfaces.len() {
            log::error!("request on invalid endpoint {}", ep);
            return None;
        }
        Some(index)
    }

    /// One step of the per-interface HTTP assembler: start a new request
    /// if none is in flight, accumulate, and on completion queue the
    /// generated response.
    fn handle_ippusb_data(&mut self, ep: i32, mut data: Buffer) {
        let Some(index) = self.interface_index(ep) else {
            return;
        };
        let state = &mut self.interfaces[index];
        if !state.receiving_message {
            match HttpRequest::deserialize(&mut data) {
                Some(request) => {
                    state.receiving_chunked = request.is_chunked();
                    state.receiving_message = true;
                    state.request = request;
                }
                None => {
                    log::error!("incoming message is not valid HTTP; ignoring");
                    return;
                }
            }
        }
        state.message.add(&data);

        let complete = if state.receiving_chunked {
            http::contains_final_chunk(&state.message)
        } else {
            state.message.len() == state.request.content_length()
        };
        if !complete {
            return;
        }

        state.receiving_message = false;
        let mut message = std::mem::take(&mut state.message);
        let body = if state.receiving_chunked {
            http::merge_chunks(&mut message)
        } else {
            message
        };
        let request = state.request.clone();

        let response = self.generate_response(&request, body);
        let mut serialized = Buffer::new();
        response.serialize(&mut serialized);
        log::info!("queueing {} response bytes", serialized.len());
        self.interfaces[index].queue.push_back(serialized);
    }

    /// Maps a completed HTTP request to its response: IPP on
    /// `POST /ipp/print`, eSCL under `/eSCL`, 404 for everything else.
    fn generate_response(&mut self, request: &HttpRequest, mut body: Buffer) -> HttpResponse {
        if request.method == "POST" && request.uri == "/ipp/print" {
            let Some(header) = IppHeader::deserialize(&body) else {
                log::error!("request does not contain a valid IPP header");
                return HttpResponse::unsupported_media_type();
            };
            if !ipp::remove_attributes(&mut body) {
                log::error!("IPP request has a malformed attributes section");
                return HttpResponse::unsupported_media_type();
            }
            let mut response = HttpResponse::ok();
            response
                .headers
                .insert("Content-Type".to_string(), "application/ipp".to_string());
            response.body = self.ipp.handle_request(&header, &body);
            response
        } else if request.uri.starts_with("/eSCL") {
            self.escl.handle_request(request, &body)
        } else {
            log::error!(
                "invalid method {:?} and/or endpoint {:?}",
                request.method,
                request.uri
            );
            HttpResponse::not_found()
        }
    }

    /// Answers a bulk-IN URB from the interface's response queue. An
    /// empty queue yields a zero-length reply; a response longer than
    /// the URB's capacity is split, with the remainder re-queued at the
    /// head so fragments stay in order.
    fn handle_bulk_in<S: Read + Write>(
        &mut self,
        socket: &mut S,
        request: &CmdSubmit,
    ) -> std::io::Result<()> {
        let Some(index) = self.interface_index(request.header.ep) else {
            return send_control_response(socket, request, &[]);
        };
        let state = &mut self.interfaces[index];
        let Some(mut message) = state.queue.pop_front() else {
            log::info!("no queued messages; sending empty response");
            return send_control_response(socket, request, &[]);
        };

        let capacity = request.transfer_buffer_length.max(0) as usize;
        if message.len() > capacity {
            let mut leftover = Buffer::with_capacity(message.len() - capacity);
            leftover.add_window(&message, capacity, message.len() - capacity);
            message.shrink(capacity);
            state.queue.push_front(leftover);
        }
        log::info!("sending {} byte response", message.len());

        let mut reply = RetSubmit::reply_to(request);
        reply.actual_length = message.len() as i32;
        socket.write_all(reply.serialize_with_payload(message.data()).data())
    }
}

/// Writes a RET_SUBMIT carrying `payload` (possibly empty) for a control
/// or IN transfer.
fn send_control_response<S: Read + Write>(
    socket: &mut S,
    request: &CmdSubmit,
    payload: &[u8],
) -> std::io::Result<()> {
    let mut reply = RetSubmit::reply_to(request);
    reply.actual_length = payload.len() as i32;
    socket.write_all(reply.serialize_with_payload(payload).data())
}

#[cfg(test)]
#[path = "tests/printer.rs"]
mod tests;
