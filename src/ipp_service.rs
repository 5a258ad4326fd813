//! IPP request handling: operation-id dispatch over a static attribute
//! table.
//!
//! The printer does not track job state over IPP; every operation is
//! answered with the same configuration-supplied attribute groups, which
//! is enough for a client to validate, create, and "print" jobs. The one
//! side effect is Send-Document, which forwards the document body to the
//! record sink when one is configured.

use crate::buffer::Buffer;
use crate::ipp::{self, IppAttribute, IppHeader, IppTag};
use crate::sink::DocumentSink;

/// The four attribute groups loaded from configuration, constant for the
/// life of the process.
#[derive(Debug, Clone, Default)]
pub struct AttributeTable {
    pub operation: Vec<IppAttribute>,
    pub printer: Vec<IppAttribute>,
    pub job: Vec<IppAttribute>,
    pub unsupported: Vec<IppAttribute>,
}

#[derive(Debug)]
pub struct IppManager {
    attributes: AttributeTable,
    sink: Option<DocumentSink>,
}

impl IppManager {
    pub fn new(attributes: AttributeTable, sink: Option<DocumentSink>) -> Self {
        Self { attributes, sink }
    }

    /// Produces the IPP response payload for a request. Unknown
    /// operations yield an empty payload.
    pub fn handle_request(&self, header: &IppHeader, body: &Buffer) -> Buffer {
        match header.operation_id {
            ipp::VALIDATE_JOB => {
                log::info!("Validate-Job {}", header.request_id);
                self.response(header, &[])
            }
            ipp::CREATE_JOB => {
                log::info!("Create-Job {}", header.request_id);
                self.response(header, &[(IppTag::Job, self.attributes.job.as_slice())])
            }
            ipp::SEND_DOCUMENT => {
                log::info!("Send-Document {}", header.request_id);
                if let Some(sink) = &self.sink {
                    sink.append(body.data());
                }
                self.response(header, &[(IppTag::Job, self.attributes.job.as_slice())])
            }
            ipp::GET_JOB_ATTRIBUTES => {
                log::info!("Get-Job-Attributes {}", header.request_id);
                self.response(header, &[(IppTag::Job, self.attributes.job.as_slice())])
            }
            ipp::GET_PRINTER_ATTRIBUTES => {
                log::info!("Get-Printer-Attributes {}", header.request_id);
                self.response(header, &[(IppTag::Printer, self.attributes.printer.as_slice())])
            }
            other => {
                log::error!("unknown operation id {:#06x} in IPP request", other);
                Buffer::new()
            }
        }
    }

    /// Builds a success response: echoed header, the operation group,
    /// any extra groups, and the end-of-attributes tag. The buffer is
    /// sized up front from the exact attribute sizes.
    fn response(&self, request: &IppHeader, groups: &[(IppTag, &[IppAttribute])]) -> Buffer {
        let header = IppHeader {
            major: request.major,
            minor: request.minor,
            operation_id: ipp::STATUS_OK,
            request_id: request.request_id,
        };
        let size = ipp::IPP_HEADER_SIZE
            + 1
            + ipp::attributes_size(&self.attributes.operation)
            + groups
                .iter()
                .map(|(_, attrs)| 1 + ipp::attributes_size(attrs))
                .sum::<usize>()
            + 1;
        let mut buf = Buffer::with_capacity(size);
        header.serialize(&mut buf);
        ipp::add_attributes(IppTag::Operation, &self.attributes.operation, &mut buf);
        for (tag, attrs) in groups {
            ipp::add_attributes(*tag, attrs, &mut buf);
        }
        ipp::add_end_of_attributes(&mut buf);
        debug_assert_eq!(buf.len(), size);
        buf
    }
}

#[cfg(test)]
#[path = "tests/ipp_service.rs"]
mod tests;
