//! eSCL, the HTTP/XML driverless scanning protocol, as served over the
//! ippusb tunnel.
//!
//! Three documents matter: `ScannerCapabilities` and `ScannerStatus`,
//! which the emulator serializes, and `ScanSettings`, which it parses
//! from a scan-job POST. Job state is a small lifecycle per UUID:
//! Pending on creation, Completed once the (placeholder) document has
//! been fetched, Canceled on DELETE.

use crate::buffer::Buffer;
use crate::http::{HttpRequest, HttpResponse};
use crate::xml::Element;
use std::collections::BTreeMap;
use std::time::Instant;
use uuid::Uuid;

const PWG_NS: &str = "http://www.pwg.org/schemas/2010/12/sm";
const SCAN_NS: &str = "http://schemas.hp.com/imaging/escl/2011/05/03";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// The document served for `NextDocument`. A real scanner would render
/// the platen; a fixed blob satisfies clients that only check transport.
pub const PLACEHOLDER_DOCUMENT: &[u8] =
    b"%PDF-1.4\n% virtual scanner output\n%%EOF\n";

/// What one input source (the platen) can do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCapabilities {
    pub color_modes: Vec<String>,
    pub formats: Vec<String>,
    pub resolutions: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerCapabilities {
    pub make_and_model: String,
    pub serial_number: String,
    pub platen: SourceCapabilities,
}

impl ScannerCapabilities {
    /// Serializes the eSCL ScannerCapabilities document.
    pub fn to_xml(&self) -> Vec<u8> {
        let mut root = Element::new("scan:ScannerCapabilities");
        root.set_attribute("xmlns:scan", SCAN_NS);
        root.set_attribute("xmlns:pwg", PWG_NS);
        root.set_attribute("xmlns:xsi", XSI_NS);

        root.add_text_child("pwg:Version", "2.63");
        root.add_text_child("pwg:MakeAndModel", &self.make_and_model);
        root.add_text_child("pwg:SerialNumber", &self.serial_number);

        let platen = root.add_child("scan:Platen");
        let caps = platen.add_child("scan:PlatenInputCaps");
        caps.add_text_child("scan:MinWidth", "16");
        caps.add_text_child("scan:MaxWidth", "2550");
        caps.add_text_child("scan:MinHeight", "16");
        caps.add_text_child("scan:MaxHeight", "3507");
        caps.add_text_child("scan:MaxScanRegions", "1");

        let profiles = caps.add_child("scan:SettingProfiles");
        let profile = profiles.add_child("scan:SettingProfile");
        let color_modes = profile.add_child("scan:ColorModes");
        for mode in &self.platen.color_modes {
            color_modes.add_text_child("scan:ColorMode", mode);
        }
        let formats = profile.add_child("scan:DocumentFormats");
        for format in &self.platen.formats {
            formats.add_text_child("pwg:DocumentFormat", format);
        }
        let resolutions = profile.add_child("scan:SupportedResolutions");
        let discrete = resolutions.add_child("scan:DiscreteResolutions");
        for resolution in &self.platen.resolutions {
            let r = discrete.add_child("scan:DiscreteResolution");
            r.add_text_child("scan:XResolution", &resolution.to_string());
            r.add_text_child("scan:YResolution", &resolution.to_string());
        }

        let intents = caps.add_child("scan:SupportedIntents");
        intents.add_text_child("scan:Intent", "Document");
        intents.add_text_child("scan:Intent", "TextAndGraphic");
        intents.add_text_child("scan:Intent", "Photo");
        intents.add_text_child("scan:Intent", "Preview");

        caps.add_text_child("scan:MaxOpticalXResolution", "2400");
        caps.add_text_child("scan:MaxOpticalYResolution", "2400");
        caps.add_text_child("scan:RiskyLeftMargin", "0");
        caps.add_text_child("scan:RiskyRightMargin", "0");
        caps.add_text_child("scan:RiskyTopMargin", "0");
        caps.add_text_child("scan:RiskyBottomMargin", "0");

        root.serialize()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Canceled,
    Completed,
}

#[derive(Debug, Clone)]
pub struct JobInfo {
    pub state: JobState,
    pub created: Instant,
    /// Document format requested in the job's ScanSettings.
    pub format: String,
}

/// Scanner state as reported by `GET /eSCL/ScannerStatus`.
#[derive(Debug, Clone, Default)]
pub struct ScannerStatus {
    pub idle: bool,
    pub jobs: BTreeMap<Uuid, JobInfo>,
}

impl ScannerStatus {
    /// Serializes the eSCL ScannerStatus document.
    pub fn to_xml(&self) -> Vec<u8> {
        let mut root = Element::new("scan:ScannerStatus");
        root.set_attribute("xmlns:scan", SCAN_NS);
        root.set_attribute("xmlns:pwg", PWG_NS);
        root.set_attribute("xmlns:xsi", XSI_NS);

        root.add_text_child("pwg:Version", "2.6.3");
        root.add_text_child("pwg:State", if self.idle { "Idle" } else { "Busy" });

        let jobs = root.add_child("scan:Jobs");
        for (uuid, info) in &self.jobs {
            let job = jobs.add_child("scan:JobInfo");
            job.add_text_child("pwg:JobUri", &format!("/eSCL/ScanJobs/{}", uuid));
            job.add_text_child("pwg:JobUuid", &format!("urn:uuid:{}", uuid));
            // Scanners are inconsistent about job age; report elapsed
            // seconds since creation.
            job.add_text_child("scan:Age", &info.created.elapsed().as_secs().to_string());

            let (completed, to_transfer, state, reason) = match info.state {
                JobState::Pending => (1, 1, "Pending", "JobScanning"),
                JobState::Canceled => (0, 0, "Canceled", "JobTimedOut"),
                JobState::Completed => (1, 0, "Completed", "JobCompletedSuccessfully"),
            };
            job.add_text_child("pwg:ImagesCompleted", &completed.to_string());
            job.add_text_child("pwg:ImagesToTransfer", &to_transfer.to_string());
            job.add_text_child("pwg:JobState", state);
            let reasons = job.add_child("pwg:JobStateReasons");
            reasons.add_text_child("pwg:JobStateReason", reason);
        }

        root.serialize()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ColorMode {
    #[default]
    Rgb,
    Grayscale,
    BlackAndWhite,
}

impl ColorMode {
    pub fn from_name(name: &str) -> Option<ColorMode> {
        match name {
            "RGB24" => Some(ColorMode::Rgb),
            "Grayscale8" => Some(ColorMode::Grayscale),
            "BlackAndWhite1" => Some(ColorMode::BlackAndWhite),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColorMode::Rgb => "RGB24",
            ColorMode::Grayscale => "Grayscale8",
            ColorMode::BlackAndWhite => "BlackAndWhite1",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanRegion {
    pub units: String,
    pub height: i32,
    pub width: i32,
    pub x_offset: i32,
    pub y_offset: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanSettings {
    pub regions: Vec<ScanRegion>,
    pub document_format: String,
    pub color_mode: ColorMode,
    pub input_source: String,
    pub x_resolution: i32,
    pub y_resolution: i32,
}

fn int_content(element: &Element) -> Option<i32> {
    element.text.parse().ok()
}

fn scan_region(element: &Element) -> Option<ScanRegion> {
    let mut region = ScanRegion::default();
    for child in &element.children {
        match child.local_name() {
            "ContentRegionUnits" => region.units = child.text.clone(),
            "Height" => region.height = int_content(child)?,
            "Width" => region.width = int_content(child)?,
            "XOffset" => region.x_offset = int_content(child)?,
            "YOffset" => region.y_offset = int_content(child)?,
            _ => {}
        }
    }
    Some(region)
}

impl ScanSettings {
    /// Parses a ScanSettings document. Absent fields keep their
    /// defaults; malformed integer content or an unknown color mode
    /// fail the parse.
    pub fn from_xml(xml: &[u8]) -> Option<ScanSettings> {
        let root = Element::parse(xml).ok()?;
        let mut settings = ScanSettings::default();
        for node in &root.children {
            match node.local_name() {
                "ScanRegions" => {
                    for child in node.children_named("ScanRegion") {
                        settings.regions.push(scan_region(child)?);
                    }
                }
                "DocumentFormat" => settings.document_format = node.text.clone(),
                "ColorMode" => settings.color_mode = ColorMode::from_name(&node.text)?,
                "InputSource" => settings.input_source = node.text.clone(),
                "XResolution" => settings.x_resolution = int_content(node)?,
                "YResolution" => settings.y_resolution = int_content(node)?,
                _ => {}
            }
        }
        Some(settings)
    }

    /// Serializes the settings back to XML, the inverse of
    /// [`ScanSettings::from_xml`].
    pub fn to_xml(&self) -> Vec<u8> {
        let mut root = Element::new("scan:ScanSettings");
        root.set_attribute("xmlns:scan", SCAN_NS);
        root.set_attribute("xmlns:pwg", PWG_NS);

        if !self.regions.is_empty() {
            let regions = root.add_child("pwg:ScanRegions");
            for region in &self.regions {
                let r = regions.add_child("pwg:ScanRegion");
                r.add_text_child("pwg:ContentRegionUnits", &region.units);
                r.add_text_child("pwg:Height", &region.height.to_string());
                r.add_text_child("pwg:Width", &region.width.to_string());
                r.add_text_child("pwg:XOffset", &region.x_offset.to_string());
                r.add_text_child("pwg:YOffset", &region.y_offset.to_string());
            }
        }
        root.add_text_child("pwg:DocumentFormat", &self.document_format);
        root.add_text_child("scan:ColorMode", self.color_mode.name());
        root.add_text_child("pwg:InputSource", &self.input_source);
        root.add_text_child("scan:XResolution", &self.x_resolution.to_string());
        root.add_text_child("scan:YResolution", &self.y_resolution.to_string());
        root.serialize()
    }
}

/// Generates responses to eSCL requests and owns the scan-job table.
#[derive(Debug)]
pub struct EsclManager {
    capabilities: ScannerCapabilities,
    status: ScannerStatus,
}

impl EsclManager {
    pub fn new(capabilities: ScannerCapabilities) -> Self {
        Self {
            capabilities,
            status: ScannerStatus {
                idle: true,
                jobs: BTreeMap::new(),
            },
        }
    }

    /// Routes a request under `/eSCL`. Anything unrecognized is 404.
    pub fn handle_request(&mut self, request: &HttpRequest, body: &Buffer) -> HttpResponse {
        let path = request.uri.as_str();
        match (request.method.as_str(), path) {
            ("GET", "/eSCL/ScannerCapabilities") => {
                xml_response(self.capabilities.to_xml())
            }
            ("GET", "/eSCL/ScannerStatus") => xml_response(self.status.to_xml()),
            ("POST", "/eSCL/ScanJobs") => self.create_job(body),
            ("GET", _) => match parse_job_uri(path, "/NextDocument") {
                Some(uuid) => self.next_document(uuid),
                None => HttpResponse::not_found(),
            },
            ("DELETE", _) => match parse_job_uri(path, "") {
                Some(uuid) => self.delete_job(uuid),
                None => HttpResponse::not_found(),
            },
            _ => {
                log::error!(
                    "unhandled eSCL request {} {}",
                    request.method,
                    request.uri
                );
                HttpResponse::not_found()
            }
        }
    }

    fn create_job(&mut self, body: &Buffer) -> HttpResponse {
        let Some(settings) = ScanSettings::from_xml(body.data()) else {
            log::error!("POST /eSCL/ScanJobs body is not a valid ScanSettings");
            return HttpResponse::bad_request();
        };
        let uuid = Uuid::new_v4();
        self.status.jobs.insert(
            uuid,
            JobInfo {
                state: JobState::Pending,
                created: Instant::now(),
                format: settings.document_format,
            },
        );
        log::info!("created scan job {}", uuid);
        let mut response = HttpResponse::created();
        response
            .headers
            .insert("Location".to_string(), format!("/eSCL/ScanJobs/{}", uuid));
        response
    }

    /// Serves the job's document exactly once: the first fetch returns
    /// the placeholder and completes the job, any further fetch is 404.
    fn next_document(&mut self, uuid: Uuid) -> HttpResponse {
        match self.status.jobs.get_mut(&uuid) {
            Some(job) if job.state == JobState::Pending => {
                job.state = JobState::Completed;
                let mut response = HttpResponse::ok();
                response
                    .headers
                    .insert("Content-Type".to_string(), job.format.clone());
                response.body.add_bytes(PLACEHOLDER_DOCUMENT);
                response
            }
            _ => HttpResponse::not_found(),
        }
    }

    fn delete_job(&mut self, uuid: Uuid) -> HttpResponse {
        match self.status.jobs.get_mut(&uuid) {
            Some(job) => {
                job.state = JobState::Canceled;
                log::info!("canceled scan job {}", uuid);
                HttpResponse::ok()
            }
            None => HttpResponse::not_found(),
        }
    }

    #[cfg(test)]
    pub(crate) fn job_state(&self, uuid: Uuid) -> Option<JobState> {
        self.status.jobs.get(&uuid).map(|j| j.state)
    }
}

fn xml_response(body: Vec<u8>) -> HttpResponse {
    let mut response = HttpResponse::ok();
    response
        .headers
        .insert("Content-Type".to_string(), "text/xml".to_string());
    response.body.add_bytes(&body);
    response
}

/// Extracts the job UUID from `/eSCL/ScanJobs/<uuid><suffix>`.
fn parse_job_uri(path: &str, suffix: &str) -> Option<Uuid> {
    let rest = path.strip_prefix("/eSCL/ScanJobs/")?;
    let id = rest.strip_suffix(suffix)?;
    Uuid::parse_str(id).ok()
}

#[cfg(test)]
#[path = "tests/escl.rs"]
mod tests;
