use super::*;
use crate::xml::Element;

fn capabilities() -> ScannerCapabilities {
    ScannerCapabilities {
        make_and_model: "Test Make and Model".to_string(),
        serial_number: "Test Serial".to_string(),
        platen: SourceCapabilities {
            color_modes: vec!["RGB24".to_string(), "Grayscale8".to_string()],
            formats: vec!["application/pdf".to_string()],
            resolutions: vec![100, 200, 300],
        },
    }
}

fn get(uri: &str) -> HttpRequest {
    HttpRequest {
        method: "GET".to_string(),
        uri: uri.to_string(),
        headers: Default::default(),
    }
}

fn settings_xml() -> Vec<u8> {
    ScanSettings {
        regions: vec![ScanRegion {
            units: "escl:ThreeHundredthsOfInches".to_string(),
            height: 3300,
            width: 2550,
            x_offset: 0,
            y_offset: 0,
        }],
        document_format: "application/pdf".to_string(),
        color_mode: ColorMode::Rgb,
        input_source: "Platen".to_string(),
        x_resolution: 300,
        y_resolution: 300,
    }
    .to_xml()
}

fn post_scan_job(manager: &mut EsclManager) -> HttpResponse {
    let request = HttpRequest {
        method: "POST".to_string(),
        uri: "/eSCL/ScanJobs".to_string(),
        headers: Default::default(),
    };
    let body = Buffer::from_vec(settings_xml());
    manager.handle_request(&request, &body)
}

fn job_uuid(response: &HttpResponse) -> Uuid {
    let location = response.headers.get("Location").unwrap();
    let id = location.strip_prefix("/eSCL/ScanJobs/").unwrap();
    Uuid::parse_str(id).unwrap()
}

#[test]
fn capabilities_xml_structure() {
    let root = Element::parse(&capabilities().to_xml()).unwrap();
    assert_eq!(root.local_name(), "ScannerCapabilities");
    assert_eq!(root.child("Version").unwrap().text, "2.63");
    assert_eq!(
        root.child("MakeAndModel").unwrap().text,
        "Test Make and Model"
    );
    assert_eq!(root.child("SerialNumber").unwrap().text, "Test Serial");

    let caps = root
        .child("Platen")
        .unwrap()
        .child("PlatenInputCaps")
        .unwrap();
    assert_eq!(caps.child("MinWidth").unwrap().text, "16");
    assert_eq!(caps.child("MaxWidth").unwrap().text, "2550");
    assert_eq!(caps.child("MinHeight").unwrap().text, "16");
    assert_eq!(caps.child("MaxHeight").unwrap().text, "3507");
    assert_eq!(caps.child("MaxScanRegions").unwrap().text, "1");

    let profile = caps
        .child("SettingProfiles")
        .unwrap()
        .child("SettingProfile")
        .unwrap();
    let modes: Vec<&str> = profile
        .child("ColorModes")
        .unwrap()
        .children_named("ColorMode")
        .map(|c| c.text.as_str())
        .collect();
    assert_eq!(modes, ["RGB24", "Grayscale8"]);
    let formats: Vec<&str> = profile
        .child("DocumentFormats")
        .unwrap()
        .children_named("DocumentFormat")
        .map(|c| c.text.as_str())
        .collect();
    assert_eq!(formats, ["application/pdf"]);
    let resolutions: Vec<&str> = profile
        .child("SupportedResolutions")
        .unwrap()
        .child("DiscreteResolutions")
        .unwrap()
        .children_named("DiscreteResolution")
        .map(|r| r.child("XResolution").unwrap().text.as_str())
        .collect();
    assert_eq!(resolutions, ["100", "200", "300"]);

    let intents: Vec<&str> = caps
        .child("SupportedIntents")
        .unwrap()
        .children_named("Intent")
        .map(|c| c.text.as_str())
        .collect();
    assert_eq!(intents, ["Document", "TextAndGraphic", "Photo", "Preview"]);
    assert_eq!(caps.child("MaxOpticalXResolution").unwrap().text, "2400");
    assert_eq!(caps.child("RiskyBottomMargin").unwrap().text, "0");
}

#[test]
fn status_xml_for_idle_scanner_without_jobs() {
    let status = ScannerStatus {
        idle: true,
        jobs: Default::default(),
    };
    let root = Element::parse(&status.to_xml()).unwrap();
    assert_eq!(root.local_name(), "ScannerStatus");
    assert_eq!(root.child("Version").unwrap().text, "2.6.3");
    assert_eq!(root.child("State").unwrap().text, "Idle");
    assert_eq!(root.child("Jobs").unwrap().children.len(), 0);
}

#[test]
fn status_xml_reports_job_states() {
    let mut jobs = std::collections::BTreeMap::new();
    let pending = Uuid::new_v4();
    jobs.insert(
        pending,
        JobInfo {
            state: JobState::Pending,
            created: Instant::now(),
            format: "application/pdf".to_string(),
        },
    );
    let status = ScannerStatus { idle: false, jobs };
    let root = Element::parse(&status.to_xml()).unwrap();
    assert_eq!(root.child("State").unwrap().text, "Busy");

    let job = root.child("Jobs").unwrap().child("JobInfo").unwrap();
    assert_eq!(
        job.child("JobUri").unwrap().text,
        format!("/eSCL/ScanJobs/{}", pending)
    );
    assert_eq!(
        job.child("JobUuid").unwrap().text,
        format!("urn:uuid:{}", pending)
    );
    assert_eq!(job.child("ImagesCompleted").unwrap().text, "1");
    assert_eq!(job.child("ImagesToTransfer").unwrap().text, "1");
    assert_eq!(job.child("JobState").unwrap().text, "Pending");
    assert_eq!(
        job.child("JobStateReasons")
            .unwrap()
            .child("JobStateReason")
            .unwrap()
            .text,
        "JobScanning"
    );
}

#[test]
fn scan_settings_round_trip() {
    let xml = settings_xml();
    let parsed = ScanSettings::from_xml(&xml).unwrap();
    assert_eq!(parsed.regions.len(), 1);
    assert_eq!(parsed.regions[0].height, 3300);
    assert_eq!(parsed.regions[0].width, 2550);
    assert_eq!(parsed.regions[0].units, "escl:ThreeHundredthsOfInches");
    assert_eq!(parsed.document_format, "application/pdf");
    assert_eq!(parsed.color_mode, ColorMode::Rgb);
    assert_eq!(parsed.input_source, "Platen");
    assert_eq!(parsed.x_resolution, 300);
    assert_eq!(parsed.y_resolution, 300);
    // Full structural round trip.
    assert_eq!(ScanSettings::from_xml(&parsed.to_xml()).unwrap(), parsed);
}

#[test]
fn scan_settings_rejects_unknown_color_mode() {
    let xml = b"<scan:ScanSettings xmlns:scan=\"urn:s\">\
<scan:ColorMode>Sepia</scan:ColorMode></scan:ScanSettings>";
    assert!(ScanSettings::from_xml(xml).is_none());
}

#[test]
fn scan_settings_rejects_malformed_resolution() {
    let xml = b"<scan:ScanSettings xmlns:scan=\"urn:s\">\
<scan:XResolution>dpi</scan:XResolution></scan:ScanSettings>";
    assert!(ScanSettings::from_xml(xml).is_none());
}

#[test]
fn scan_settings_rejects_non_xml() {
    assert!(ScanSettings::from_xml(b"not xml at all").is_none());
}

#[test]
fn scan_settings_defaults_missing_fields() {
    let settings = ScanSettings::from_xml(b"<scan:ScanSettings/>").unwrap();
    assert_eq!(settings, ScanSettings::default());
}

#[test]
fn serves_capabilities() {
    let mut manager = EsclManager::new(capabilities());
    let response =
        manager.handle_request(&get("/eSCL/ScannerCapabilities"), &Buffer::new());
    assert_eq!(response.status, "200 OK");
    assert_eq!(
        response.headers.get("Content-Type").map(String::as_str),
        Some("text/xml")
    );
    let root = Element::parse(response.body.data()).unwrap();
    assert_eq!(
        root.child("MakeAndModel").unwrap().text,
        "Test Make and Model"
    );
}

#[test]
fn creates_scan_job() {
    let mut manager = EsclManager::new(capabilities());
    let response = post_scan_job(&mut manager);
    assert_eq!(response.status, "201 Created");
    let uuid = job_uuid(&response);
    assert_eq!(manager.job_state(uuid), Some(JobState::Pending));

    // The new job shows up in ScannerStatus as Pending.
    let status = manager.handle_request(&get("/eSCL/ScannerStatus"), &Buffer::new());
    let root = Element::parse(status.body.data()).unwrap();
    let job = root.child("Jobs").unwrap().child("JobInfo").unwrap();
    assert_eq!(
        job.child("JobUri").unwrap().text,
        format!("/eSCL/ScanJobs/{}", uuid)
    );
    assert_eq!(job.child("JobState").unwrap().text, "Pending");
}

#[test]
fn rejects_invalid_scan_settings() {
    let mut manager = EsclManager::new(capabilities());
    let request = HttpRequest {
        method: "POST".to_string(),
        uri: "/eSCL/ScanJobs".to_string(),
        headers: Default::default(),
    };
    let body = Buffer::from(&b"<bad"[..]);
    let response = manager.handle_request(&request, &body);
    assert_eq!(response.status, "400 Bad Request");
}

#[test]
fn next_document_is_one_shot() {
    let mut manager = EsclManager::new(capabilities());
    let uuid = job_uuid(&post_scan_job(&mut manager));

    let uri = format!("/eSCL/ScanJobs/{}/NextDocument", uuid);
    let first = manager.handle_request(&get(&uri), &Buffer::new());
    assert_eq!(first.status, "200 OK");
    assert_eq!(
        first.headers.get("Content-Type").map(String::as_str),
        Some("application/pdf")
    );
    assert_eq!(first.body.data(), PLACEHOLDER_DOCUMENT);
    assert_eq!(manager.job_state(uuid), Some(JobState::Completed));

    let second = manager.handle_request(&get(&uri), &Buffer::new());
    assert_eq!(second.status, "404 Not Found");
}

#[test]
fn delete_cancels_job() {
    let mut manager = EsclManager::new(capabilities());
    let uuid = job_uuid(&post_scan_job(&mut manager));

    let request = HttpRequest {
        method: "DELETE".to_string(),
        uri: format!("/eSCL/ScanJobs/{}", uuid),
        headers: Default::default(),
    };
    let response = manager.handle_request(&request, &Buffer::new());
    assert_eq!(response.status, "200 OK");
    assert_eq!(manager.job_state(uuid), Some(JobState::Canceled));

    // Canceled jobs no longer serve documents.
    let fetch = manager.handle_request(
        &get(&format!("/eSCL/ScanJobs/{}/NextDocument", uuid)),
        &Buffer::new(),
    );
    assert_eq!(fetch.status, "404 Not Found");
}

#[test]
fn unknown_uris_are_not_found() {
    let mut manager = EsclManager::new(capabilities());
    assert_eq!(
        manager
            .handle_request(&get("/eSCL/Nonexistent"), &Buffer::new())
            .status,
        "404 Not Found"
    );
    assert_eq!(
        manager
            .handle_request(&get("/eSCL/ScanJobs/not-a-uuid/NextDocument"), &Buffer::new())
            .status,
        "404 Not Found"
    );
    let request = HttpRequest {
        method: "DELETE".to_string(),
        uri: "/eSCL/ScanJobs/not-a-uuid".to_string(),
        headers: Default::default(),
    };
    assert_eq!(
        manager.handle_request(&request, &Buffer::new()).status,
        "404 Not Found"
    );
}
