use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use usbip_printer::config;
use usbip_printer::escl::EsclManager;
use usbip_printer::ipp_service::IppManager;
use usbip_printer::printer::UsbPrinter;
use usbip_printer::server::Server;
use usbip_printer::sink::DocumentSink;

/// A virtual IPP-over-USB printer and eSCL scanner, exported over USB/IP.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Path to the descriptors JSON file.
    #[arg(long = "descriptors_path")]
    descriptors_path: PathBuf,

    /// Path of a file to record received documents to (append mode).
    #[arg(long = "record_doc_path")]
    record_doc_path: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let config = match config::load(&args.descriptors_path) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let sink = args.record_doc_path.map(DocumentSink::new);
    let printer = UsbPrinter::new(
        config.descriptors,
        IppManager::new(config.attributes, sink.clone()),
        EsclManager::new(config.capabilities),
        sink,
    );

    let mut server = match Server::new(printer) {
        Ok(server) => server,
        Err(e) => {
            log::error!("failed to listen: {}", e);
            return ExitCode::FAILURE;
        }
    };
    match server.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("server failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
