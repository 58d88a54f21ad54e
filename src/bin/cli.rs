use percipio_camera::testing::SimulatedSdk;
use percipio_camera::{
    CameraError, CapturedImage, DeviceSdk, PercipioCamera, PercipioCameraConfig, StreamKind,
};
use serde::Serialize;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Serialize)]
struct FrameSummary {
    kind: StreamKind,
    sequence: u64,
    timestamp_us: u64,
    width: u32,
    height: u32,
}

impl From<&CapturedImage> for FrameSummary {
    fn from(image: &CapturedImage) -> Self {
        let (width, height) = image.dimensions();
        let timestamp_us = match image {
            CapturedImage::Color(f) => f.timestamp_us,
            CapturedImage::Depth(f) => f.timestamp_us,
        };
        Self {
            kind: image.kind(),
            sequence: image.sequence(),
            timestamp_us,
            width,
            height,
        }
    }
}

struct Options {
    json: bool,
    depth: bool,
    frames: u32,
    timeout_ms: u64,
    config: PercipioCameraConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: percipio-cli <list-devices|capture|stream> [--json] [--depth] [--frames <n>] [--timeout <ms>] [--config <path>]");
        std::process::exit(1);
    }

    // No vendor binding is linked into this binary; drive the simulated device.
    let sdk: Arc<dyn DeviceSdk> = Arc::new(SimulatedSdk::new());
    let options = parse_options(&args[2..])?;

    let command = &args[1];
    match command.as_str() {
        "list-devices" => cmd_list_devices(sdk.as_ref(), &options),
        "capture" => cmd_capture(sdk, options),
        "stream" => cmd_stream(sdk, options),
        _ => {
            eprintln!("Unknown command: {}", command);
            std::process::exit(1);
        }
    }
}

fn parse_options(args: &[String]) -> Result<Options, Box<dyn std::error::Error>> {
    let mut options = Options {
        json: false,
        depth: false,
        frames: 10,
        timeout_ms: 200,
        config: PercipioCameraConfig::default(),
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--json" => options.json = true,
            "--depth" => options.depth = true,
            "--frames" => {
                i += 1;
                options.frames = args.get(i).ok_or("--frames needs a value")?.parse()?;
            }
            "--timeout" => {
                i += 1;
                options.timeout_ms = args.get(i).ok_or("--timeout needs a value")?.parse()?;
            }
            "--config" => {
                i += 1;
                let path = args.get(i).ok_or("--config needs a path")?;
                options.config = PercipioCameraConfig::load_from_file(path)?;
            }
            other => return Err(format!("unknown option: {other}").into()),
        }
        i += 1;
    }

    if options.depth && !options.config.use_depth {
        options.config = options.config.with_depth();
    }
    Ok(options)
}

fn cmd_list_devices(sdk: &dyn DeviceSdk, options: &Options) -> Result<(), Box<dyn std::error::Error>> {
    let devices = PercipioCamera::find_cameras(sdk)?;
    if options.json {
        println!("{}", serde_json::to_string(&devices)?);
    } else {
        for (idx, d) in devices.iter().enumerate() {
            println!(
                "{} -- {}\t{}\t{} {} (hw {}, fw {})",
                idx, d.id, d.interface_id, d.vendor_name, d.model_name, d.hardware_version, d.firmware_version
            );
        }
    }
    Ok(())
}

fn cmd_capture(sdk: Arc<dyn DeviceSdk>, options: Options) -> Result<(), Box<dyn std::error::Error>> {
    let mut camera = PercipioCamera::new(options.config.clone(), sdk)?;
    camera.connect(true)?;

    let mut images = Vec::new();
    if let Some(frame) = camera.read(None, options.timeout_ms)? {
        images.push(CapturedImage::Color(frame));
    }
    if options.depth {
        if let Some(depth) = camera.read_depth(options.timeout_ms)? {
            images.push(CapturedImage::Depth(depth));
        }
    }

    for image in &images {
        print_frame(image, options.json)?;
    }
    if images.is_empty() {
        println!("No frame in batch");
    }

    camera.disconnect()?;
    Ok(())
}

fn cmd_stream(sdk: Arc<dyn DeviceSdk>, options: Options) -> Result<(), Box<dyn std::error::Error>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))?;

    let mut camera = PercipioCamera::new(options.config.clone(), sdk)?;
    camera.connect(true)?;

    let mut received = 0;
    while running.load(Ordering::SeqCst) && received < options.frames {
        match camera.async_read(options.timeout_ms) {
            Ok(frame) => {
                received += 1;
                print_frame(&CapturedImage::Color(frame), options.json)?;
            }
            Err(e @ CameraError::Timeout { .. }) => {
                if !options.json {
                    println!("{}", e);
                }
            }
            Err(e) => {
                let _ = camera.disconnect();
                return Err(e.into());
            }
        }
    }

    let stats = camera.capture_stats();
    camera.disconnect()?;
    if !options.json {
        println!(
            "Received {} frames ({} published, {} soft misses, {} errors)",
            received, stats.frames_published, stats.soft_misses, stats.errors
        );
    }
    Ok(())
}

fn print_frame(image: &CapturedImage, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let summary = FrameSummary::from(image);
    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!(
            "Frame: {} {}x{} seq:{} t:{}us",
            summary.kind, summary.width, summary.height, summary.sequence, summary.timestamp_us
        );
    }
    Ok(())
}
