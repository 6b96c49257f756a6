use color_eyre::{eyre::eyre, Result};
use snespad::bus::{PadIo, RppalIo, SimDevice, SimulatedBus};
use snespad::config::{Backend, PadConfig};
use snespad::pad::{KeyEvent, PadHandle, PadReport, ScancodeDecoder};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SNESPAD_CONFIG").ok())
        .map(PathBuf::from);
    let config = PadConfig::load_or_default(config_path.as_deref()).await?;
    info!("Using config: {:?}", config);

    let io: Box<dyn PadIo + Send> = match config.backend {
        Backend::Gpio => Box::new(RppalIo::new().map_err(|e| eyre!("Failed to open GPIO: {}", e))?),
        Backend::Simulated => {
            info!("Running against a simulated SNES pad");
            Box::new(SimulatedBus::with_device(
                config.pins,
                SimDevice::Controller { pressed: 0 },
            ))
        }
    };

    let (scancode_sender, mut scancode_receiver) = mpsc::channel(1000);
    let handle = PadHandle::spawn(&config, io, scancode_sender)
        .map_err(|e| eyre!("Failed to spawn pad poller: {}", e))?;
    let mut receiver = handle.subscribe();
    let mut decoder = ScancodeDecoder::new();

    loop {
        tokio::select! {
            changed = receiver.changed() => {
                if changed.is_err() {
                    warn!("Pad poller stopped");
                    break;
                }
                let snapshot = receiver.borrow_and_update().clone();
                log_report(&snapshot.report);
            }
            Some(scancodes) = scancode_receiver.recv() => {
                log_scancodes(&scancodes, &mut decoder);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received");
                break;
            }
        }
    }

    // a full scancode channel would keep the poller from seeing Shutdown
    drop(scancode_receiver);
    handle
        .shutdown()
        .await
        .map_err(|e| eyre!("Failed to stop pad poller: {}", e))?;
    Ok(())
}

fn log_report(report: &PadReport) {
    match report {
        PadReport::None => info!("No device"),
        PadReport::Controller(state) => info!("SNES pad: {:?}", state),
        PadReport::Nes(state) => info!("NES pad: {:?}", state),
        PadReport::Mouse(mouse) => info!(
            "Mouse: x={} y={} primary={} secondary={} speed={:?}",
            mouse.x, mouse.y, mouse.primary, mouse.secondary, mouse.speed
        ),
        PadReport::Keyboard { .. } => info!("XBAND keyboard"),
    }
}

fn log_scancodes(scancodes: &[u8], decoder: &mut ScancodeDecoder) {
    debug!("Scancodes: {:02X?}", scancodes);
    for event in decoder.feed_all(scancodes) {
        match event {
            KeyEvent::Pressed(key) => info!("Key pressed: {}", key.name),
            KeyEvent::Released(key) => info!("Key released: {}", key.name),
        }
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
