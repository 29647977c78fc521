use clap::Parser;
use serial_frames::config::{Config, ConfigLoader};
use serial_frames::logging::init_logging;
use serial_frames::{FrameDecoder, Handlers, SerialTransport};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Opens a serial port, decodes incoming command frames and periodically sends a line.",
    long_about = "Opens a serial port with a background receiver that decodes 4-byte \
                  magic-prefixed command frames and logs each command. Optionally writes \
                  a CR-terminated line at a fixed interval."
)]
struct Args {
    /// Path to a configuration file (overrides the usual lookup).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port number, appended to the configured device prefix.
    #[arg(short, long)]
    port: Option<u32>,

    /// Baud rate.
    #[arg(short, long)]
    baud: Option<u32>,

    /// Per-operation timeout in milliseconds (at most 15000).
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Line to send each interval; a trailing CR is added if missing.
    #[arg(short, long)]
    send: Option<String>,

    /// Milliseconds between sends.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Number of lines to send, 0 to send until interrupted.
    #[arg(long, default_value_t = 0)]
    count: u64,
}

fn load_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let loader = match args.config {
        Some(ref path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    let mut config = loader.into_config();

    if let Some(port) = args.port {
        config.serial.port_number = port;
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.serial.timeout_ms = timeout_ms;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_logging(&config.logging);

    let decoder = FrameDecoder::with_magic(config.framing.magic_byte).on_command(|command| {
        info!(
            command = command.command,
            param1 = command.param1,
            param2 = command.param2,
            "command received"
        );
    });
    let handlers = Handlers::new()
        .on_data_received(decoder.into_data_handler())
        .on_data_sent(|| debug!("data sent"));

    let transport = SerialTransport::from_config(&config.serial);
    transport.open_async(
        config.serial.port_number,
        config.serial.baud_rate,
        handlers,
        config.serial.timeout(),
    )?;

    let interval = Duration::from_millis(args.interval_ms);
    let mut sent = 0u64;
    while args.count == 0 || sent < args.count {
        if let Some(ref line) = args.send {
            let n = transport.write_line(line);
            if n == 0 {
                warn!(line = %line, "nothing written");
            }
        }
        sent += 1;
        thread::sleep(interval);
    }

    transport.close()?;
    Ok(())
}
