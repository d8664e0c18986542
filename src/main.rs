use clap::{Args, Parser, Subcommand};
use irblaster_console::commands::{PayloadError, PayloadFormat, Preset};
use irblaster_console::config::{import_legacy, Config, ConfigLoader, LogFormat, LoggingConfig};
use irblaster_console::error::AppResult;
use irblaster_console::poller::{ConsolePrinter, OutputFormat};
use irblaster_console::port::list_ports;
use irblaster_console::service::{ConsoleService, StatusResult};
use irblaster_console::ConfigError;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::{self, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "irblaster-console",
    version,
    about = "Serial console for IR blaster microcontrollers.",
    long_about = "Opens the blaster's serial port, prints every line it sends, answers its ready marker automatically and sends preset or typed commands."
)]
struct Cli {
    /// Configuration file to use instead of the standard locations.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the serial ports present on this machine.
    Ports {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Open a port and print received lines; type to send.
    Monitor {
        #[command(flatten)]
        line: LineArgs,

        /// How received lines are printed.
        #[arg(short, long, value_enum)]
        output: Option<OutputFormat>,

        /// Prefix each line with the local time.
        #[arg(long)]
        timestamps: bool,

        /// Do not answer the ready marker.
        #[arg(long)]
        no_auto_response: bool,
    },
    /// Send one command, print replies for a while, then close.
    Send {
        #[command(flatten)]
        line: LineArgs,

        /// A preset from the command panel.
        #[arg(long, value_enum, conflicts_with = "text", required_unless_present = "text")]
        preset: Option<Preset>,

        /// Free-form payload.
        #[arg(long)]
        text: Option<String>,

        /// Encoding of `--text`.
        #[arg(long, value_enum, default_value_t = PayloadFormat::String)]
        format: PayloadFormat,

        /// Do not append CRLF to `--text` in string format.
        #[arg(long)]
        no_crlf: bool,

        /// How long to print replies, in milliseconds.
        #[arg(long, default_value_t = 1000)]
        listen_ms: u64,
    },
    /// Inspect and persist settings.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Line settings shared by commands that open a port.
#[derive(Args, Debug)]
struct LineArgs {
    /// Port name or alias; falls back to `serial.port`.
    port: Option<String>,

    /// Override the configured baud rate.
    #[arg(short, long)]
    baud: Option<u32>,

    /// Override the per-read timeout.
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl LineArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.serial.timeout_ms = timeout_ms;
        }
    }
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Write the effective configuration to disk.
    Save {
        /// Destination; defaults to the resolved or platform config file.
        path: Option<PathBuf>,
    },
    /// Print the default configuration, optionally writing it out.
    Defaults {
        #[arg(long)]
        write: bool,
    },
    /// Convert an old four-line settings.txt.
    ImportLegacy {
        #[arg(default_value = "settings.txt")]
        path: PathBuf,

        /// Save the result instead of only printing it.
        #[arg(long)]
        save: bool,
    },
}

/// Console input, read on its own thread so the poll loop never blocks on stdin.
#[derive(Debug)]
enum Input {
    Preset(Preset),
    Text(String),
    Clear,
    Status,
    Help,
    Quit,
}

impl Input {
    fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        let input = match trimmed {
            "" => return None,
            "/prd" => Self::Preset(Preset::ProductInfo),
            "/fwv" => Self::Preset(Preset::FirmwareVersion),
            "/irlib" => Self::Preset(Preset::SetIrLibrary),
            "/clear" => Self::Clear,
            "/status" => Self::Status,
            "/help" => Self::Help,
            "/quit" | "/exit" => Self::Quit,
            _ => Self::Text(line.trim_end_matches(['\r', '\n']).to_string()),
        };
        Some(input)
    }
}

const HELP: &str = "/prd product info, /fwv firmware version, /irlib set IR library, \
/clear clear transcripts, /status port status, /quit exit; anything else is sent";

// --- Main Application Entry Point ---
fn main() -> ExitCode {
    let cli = Cli::parse();

    let (loader, load_error) = match &cli.config {
        Some(path) => match ConfigLoader::load_from(path) {
            Ok(loader) => (loader, None),
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => match ConfigLoader::load() {
            Ok(loader) => (loader, None),
            Err(e) => (ConfigLoader::with_defaults(), Some(e)),
        },
    };

    init_logging(&loader.config().logging);
    if let Some(e) = load_error {
        warn!(error = %e, "configuration unusable, using defaults");
    }

    match run(cli.command, loader) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    // A subscriber may already be installed; keep the first one.
    let _ = match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
}

fn run(command: Command, mut loader: ConfigLoader) -> AppResult<()> {
    match command {
        Command::Ports { json } => print_ports(json),
        Command::Monitor {
            line,
            output,
            timestamps,
            no_auto_response,
        } => {
            let mut config = loader.into_config();
            line.apply(&mut config);
            if let Some(output) = output {
                config.monitor.output = output;
            }
            config.monitor.show_timestamps |= timestamps;
            if no_auto_response {
                config.monitor.sentinel_response = false;
            }
            config.validate()?;
            monitor(config, line.port.as_deref())
        }
        Command::Send {
            line,
            preset,
            text,
            format,
            no_crlf,
            listen_ms,
        } => {
            let mut config = loader.into_config();
            line.apply(&mut config);
            config.validate()?;
            send_once(
                config,
                line.port.as_deref(),
                preset,
                text,
                format,
                !no_crlf,
                Duration::from_millis(listen_ms),
            )
        }
        Command::Config { action } => run_config(action, &mut loader),
    }
}

fn print_ports(json: bool) -> AppResult<()> {
    let ports = list_ports()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
    } else if ports.is_empty() {
        println!("No serial ports found.");
    } else {
        for port in ports {
            println!("{:<24} {}", port.name, port.kind);
        }
    }
    Ok(())
}

fn printer_for(config: &Config) -> ConsolePrinter<io::Stdout> {
    ConsolePrinter::new(
        io::stdout(),
        config.monitor.output,
        config.monitor.show_timestamps,
    )
}

fn monitor(config: Config, port: Option<&str>) -> AppResult<()> {
    let poll_interval = config.monitor.poll_interval();
    let send_format = config.monitor.send_format;
    let append_crlf = config.monitor.append_crlf;

    let mut service = ConsoleService::new(config);
    let printer = printer_for(service.config());
    service.register_observer("console", printer);

    let opened = service.open(port)?;
    eprintln!(
        "Connected to {} at {} baud. {HELP}",
        opened.port_name, opened.baud_rate
    );

    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("console-input".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if let Some(input) = Input::parse(&line) {
                    if tx.send(input).is_err() {
                        break;
                    }
                }
            }
        })?;

    loop {
        service.tick();

        match rx.try_recv() {
            Ok(Input::Quit) => break,
            Ok(input) => handle_input(&mut service, input, send_format, append_crlf),
            // stdin closed: keep printing until the port goes away
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => {}
        }

        if !service.is_open() {
            service.tick();
            if let StatusResult::Closed {
                last_fault: Some(fault),
            } = service.status()
            {
                eprintln!("Port closed: {fault}");
            }
            break;
        }

        service.wait_for_lines(poll_interval);
    }

    let closed = service.close()?;
    info!(message = %closed.message, "monitor finished");
    Ok(())
}

fn handle_input(
    service: &mut ConsoleService,
    input: Input,
    send_format: PayloadFormat,
    append_crlf: bool,
) {
    let outcome = match input {
        Input::Preset(preset) => service.send_preset(preset).map(|_| ()),
        Input::Text(text) => service
            .send_text(&text, send_format, append_crlf)
            .map(|_| ()),
        Input::Clear => {
            service.clear_transcripts();
            eprintln!("Transcripts cleared.");
            return;
        }
        Input::Status => {
            match serde_json::to_string(&service.status()) {
                Ok(json) => eprintln!("{json}"),
                Err(e) => warn!(error = %e, "could not render status"),
            }
            return;
        }
        Input::Help => {
            eprintln!("{HELP}");
            return;
        }
        Input::Quit => return,
    };

    match outcome {
        Ok(()) => {
            if let Some(sent) = service.sent().lines().last() {
                eprintln!("{sent}");
            }
        }
        Err(e) => eprintln!("error: {e}"),
    }
}

enum Outgoing {
    Preset(Preset),
    Text(String),
}

fn send_once(
    config: Config,
    port: Option<&str>,
    preset: Option<Preset>,
    text: Option<String>,
    format: PayloadFormat,
    append_crlf: bool,
    listen: Duration,
) -> AppResult<()> {
    let outgoing = match (preset, text) {
        (Some(preset), _) => Outgoing::Preset(preset),
        (None, Some(text)) => Outgoing::Text(text),
        (None, None) => return Err(PayloadError::Empty.into()),
    };

    let poll_interval = config.monitor.poll_interval();
    let mut service = ConsoleService::new(config);
    let printer = printer_for(service.config());
    service.register_observer("console", printer);
    service.open(port)?;

    let written = match outgoing {
        Outgoing::Preset(preset) => service.send_preset(preset)?,
        Outgoing::Text(text) => service.send_text(&text, format, append_crlf)?,
    };
    if let Some(sent) = service.sent().lines().last() {
        eprintln!("{sent}");
    }
    info!(bytes = written.bytes_written, "payload sent");

    let deadline = Instant::now() + listen;
    while Instant::now() < deadline && service.is_open() {
        service.wait_for_lines(poll_interval);
        service.tick();
    }
    service.tick();
    service.close()?;
    Ok(())
}

fn run_config(action: ConfigAction, loader: &mut ConfigLoader) -> AppResult<()> {
    match action {
        ConfigAction::Show => {
            match &loader.config_path {
                Some(path) => eprintln!("# from {}", path.display()),
                None => eprintln!("# built-in defaults"),
            }
            print!("{}", to_toml(loader.config())?);
        }
        ConfigAction::Save { path } => {
            let written = match path {
                Some(path) => {
                    loader.save_to(&path)?;
                    path
                }
                None => loader.save()?,
            };
            println!("Settings saved to {}", written.display());
        }
        ConfigAction::Defaults { write } => {
            *loader.config_mut() = Config::default();
            print!("{}", to_toml(loader.config())?);
            if write {
                let written = loader.save()?;
                eprintln!("Defaults written to {}", written.display());
            }
        }
        ConfigAction::ImportLegacy { path, save } => {
            let imported = import_legacy(&path)?;
            let serial = &mut loader.config_mut().serial;
            serial.baud_rate = imported.baud_rate;
            serial.data_bits = imported.data_bits;
            serial.stop_bits = imported.stop_bits;
            serial.parity = imported.parity;

            print!("{}", to_toml(loader.config())?);
            if save {
                let written = loader.save()?;
                eprintln!("Imported settings written to {}", written.display());
            }
        }
    }
    Ok(())
}

fn to_toml(config: &Config) -> AppResult<String> {
    Ok(toml::to_string_pretty(config).map_err(ConfigError::from)?)
}
