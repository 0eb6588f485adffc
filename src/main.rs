use anyhow::{Context, Result};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use dialpad_softphone::commands::DialpadCommand;
use dialpad_softphone::device::simulated::Simulator;
use dialpad_softphone::view::terminal::{TerminalInput, HELP};
use dialpad_softphone::view::TerminalView;
use dialpad_softphone::{CredentialProvider, DeviceController, MediaBackend, MemoryAddressBar, SoftphoneConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let config = SoftphoneConfig::load().context("Failed to load configuration")?;
    info!("Starting softphone for {}", config.page_url);

    let address_bar = MemoryAddressBar::new(config.page_url()?);
    let credentials = CredentialProvider::new(Box::new(address_bar), &config.token_path, config.request_timeout)
        .context("Failed to create token client")?;

    let simulator = Simulator::new();
    let media = media_backend(&simulator);

    let mut controller = DeviceController::new(
        &config,
        Box::new(simulator.factory()),
        Box::new(credentials),
        media,
        Box::new(TerminalView::new()),
    );

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let input = tokio::spawn(read_terminal(command_tx, simulator));

    println!("{}", HELP);
    controller.run(command_rx).await;
    input.abort();

    info!("Softphone stopped");
    Ok(())
}

#[cfg(not(feature = "device-cpal"))]
fn media_backend(simulator: &Simulator) -> Box<dyn MediaBackend> {
    Box::new(simulator.media())
}

#[cfg(feature = "device-cpal")]
fn media_backend(simulator: &Simulator) -> Box<dyn MediaBackend> {
    use dialpad_softphone::audio::cpal_backend::{list_cpal_devices, AudioDirection};

    match (
        list_cpal_devices(AudioDirection::Input),
        list_cpal_devices(AudioDirection::Output),
    ) {
        (Ok(inputs), Ok(outputs)) => {
            simulator.set_inputs(inputs);
            simulator.set_outputs(outputs);
        }
        (Err(e), _) | (_, Err(e)) => warn!("Could not enumerate host audio devices: {}", e),
    }
    Box::new(dialpad_softphone::audio::CpalMediaBackend::new())
}

/// Turn terminal lines into dialpad commands and simulator events
async fn read_terminal(commands: mpsc::UnboundedSender<DialpadCommand>, simulator: Simulator) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => break,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read terminal input: {}", e);
                break;
            }
        };

        match TerminalInput::parse(&line) {
            TerminalInput::Dialpad(batch) => {
                for command in batch {
                    if commands.send(command).is_err() {
                        return;
                    }
                }
            }
            TerminalInput::Simulator(command) => {
                if !command.apply(&simulator) {
                    println!("No live device to receive {:?}", command);
                }
            }
            TerminalInput::Help => println!("{}", HELP),
            TerminalInput::Quit => break,
            TerminalInput::Unknown(line) => println!("Unknown command: {} (type help)", line),
        }
    }
}
