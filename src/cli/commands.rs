// CLI command execution
use std::process::ExitCode;

use crate::cli::args::Args;
use crate::cli::output::RawGuard;
use crate::core::session::Session;
use crate::domain::error::TermLinkResult;
use crate::domain::options::Options;
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::discovery;

/// Top-level driver: resolve options, run the session, consume the
/// last-error slots once the terminal is restored.
pub fn execute(args: Args) -> ExitCode {
    if args.list_devices {
        return list_devices(args.device.as_deref());
    }

    let options = match resolve_options(args) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let no_autoconnect = options.no_autoconnect;
    let interactive = options.interactive;

    let mut session = match Session::new(options) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let raw_guard = if interactive {
        match RawGuard::enable() {
            Ok(guard) => Some(guard),
            Err(err) => {
                eprintln!("Error: {err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        None
    };

    let result = session.run();
    if let Err(err) = &result {
        session.errors_mut().record_loud(err.to_string());
    }
    let exit_message = session
        .errors()
        .exit_message(no_autoconnect)
        .map(str::to_owned);

    // Close the device and leave raw mode before reporting anything.
    drop(session);
    drop(raw_guard);

    match exit_message {
        Some(message) => {
            eprintln!("Error: {message}");
            ExitCode::FAILURE
        }
        None => ExitCode::SUCCESS,
    }
}

fn list_devices(filter: Option<&str>) -> ExitCode {
    match discovery::serial_devices(filter) {
        Ok(devices) => {
            for device in devices {
                println!("{device}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn resolve_options(args: Args) -> TermLinkResult<Options> {
    let manager = ConfigManager::new(args.config.clone());
    let (file_config, source) = manager.load()?;
    args.resolve(file_config, source)
}
