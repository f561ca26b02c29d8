//! Line-oriented shell over a [`SessionFacade`].
//!
//! Every line read from stdin is routed to the facade. Output of the bridge
//! session streams to stdout as the tail changes; results of tagged commands
//! are printed as JSON once they complete.

use crate::error::DevbridgeError;

use session_core::correlator::{RequestHandle, RequestOutcome};
use session_core::error::correlator::CorrelatorError;
use session_core::output::TailSnapshot;
use session_core::session::SessionFacade;

use std::io::Write;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const EXTERNAL_PREFIX: &str = "adb";

/// What a line typed at the prompt asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellInput {
    Empty,
    Exit,
    Clear,
    /// `adb <args>`: run through the external client, untagged.
    External(Vec<String>),
    Devices,
    Processes,
    Packages,
    /// Show the bridge server on the port and whether we started it.
    Server,
    Kill(String),
    /// `select` alone clears the selection.
    Select(Option<String>),
    /// `apps [filter]`, optionally `--all` to include system apps.
    Apps { filter: String, hide_system: bool },
    /// Written to the interactive bridge shell as-is.
    Raw(String),
    Usage(&'static str),
}

impl ShellInput {
    pub fn parse_line(line: &str) -> Self {
        let trimmed = line.trim();
        let mut words = trimmed.split_whitespace();
        let Some(head) = words.next() else {
            return ShellInput::Empty;
        };
        let rest: Vec<String> = words.map(String::from).collect();

        match head {
            "exit" | "quit" if rest.is_empty() => ShellInput::Exit,
            "clear" if rest.is_empty() => ShellInput::Clear,
            "devices" if rest.is_empty() => ShellInput::Devices,
            "ps" if rest.is_empty() => ShellInput::Processes,
            "pm" if rest.is_empty() => ShellInput::Packages,
            "server" if rest.is_empty() => ShellInput::Server,
            EXTERNAL_PREFIX if rest.is_empty() => ShellInput::Usage("usage: adb <args>"),
            EXTERNAL_PREFIX => ShellInput::External(rest),
            "kill" => match rest.as_slice() {
                [package] => ShellInput::Kill(package.clone()),
                _ => ShellInput::Usage("usage: kill <package>"),
            },
            "select" => match rest.as_slice() {
                [] => ShellInput::Select(None),
                [serial] => ShellInput::Select(Some(serial.clone())),
                _ => ShellInput::Usage("usage: select [serial]"),
            },
            "apps" => {
                let hide_system = !rest.iter().any(|w| w == "--all");
                let filter = rest
                    .iter()
                    .filter(|w| *w != "--all")
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(" ");
                ShellInput::Apps {
                    filter,
                    hide_system,
                }
            }
            _ => ShellInput::Raw(trimmed.to_string()),
        }
    }
}

/// Part of `current` not yet printed, given the previously printed snapshot.
///
/// A new epoch or a tail that no longer extends the previous one (the window
/// slid past it) means the whole text is new.
pub fn unseen_suffix<'a>(previous: &TailSnapshot, current: &'a TailSnapshot) -> &'a str {
    if previous.epoch == current.epoch && current.text.starts_with(&previous.text) {
        &current.text[previous.text.len()..]
    } else {
        &current.text
    }
}

/// Run the shell until stdin closes or `exit` is typed, then shut the session down.
pub async fn run(facade: Arc<SessionFacade>) -> Result<(), DevbridgeError> {
    let init = facade.initialize_in_background(|started| {
        if started {
            info!("Bridge session ready");
        } else {
            eprintln!("devbridge: bridge server failed to start, see log for details");
        }
    });
    let printer = spawn_output_printer(facade.observe_output());

    let result = read_loop(&facade).await;

    facade.shutdown().await;
    if let Err(e) = init.await {
        warn!("Initialize task ended abnormally: {e}");
    }
    printer.abort();

    result
}

async fn read_loop(facade: &Arc<SessionFacade>) -> Result<(), DevbridgeError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = lines
            .next_line()
            .await
            .map_err(|e| DevbridgeError::devbridge(format!("Failed to read stdin: {e}")))?;
        let Some(line) = line else {
            debug!("stdin closed");
            return Ok(());
        };

        let input = ShellInput::parse_line(&line);
        if input == ShellInput::Exit {
            return Ok(());
        }
        if let Err(e) = dispatch(facade, input).await {
            eprintln!("devbridge: {e}");
        }
    }
}

async fn dispatch(facade: &Arc<SessionFacade>, input: ShellInput) -> Result<(), DevbridgeError> {
    match input {
        ShellInput::Empty | ShellInput::Exit => Ok(()),
        ShellInput::Usage(usage) => {
            eprintln!("{usage}");
            Ok(())
        }
        ShellInput::Clear => facade
            .clear_output()
            .await
            .map_err(|e| DevbridgeError::core("Failed to clear output", e)),
        ShellInput::External(argv) => facade
            .submit(argv, true)
            .await
            .map_err(|e| DevbridgeError::core("Command rejected", e)),
        ShellInput::Devices => report(facade.refresh_devices().await),
        ShellInput::Processes => report(facade.load_processes().await),
        ShellInput::Packages => report(facade.load_packages().await),
        ShellInput::Kill(package) => report(facade.kill_app(&package).await),
        ShellInput::Server => {
            match facade.bridge_server().await {
                Some(server) => print_json(&server),
                None => eprintln!("devbridge: no bridge server found on the port"),
            }
            Ok(())
        }
        ShellInput::Select(serial) => facade
            .select_device(serial)
            .await
            .map_err(|e| DevbridgeError::core("Failed to select device", e)),
        ShellInput::Apps {
            filter,
            hide_system,
        } => {
            let apps = facade.app_processes(&filter, hide_system).await;
            print_json(&apps);
            Ok(())
        }
        ShellInput::Raw(text) => {
            facade
                .echo(&text)
                .await
                .map_err(|e| DevbridgeError::core("Failed to echo input", e))?;
            facade
                .send_raw_input(&text)
                .await
                .map_err(|e| DevbridgeError::core("Failed to send input", e))
        }
    }
}

/// Print the request's result when it arrives without holding up the prompt.
fn report(submitted: Result<RequestHandle, CorrelatorError>) -> Result<(), DevbridgeError> {
    let handle = submitted.map_err(|e| DevbridgeError::core("Command rejected", e))?;
    let tag = handle.tag;

    tokio::spawn(async move {
        match handle.outcome().await {
            Ok(RequestOutcome::Completed(result)) => print_json(&result),
            Ok(RequestOutcome::Superseded { by }) => {
                eprintln!("devbridge: {tag} superseded by request {by}");
            }
            Err(e) => debug!("{tag} request dropped: {e}"),
        }
    });
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => warn!("Failed to serialize result: {e}"),
    }
}

fn spawn_output_printer(mut tail: watch::Receiver<TailSnapshot>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut printed = TailSnapshot::default();
        while tail.changed().await.is_ok() {
            let current = tail.borrow_and_update().clone();
            let fresh = unseen_suffix(&printed, &current);
            if !fresh.is_empty() {
                let mut stdout = std::io::stdout().lock();
                if let Err(e) = stdout
                    .write_all(fresh.as_bytes())
                    .and_then(|()| stdout.flush())
                {
                    warn!("Failed to write output: {e}");
                }
            }
            printed = current;
        }
    })
}
