//! Console viewer: prints live updates on stdout

use crate::config::ConsoleFormat;
use anyhow::Result;
use can_telemetry::{CancellationToken, ChannelViewer, Hub, SignalUpdate};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::io::{self, Write};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Connect a console viewer to the hub and print on a dedicated thread
pub fn spawn(
    hub: &Hub,
    format: ConsoleFormat,
    queue_capacity: usize,
    token: CancellationToken,
) -> Result<JoinHandle<()>> {
    let (viewer, updates) = ChannelViewer::new(queue_capacity);
    let id = hub.on_connect(Arc::new(viewer));
    log::debug!("Console attached as {}", id);

    let handle = std::thread::Builder::new()
        .name("console-viewer".to_string())
        .spawn(move || print_updates(&updates, format, &token))?;
    Ok(handle)
}

fn print_updates(updates: &Receiver<SignalUpdate>, format: ConsoleFormat, token: &CancellationToken) {
    let stdout = io::stdout();

    while !token.is_cancelled() {
        let update = match updates.recv_timeout(POLL_INTERVAL) {
            Ok(update) => update,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let line = match render(&update, format) {
            Ok(line) => line,
            Err(e) => {
                log::error!("Failed to render {}: {}", update.name, e);
                continue;
            }
        };

        if writeln!(stdout.lock(), "{}", line).is_err() {
            // stdout closed (e.g. piped into `head`)
            break;
        }
    }
}

fn render(update: &SignalUpdate, format: ConsoleFormat) -> serde_json::Result<String> {
    match format {
        ConsoleFormat::Json => serde_json::to_string(update),
        ConsoleFormat::Text => Ok(update.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_formats() {
        let update = SignalUpdate::with_timestamp("group-1-voltage-1", 3900.0, "mV", 1.5);
        assert_eq!(
            render(&update, ConsoleFormat::Json).unwrap(),
            r#"{"name":"group-1-voltage-1","value":3900.0,"unit":"mV","timestamp":1.5}"#
        );
        assert_eq!(
            render(&update, ConsoleFormat::Text).unwrap(),
            "group-1-voltage-1 = 3900.000 mV"
        );
    }
}
