//! Stateless pipe binding: line-delimited JSON-RPC on stdin/stdout.
//!
//! One request per line, one response per line. EOF ends the loop cleanly.
//! Logs must go to stderr in this mode; stdout belongs to the protocol.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::{rpc, GatewayState};

/// Run the pipe binding until EOF.
pub async fn run(state: GatewayState) -> Result<()> {
    info!("pipe binding listening on stdio");

    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut reader = BufReader::new(stdin);

    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            info!("EOF on stdin, pipe binding stopping");
            break;
        }

        if let Some(response) = handle_line(&state, line.trim()).await {
            stdout.write_all(response.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }

    Ok(())
}

/// Process one framed record. Returns `None` for blank lines and for
/// notifications (requests without an id), which get no response.
pub(crate) async fn handle_line(state: &GatewayState, line: &str) -> Option<String> {
    if line.is_empty() {
        return None;
    }
    debug!(bytes = line.len(), "pipe request received");

    let response = match rpc::parse_request(line) {
        Ok(request) => {
            let is_notification = request.id.is_none();
            let response = rpc::dispatch(state, request).await;
            if is_notification {
                return None;
            }
            response
        }
        Err(error_response) => {
            state.metrics.record_error();
            *error_response
        }
    };

    serde_json::to_string(&response).ok()
}
