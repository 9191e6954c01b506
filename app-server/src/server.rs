//! JSON-lines transport.

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::handler::CopilotHandler;
use crate::protocol::{Request, Response};
use crate::validation::FieldError;

/// Serve requests from `reader` until end of input, one response line per
/// request line. Blank lines are skipped.
pub async fn serve<R, W>(handler: &CopilotHandler, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = handle_line(handler, line).await;
        let mut encoded = serde_json::to_string(&response)?;
        encoded.push('\n');
        writer.write_all(encoded.as_bytes()).await?;
        writer.flush().await?;
    }
    debug!("Input closed");
    Ok(())
}

/// Decode, dispatch and wrap a single request line.
pub async fn handle_line(handler: &CopilotHandler, line: &str) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            let error = ApiError::Validation(vec![FieldError::new(
                "request",
                format!("malformed JSON: {e}"),
            )]);
            return Response::failure(None, &error);
        }
    };

    debug!("-> {}", request.method);
    match handler.dispatch(&request.method, request.params).await {
        Ok(result) => Response::success(request.id, result),
        Err(error) => {
            warn!("{} rejected: {error}", request.method);
            Response::failure(request.id, &error)
        }
    }
}
