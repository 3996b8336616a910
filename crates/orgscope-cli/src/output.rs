use std::io::Write;
use std::process::ExitCode;

use futures::StreamExt;
use orgscope_core::{ByteStream, UpstreamError};
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::error::CliError;

pub const NOT_FOUND_EXIT_CODE: u8 = 3;

/// What a command produced.
pub enum CommandOutput {
    Json(Value),
    Stream(ByteStream),
    NotFound,
}

impl CommandOutput {
    pub fn from_json<T>(value: Option<T>) -> Result<Self, CliError>
    where
        T: Serialize,
    {
        match value {
            Some(value) => Ok(Self::Json(serde_json::to_value(value)?)),
            None => Ok(Self::NotFound),
        }
    }

    pub fn from_stream(stream: Option<ByteStream>) -> Self {
        stream.map_or(Self::NotFound, Self::Stream)
    }
}

pub async fn render(
    output: CommandOutput,
    pretty: bool,
    cancel: &CancellationToken,
) -> Result<ExitCode, CliError> {
    match output {
        CommandOutput::Json(value) => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            write_json(&mut handle, &value, pretty)?;
            Ok(ExitCode::SUCCESS)
        }
        CommandOutput::Stream(stream) => {
            pipe_stream(stream, &mut tokio::io::stdout(), cancel).await?;
            Ok(ExitCode::SUCCESS)
        }
        CommandOutput::NotFound => {
            eprintln!("not found");
            Ok(ExitCode::from(NOT_FOUND_EXIT_CODE))
        }
    }
}

pub fn write_json<W>(writer: &mut W, value: &Value, pretty: bool) -> Result<(), CliError>
where
    W: Write,
{
    if pretty {
        serde_json::to_writer_pretty(&mut *writer, value)?;
    } else {
        serde_json::to_writer(&mut *writer, value)?;
    }
    writeln!(writer)?;
    Ok(())
}

/// Copies stream chunks to `writer` as they arrive; stops early on cancellation.
pub async fn pipe_stream<W>(
    mut stream: ByteStream,
    writer: &mut W,
    cancel: &CancellationToken,
) -> Result<u64, CliError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut written = 0_u64;
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UpstreamError::cancelled().into()),
            next = stream.next() => next,
        };
        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    writer.flush().await?;
    Ok(written)
}
