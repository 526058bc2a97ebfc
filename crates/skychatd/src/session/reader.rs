//! Line Reader: reads newline-terminated input and forwards commands.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::{broadcast, mpsc, oneshot};

use skychat_core::command::ParseError;
use skychat_core::{Command, CommandKind, SessionId};

use crate::dispatch::DispatchEvent;

/// Result of reading one line.
#[derive(Debug, PartialEq, Eq)]
pub enum LineRead {
    /// A line (possibly unterminated at end of stream) is in the buffer.
    Line,
    /// The line exceeded the limit and was discarded up to its newline.
    TooLong,
    /// Clean end of stream.
    Eof,
}

/// Read one line of at most `max` bytes into `buf`.
pub async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>, max: usize) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let limit = max as u64;
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(LineRead::Eof);
    }
    if buf.last() == Some(&b'\n') || n < max {
        return Ok(LineRead::Line);
    }

    // Over the limit: skip the rest of this line.
    let mut discard = Vec::new();
    loop {
        discard.clear();
        let n = (&mut *reader).take(limit).read_until(b'\n', &mut discard).await?;
        if n == 0 || discard.last() == Some(&b'\n') {
            return Ok(LineRead::TooLong);
        }
    }
}

pub struct LineReader {
    id: SessionId,
    reader: BufReader<OwnedReadHalf>,
    events: mpsc::UnboundedSender<DispatchEvent>,
    closed: oneshot::Receiver<()>,
    shutdown: broadcast::Receiver<()>,
    max_line: usize,
}

impl LineReader {
    pub fn new(
        id: SessionId,
        stream: OwnedReadHalf,
        events: mpsc::UnboundedSender<DispatchEvent>,
        closed: oneshot::Receiver<()>,
        shutdown: broadcast::Receiver<()>,
        max_line: usize,
    ) -> Self {
        Self {
            id,
            reader: BufReader::new(stream),
            events,
            closed,
            shutdown,
            max_line,
        }
    }

    /// Read until `/quit`, end of stream, a read error, or the writer going
    /// away. Every exit other than an explicit `/quit` enqueues a Quit so
    /// the dispatcher always drops the session.
    pub async fn run(mut self) {
        let mut buf = Vec::with_capacity(256);

        loop {
            buf.clear();

            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::debug!(session = %self.id, "line reader shutting down");
                    return;
                }

                _ = &mut self.closed => {
                    tracing::debug!(session = %self.id, "connection writer exited");
                    break;
                }

                read = read_line(&mut self.reader, &mut buf, self.max_line) => {
                    let cmd = match read {
                        Ok(LineRead::Line) => {
                            Command::parse(self.id, &String::from_utf8_lossy(&buf))
                        }
                        Ok(LineRead::TooLong) => Command::new(
                            self.id,
                            CommandKind::Rejected(ParseError::LineTooLong(self.max_line)),
                        ),
                        Ok(LineRead::Eof) => {
                            tracing::debug!(session = %self.id, "client closed the connection");
                            break;
                        }
                        Err(e) => {
                            tracing::debug!(session = %self.id, error = %e, "read failed");
                            break;
                        }
                    };

                    let quit = cmd.kind == CommandKind::Quit;
                    if self.events.send(DispatchEvent::Command(cmd)).is_err() {
                        tracing::debug!(session = %self.id, "dispatcher gone, reader exiting");
                        return;
                    }
                    if quit {
                        return;
                    }
                }
            }
        }

        let _ = self
            .events
            .send(DispatchEvent::Command(Command::new(self.id, CommandKind::Quit)));
    }
}
