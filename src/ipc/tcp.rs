// std
use std::future::Future;
use std::io;
use std::time::Duration;

// external
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

// internal
use crate::error::ClientError;
use crate::protocol::WinnersResponse;
use crate::shutdown::Shutdown;

pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_CONNECT_BACKOFF: Duration = Duration::from_secs(2);

/// Opens connections to the server, retrying failed dials a bounded number of
/// times with a fixed backoff in between.
#[derive(Debug, Clone)]
pub struct Dialer {
    addr: String,
    max_attempts: u32,
    backoff: Duration,
    shutdown: Shutdown,
}

impl Dialer {
    pub fn new(addr: impl Into<String>, shutdown: Shutdown) -> Self {
        Self {
            addr: addr.into(),
            max_attempts: DEFAULT_CONNECT_ATTEMPTS,
            backoff: DEFAULT_CONNECT_BACKOFF,
            shutdown,
        }
    }

    /// At least one attempt is always made.
    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    /// Dials the server. Each dial attempt, and every read and write on the
    /// returned connection, is bounded by `deadline`.
    pub async fn connect(&self, deadline: Duration) -> Result<Connection, ClientError> {
        let mut attempt = 0;
        loop {
            if self.shutdown.is_triggered() {
                return Err(ClientError::Cancelled);
            }
            attempt += 1;

            let dial = tokio::time::timeout(deadline, TcpStream::connect(self.addr.as_str()));
            let res = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Err(ClientError::Cancelled),
                res = dial => res.unwrap_or_else(|_| {
                    Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))
                }),
            };

            let err = match res {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    tracing::debug!("connected to {} (attempt #{})", self.addr, attempt);
                    return Ok(Connection::new(stream, deadline, self.shutdown.clone()));
                }
                Err(err) => err,
            };

            if attempt >= self.max_attempts {
                tracing::error!(
                    "action: connect | result: fail | address: {} | attempts: {} | error: {}",
                    self.addr,
                    attempt,
                    err
                );
                return Err(ClientError::ConnectionFailure {
                    addr: self.addr.clone(),
                    attempts: attempt,
                    source: err,
                });
            }

            tracing::info!(
                "action: connect | result: in_progress | address: {} | attempt: {} | error: {}",
                self.addr,
                attempt,
                err
            );
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Err(ClientError::Cancelled),
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }
    }
}

/// A live connection for a single exchange.
///
/// Reads and writes race the deadline and the shutdown signal. Whatever ends
/// an operation early closes the socket, so a blocked peer can never hold the
/// session hostage.
#[derive(Debug)]
pub struct Connection {
    stream: Option<TcpStream>,
    deadline: Duration,
    shutdown: Shutdown,
}

impl Connection {
    fn new(stream: TcpStream, deadline: Duration, shutdown: Shutdown) -> Self {
        Self {
            stream: Some(stream),
            deadline,
            shutdown,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Writes the whole buffer.
    pub async fn send(&mut self, buf: &[u8]) -> Result<(), ClientError> {
        let stream = self.stream.as_mut().ok_or(ClientError::Closed)?;
        let res = guarded(&self.shutdown, self.deadline, "write", async {
            stream
                .write_all(buf)
                .await
                .map_err(|e| write_error(e, buf.len()))?;
            stream.flush().await?;
            Ok::<_, ClientError>(())
        })
        .await;
        self.close_on_error(res)
    }

    /// Fills `buf` completely.
    pub async fn recv_exact(&mut self, buf: &mut [u8], what: &'static str) -> Result<(), ClientError> {
        let stream = self.stream.as_mut().ok_or(ClientError::Closed)?;
        let res = guarded(&self.shutdown, self.deadline, "read", async {
            stream.read_exact(buf).await.map_err(|e| match e.kind() {
                io::ErrorKind::UnexpectedEof => ClientError::ShortRead(what),
                _ => ClientError::Io(e),
            })?;
            Ok::<_, ClientError>(())
        })
        .await;
        self.close_on_error(res)
    }

    pub async fn recv_u8(&mut self, what: &'static str) -> Result<u8, ClientError> {
        let mut byte = [0u8];
        self.recv_exact(&mut byte, what).await?;
        Ok(byte[0])
    }

    pub async fn read_winners(&mut self) -> Result<WinnersResponse, ClientError> {
        let stream = self.stream.as_mut().ok_or(ClientError::Closed)?;
        let res = guarded(&self.shutdown, self.deadline, "read", async {
            Ok::<_, ClientError>(WinnersResponse::read_from(stream).await?)
        })
        .await;
        self.close_on_error(res)
    }

    /// Drops the socket. Calling it again is a no-op.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::trace!("connection closed");
        }
    }

    fn close_on_error<T>(&mut self, res: Result<T, ClientError>) -> Result<T, ClientError> {
        if res.is_err() {
            self.close();
        }
        res
    }
}

/// A socket that stops accepting bytes mid-buffer is a short write.
fn write_error(err: io::Error, expected: usize) -> ClientError {
    match err.kind() {
        io::ErrorKind::WriteZero => ClientError::ShortWrite { expected },
        _ => ClientError::Io(err),
    }
}

/// Runs `fut` bounded by `deadline`, giving up as soon as `shutdown` fires.
///
/// An error that races with the shutdown is reported as `Cancelled`: the peer
/// may have seen the socket go away before we did.
async fn guarded<T, F>(
    shutdown: &Shutdown,
    deadline: Duration,
    op: &'static str,
    fut: F,
) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    let res = tokio::select! {
        biased;
        _ = shutdown.cancelled() => return Err(ClientError::Cancelled),
        res = tokio::time::timeout(deadline, fut) => res,
    };
    match res {
        Ok(Err(_)) if shutdown.is_triggered() => Err(ClientError::Cancelled),
        Ok(res) => res,
        Err(_) => Err(ClientError::Timeout { op, after: deadline }),
    }
}
