//! In-memory lottery server for local runs of the client.
//!
//! Stores every bet it receives and answers winners queries straight away
//! with the documents whose number matches `--winning-number`.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use bet_client::protocol::{
    BET_BATCH_MESSAGE, Bet, CONFIRMATION_ACCEPTED, FormatError, WINNERS_REQUEST_MESSAGE,
    WinnersRequest, WinnersResponse, decode_batch,
};
use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Parser)]
#[command(name = "mock-server", about = "In-memory lottery server for testing the client")]
struct Args {
    /// Port to bind on (0.0.0.0:<port>)
    #[clap(short, long, default_value = "12345")]
    port: u16,

    /// Number that wins the draw
    #[clap(short, long, default_value = "7574")]
    winning_number: u16,
}

#[derive(Debug, thiserror::Error)]
enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Format error: {0}")]
    Format(#[from] FormatError),
}

#[derive(Default)]
struct Store {
    bets: Mutex<Vec<Bet>>,
}

impl Store {
    fn add(&self, bets: Vec<Bet>) -> usize {
        let mut stored = self.bets.lock().unwrap_or_else(|e| e.into_inner());
        stored.extend(bets);
        stored.len()
    }

    fn winners(&self, agency: u8, winning_number: u16) -> WinnersResponse {
        let stored = self.bets.lock().unwrap_or_else(|e| e.into_inner());
        WinnersResponse {
            documents: stored
                .iter()
                .filter(|b| b.agency == agency && b.number == winning_number)
                .map(|b| b.document.clone())
                .collect(),
        }
    }
}

/// Buffers the rest of a batch message, then decodes it in one go.
async fn read_batch(socket: &mut TcpStream) -> Result<Vec<Bet>, ServerError> {
    let count = socket.read_u8().await?;
    let mut message = vec![BET_BATCH_MESSAGE, count];
    for _ in 0..count {
        let len = socket.read_u16().await?;
        message.extend_from_slice(&len.to_be_bytes());
        let start = message.len();
        message.resize(start + len as usize, 0);
        socket.read_exact(&mut message[start..]).await?;
    }
    Ok(decode_batch(&message)?)
}

async fn handle_client(
    mut socket: TcpStream,
    peer: SocketAddr,
    store: Arc<Store>,
    winning_number: u16,
) -> Result<(), ServerError> {
    match socket.read_u8().await? {
        BET_BATCH_MESSAGE => {
            let bets = read_batch(&mut socket).await?;
            let count = bets.len();
            let total = store.add(bets);
            tracing::info!(
                "action: apuesta_recibida | result: success | ip: {} | cantidad: {} | total: {}",
                peer.ip(),
                count,
                total
            );
            socket.write_all(&[CONFIRMATION_ACCEPTED]).await?;
        }
        WINNERS_REQUEST_MESSAGE => {
            let request = WinnersRequest::decode(&[WINNERS_REQUEST_MESSAGE, socket.read_u8().await?])?;
            let agency = request.agency;
            let winners = store.winners(agency, winning_number);
            tracing::info!(
                "action: winners_sent | result: success | agency: {} | count: {}",
                agency,
                winners.count()
            );
            socket.write_all(&winners.encode()?).await?;
        }
        other => tracing::warn!("{} sent unknown message type {}", peer, other),
    }
    socket.shutdown().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(true)
        .init();

    let args = Args::parse();
    let bind_addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!("mock server listening on {}", bind_addr);

    let store = Arc::new(Store::default());
    let winning_number = args.winning_number;
    loop {
        let (socket, peer) = tokio::select! {
            res = listener.accept() => res?,
            _ = tokio::signal::ctrl_c() => break,
        };
        tracing::debug!("action: accept_connections | result: success | ip: {}", peer.ip());

        let store = store.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(socket, peer, store, winning_number).await {
                tracing::error!("client {} error: {}", peer, e);
            }
        });
    }

    tracing::info!("action: exit | result: success");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bet_client::protocol::encode_batch;

    fn bet(document: &str, number: u16) -> Bet {
        Bet {
            agency: 3,
            first_name: "Ana".to_string(),
            last_name: "Perez".to_string(),
            document: document.to_string(),
            birthdate: "1980-01-02".to_string(),
            number,
        }
    }

    async fn exchange(store: Arc<Store>, request: &[u8]) -> Vec<u8> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (socket, peer) = listener.accept().await.unwrap();
            handle_client(socket, peer, store, 7574).await
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(request).await.unwrap();
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        server.await.unwrap().unwrap();
        reply
    }

    #[tokio::test]
    async fn test_batch_then_winners() {
        let store = Arc::new(Store::default());
        let batch = encode_batch(&[bet("10000001", 7574), bet("10000002", 1)]).unwrap();

        let reply = exchange(store.clone(), &batch).await;
        assert_eq!(reply, [CONFIRMATION_ACCEPTED]);

        let reply = exchange(store.clone(), &WinnersRequest::new(3).encode()).await;
        let expected = WinnersResponse {
            documents: vec!["10000001".to_string()],
        };
        assert_eq!(reply, expected.encode().unwrap());

        let reply = exchange(store, &WinnersRequest::new(4).encode()).await;
        assert_eq!(reply, [0, 0]);
    }

    #[tokio::test]
    async fn test_malformed_batch_is_rejected() {
        let store = Arc::new(Store::default());
        let mut batch = encode_batch(&[bet("10000001", 1)]).unwrap();
        // declare one byte less than the fields take
        batch[3] -= 1;
        batch.pop();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = {
            let store = store.clone();
            tokio::spawn(async move {
                let (socket, peer) = listener.accept().await.unwrap();
                handle_client(socket, peer, store, 7574).await
            })
        };
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&batch).await.unwrap();

        let res = server.await.unwrap();
        assert!(matches!(res, Err(ServerError::Format(_))), "{res:?}");
        assert!(store.bets.lock().unwrap().is_empty());
    }
}
