use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::command::CommandRecord;
use crate::daemon::Daemon;

/// Command intake loop: every line received on the command port becomes one
/// queued command, FIFO across all connected clients.
pub async fn run(
    listener: TcpListener,
    tx: mpsc::UnboundedSender<CommandRecord>,
    daemon: Arc<Daemon>,
) {
    if let Ok(addr) = listener.local_addr() {
        log::info!("command intake listening on {}", addr);
    }
    accept_loop(listener, tx, daemon).await;
}

async fn accept_loop(
    listener: TcpListener,
    tx: mpsc::UnboundedSender<CommandRecord>,
    daemon: Arc<Daemon>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                log::info!("command client connected from {}", peer);
                tokio::spawn(handle_client(stream, tx.clone(), Arc::clone(&daemon)));
            }
            Err(e) => log::warn!("command accept failed: {}", e),
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    tx: mpsc::UnboundedSender<CommandRecord>,
    daemon: Arc<Daemon>,
) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                daemon.queue_depth.fetch_add(1, Ordering::SeqCst);
                if tx.send(CommandRecord::now(line)).is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                log::warn!("command client read failed: {}", e);
                return;
            }
        }
    }
}
