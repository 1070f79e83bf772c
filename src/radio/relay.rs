use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{RadioParam, RpcClient};
use crate::daemon::Daemon;

/// Pacing between RPC calls so a burst of queued updates does not swamp the
/// endpoint.
const CALL_PACE: Duration = Duration::from_millis(100);

/// Parameter relay loop: single consumer of the outbound queue, forwarding
/// each entry to the signal-processing endpoint in strict FIFO order.
/// Connection failures are logged and the entry dropped; the queue keeps
/// draining. A terminal `is_running=false` is forwarded like any other
/// entry; shutdown is signalled to the interpreter separately.
pub async fn run(daemon: Arc<Daemon>, rpc: RpcClient, mut rx: mpsc::UnboundedReceiver<RadioParam>) {
    while let Some(param) = rx.recv().await {
        log::debug!("relaying {}", param.method());
        if let Err(e) = rpc.set(&param).await {
            daemon
                .events
                .record(format!("{} failed: {}", param.method(), e));
        }
        tokio::time::sleep(CALL_PACE).await;
    }
}
