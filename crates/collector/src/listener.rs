//! The TCP accept loop and per-connection handling.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use classifier::Classifier;
use common::RawEvent;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use usage_store::UsageStore;

use crate::frame::{Frame, MAX_FRAME_BYTES};

/// Accepts connections until `shutdown` resolves, then drains in-flight handlers.
///
/// Each connection gets its own task and carries exactly one frame. Handlers
/// still running after `drain_timeout` are abandoned. A record already handed
/// to the store's writer completes regardless.
#[tracing::instrument(skip_all, fields(addr = ?listener.local_addr().ok()))]
pub async fn serve<S, F>(
    listener: TcpListener,
    store: Arc<S>,
    classifier: Arc<Classifier>,
    shutdown: F,
    drain_timeout: Duration,
) where
    S: UsageStore + ?Sized + 'static,
    F: Future<Output = ()>,
{
    let mut handlers = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    metrics::counter!("collector_connections_total").increment(1);
                    handlers.spawn(handle_connection(
                        stream,
                        peer,
                        Arc::clone(&store),
                        Arc::clone(&classifier),
                    ));
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to accept connection");
                }
            },
            // Reap finished handlers so the set does not grow without bound.
            Some(_) = handlers.join_next(), if !handlers.is_empty() => {}
        }
    }

    drop(listener);

    if handlers.is_empty() {
        return;
    }

    tracing::info!(in_flight = handlers.len(), "draining connection handlers");
    let drained = tokio::time::timeout(drain_timeout, async {
        while handlers.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        tracing::warn!(
            abandoned = handlers.len(),
            "drain timeout elapsed, abandoning connection handlers"
        );
    }
}

#[tracing::instrument(level = "debug", skip(stream, store, classifier), fields(peer = %peer))]
async fn handle_connection<S>(
    stream: TcpStream,
    peer: SocketAddr,
    store: Arc<S>,
    classifier: Arc<Classifier>,
) where
    S: UsageStore + ?Sized,
{
    let mut bytes = Vec::with_capacity(MAX_FRAME_BYTES);
    let mut reader = stream.take(MAX_FRAME_BYTES as u64);
    if let Err(err) = reader.read_to_end(&mut bytes).await {
        tracing::debug!(error = %err, "read failed, dropping connection");
        return;
    }
    drop(reader);

    let Some(frame) = Frame::parse(&bytes) else {
        metrics::counter!("collector_frames_malformed_total").increment(1);
        tracing::debug!(len = bytes.len(), "dropping malformed frame");
        return;
    };

    let module = classifier.classify(&frame.command);
    let category = module.as_ref().map_or("none", |m| m.category().as_str());
    let event = RawEvent::now(frame.user, frame.command, source_ip(&peer));

    match store.record(event, module).await {
        Ok(()) => {
            metrics::counter!("collector_events_recorded_total", "category" => category)
                .increment(1);
        }
        Err(err) => {
            metrics::counter!("collector_store_errors_total").increment(1);
            tracing::error!(error = %err, "failed to record usage event");
        }
    }
}

/// Renders the peer's IP without the port, unwrapping IPv4-mapped IPv6.
pub fn source_ip(peer: &SocketAddr) -> String {
    peer.ip().to_canonical().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_ip_drops_port() {
        let peer: SocketAddr = "192.168.1.1:54321".parse().unwrap();
        assert_eq!(source_ip(&peer), "192.168.1.1");
    }

    #[test]
    fn source_ip_unwraps_mapped_ipv4() {
        let peer: SocketAddr = "[::ffff:10.0.0.7]:80".parse().unwrap();
        assert_eq!(source_ip(&peer), "10.0.0.7");
    }

    #[test]
    fn source_ip_keeps_plain_ipv6() {
        let peer: SocketAddr = "[2001:db8::1]:80".parse().unwrap();
        assert_eq!(source_ip(&peer), "2001:db8::1");
    }
}
