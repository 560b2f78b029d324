//! CONNECT tunnel establishment and byte splicing
//!
//! Tunneled traffic is forwarded as an opaque byte stream in both
//! directions; nothing here inspects or terminates TLS.

use crate::error::Error;
use crate::models::{DispatchDecision, FailureKind};
use crate::utils::{
    build_error_response, log_tunnel_established, log_tunnel_failure, parse_connect_target,
};
use hyper::upgrade::{OnUpgrade, Upgraded};
use hyper::{Body, Request, Response, StatusCode};
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Establish a tunnel for a CONNECT request: dial the target, confirm the
/// client transport can be taken over, reply 200, then splice the two
/// streams until both directions drain.
pub async fn establish(mut req: Request<Body>) -> (Response<Body>, DispatchDecision) {
    let started = Instant::now();
    let target = req
        .uri()
        .authority()
        .map(|authority| authority.to_string())
        .unwrap_or_else(|| req.uri().to_string());

    let (host, port) = match parse_connect_target(&target) {
        Ok(pair) => pair,
        Err(message) => {
            log_tunnel_failure(&target, started.elapsed().as_millis(), &message);
            return (
                build_error_response(StatusCode::NOT_FOUND, &message),
                DispatchDecision::Failed(FailureKind::Dial),
            );
        }
    };

    let remote = match TcpStream::connect((host.as_str(), port)).await {
        Ok(stream) => stream,
        Err(source) => {
            let err = Error::DialFailed {
                target: target.clone(),
                source,
            };
            log_tunnel_failure(&target, started.elapsed().as_millis(), &err.to_string());
            return (
                build_error_response(StatusCode::NOT_FOUND, &err.to_string()),
                DispatchDecision::Failed(FailureKind::Dial),
            );
        }
    };

    // Raw-takeover capability is decided once, here, before the 200 goes
    // out. A transport without the upgrade extension cannot be hijacked.
    let on_upgrade = match req.extensions_mut().remove::<OnUpgrade>() {
        Some(upgrade) => upgrade,
        None => {
            let err = Error::HijackUnsupported;
            log_tunnel_failure(&target, started.elapsed().as_millis(), &err.to_string());
            return (
                build_error_response(StatusCode::SERVICE_UNAVAILABLE, &err.to_string()),
                DispatchDecision::Failed(FailureKind::Hijack),
            );
        }
    };

    log_tunnel_established(&host, port, started.elapsed().as_millis());

    // The 200 response is written first; the upgrade resolves once it has
    // gone out, handing over the client's raw duplex stream.
    tokio::spawn(async move {
        match on_upgrade.await {
            Ok(client) => splice(client, remote),
            Err(e) => {
                let err = Error::TunnelSetup(e.to_string());
                warn!("Tunnel to {}:{} aborted: {}", host, port, err);
            }
        }
    });

    (Response::new(Body::empty()), DispatchDecision::TunnelEstablished)
}

/// Splice the client and remote transports: one unsupervised copy task
/// per direction. Each task copies until its source reaches end-of-stream
/// and then half-closes its destination's write side, so the tunnel
/// terminates naturally once both directions have drained. No join and no
/// timeout are imposed.
fn splice(client: Upgraded, remote: TcpStream) {
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut remote_read, mut remote_write) = remote.into_split();

    tokio::spawn(async move {
        let copied = tokio::io::copy(&mut client_read, &mut remote_write).await;
        let _ = remote_write.shutdown().await;
        if let Ok(bytes) = copied {
            debug!("client-to-remote direction drained after {} bytes", bytes);
        }
    });

    tokio::spawn(async move {
        let copied = tokio::io::copy(&mut remote_read, &mut client_write).await;
        let _ = client_write.shutdown().await;
        if let Ok(bytes) = copied {
            debug!("remote-to-client direction drained after {} bytes", bytes);
        }
    });
}
