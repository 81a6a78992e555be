//! Bounded, concurrent drain of one listener's protocol engines.
//!
//! # Data Flow
//! ```text
//! cancelled
//!     → HTTP: handle.graceful_shutdown(grace), wait for serve to return
//!     → RPC:  engine.graceful_stop(grace)          (concurrently, if any)
//!     → join both, first error wins
//!
//! forced (second signal) at any point
//!     → handle.shutdown(), return ShutdownForced
//! ```

use std::future::Future;
use std::time::Duration;

use axum_server::Handle;

use crate::error::Protocol;
use crate::lifecycle::signals::SignalContext;
use crate::rpc::RpcEngine;

/// Extra time the HTTP engine gets past the grace to close what it forced.
const HARD_STOP_MARGIN: Duration = Duration::from_secs(1);

/// Drain an HTTP engine and, optionally, an RPC engine sharing its lifetime.
///
/// `serving` is the HTTP engine's serve future; its `Ok(())` after a
/// handle-initiated stop is the normal outcome, not an error.
pub async fn drain<F>(
    ctx: &SignalContext,
    grace: Duration,
    http: &Handle,
    serving: F,
    rpc: Option<&RpcEngine>,
) -> crate::Result<()>
where
    F: Future<Output = crate::Result<()>>,
{
    tracing::info!(
        grace_ms = grace.as_millis() as u64,
        connections = http.connection_count(),
        rpc = rpc.is_some(),
        "Draining"
    );
    http.graceful_shutdown(Some(grace));

    let http_drain = async {
        match tokio::time::timeout(grace + HARD_STOP_MARGIN, serving).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(grace_ms = grace.as_millis() as u64, "HTTP drain timed out");
                http.shutdown();
                Err(crate::Error::DrainTimeout {
                    protocol: Protocol::Http,
                    timeout: grace,
                })
            }
        }
    };
    let rpc_drain = async {
        match rpc {
            Some(engine) => engine.graceful_stop(grace).await,
            None => Ok(()),
        }
    };

    tokio::select! {
        (http_result, rpc_result) = async { tokio::join!(http_drain, rpc_drain) } => {
            if let Err(e) = &rpc_result {
                tracing::warn!(error = %e, "RPC drain failed");
            }
            http_result.and(rpc_result)
        }
        _ = ctx.forced() => {
            tracing::warn!("Forced shutdown, closing remaining connections");
            http.shutdown();
            Err(crate::Error::ShutdownForced)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, Response},
    };
    use std::convert::Infallible;
    use tokio::sync::Notify;

    fn slow_serving(done: Arc<AtomicBool>, after: Duration) -> impl Future<Output = crate::Result<()>> {
        async move {
            tokio::time::sleep(after).await;
            done.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn waits_for_both_engines() {
        let release = Arc::new(Notify::new());
        let engine = RpcEngine::new(tower::service_fn({
            let release = release.clone();
            move |_req: Request<Body>| {
                let release = release.clone();
                async move {
                    release.notified().await;
                    Ok::<_, Infallible>(Response::new(Body::empty()))
                }
            }
        }));
        let call = tokio::spawn({
            let engine = engine.clone();
            async move { engine.serve(Request::new(Body::empty())).await }
        });
        while engine.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        tokio::spawn({
            let release = release.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                release.notify_one();
            }
        });

        let http_done = Arc::new(AtomicBool::new(false));
        let ctx = SignalContext::manual();
        ctx.trigger();
        let result = drain(
            &ctx,
            Duration::from_secs(5),
            &Handle::new(),
            slow_serving(http_done.clone(), Duration::from_millis(20)),
            Some(&engine),
        )
        .await;

        result.unwrap();
        assert!(http_done.load(Ordering::SeqCst));
        assert_eq!(engine.in_flight(), 0, "RPC drain finished before returning");
        call.await.unwrap();
    }

    #[tokio::test]
    async fn serve_error_surfaces() {
        let ctx = SignalContext::manual();
        let serving = async {
            Err(crate::Error::Serve {
                protocol: Protocol::Http,
                source: std::io::Error::other("accept failed"),
            })
        };
        let err = drain(&ctx, Duration::from_secs(1), &Handle::new(), serving, None)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Serve { .. }));
    }

    #[tokio::test]
    async fn second_signal_forces_teardown() {
        let ctx = SignalContext::manual();
        ctx.trigger();

        let task = tokio::spawn({
            let ctx = ctx.clone();
            async move {
                drain(
                    &ctx,
                    Duration::from_secs(60),
                    &Handle::new(),
                    std::future::pending(),
                    None,
                )
                .await
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        ctx.trigger();

        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("forced drain returns promptly")
            .unwrap();
        assert!(matches!(result, Err(crate::Error::ShutdownForced)));
    }

    #[tokio::test]
    async fn hung_http_engine_times_out() {
        let ctx = SignalContext::manual();
        let err = drain(
            &ctx,
            Duration::from_millis(50),
            &Handle::new(),
            std::future::pending(),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::DrainTimeout {
                protocol: Protocol::Http,
                ..
            }
        ));
    }
}
