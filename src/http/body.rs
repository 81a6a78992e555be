//! Response body helpers.

use axum::body::Body;
use http_body_util::BodyExt;

/// Keep `held` alive until `body` has been fully sent or dropped.
///
/// Drop-side work attached to `held` (latency samples, in-flight guards)
/// then covers streamed bodies, not just the response head.
pub fn hold_until_done<T>(body: Body, held: T) -> Body
where
    T: Send + 'static,
{
    Body::new(body.map_frame(move |frame| {
        let _held = &held;
        frame
    }))
}
