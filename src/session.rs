//! One client's event-stream response.
//!
//! Frames travel over a bounded channel into the response body. Each frame is
//! its own body chunk, so hyper writes it to the socket as soon as it is
//! sent; nothing is held back until the response completes.

use crate::error::GatewayError;
use crate::protocol::StreamEvent;
use crate::sse::{encode_frame, FrameError};
use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue};
use axum::response::Response;
use bytes::Bytes;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

const FRAME_BUFFER: usize = 32;

type FrameSender = mpsc::Sender<Result<Bytes, Infallible>>;

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub streaming_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    /// A terminal event was written.
    Closed,
    /// The client went away; writes are silenced.
    Broken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emit {
    Delivered,
    Suppressed,
}

pub struct StreamSession {
    frames: Option<FrameSender>,
    connection: CancellationToken,
    finished: CancellationToken,
    state: SessionState,
}

impl StreamSession {
    /// Commits to an event stream and returns the response carrying it.
    ///
    /// The response head goes out as soon as the handler returns it, before
    /// the first frame is written.
    pub fn open(options: SessionOptions) -> Result<(Self, Response), GatewayError> {
        if !options.streaming_enabled {
            return Err(GatewayError::StreamUnsupported);
        }

        let (frames, receiver) = mpsc::channel(FRAME_BUFFER);
        let connection = CancellationToken::new();
        let finished = CancellationToken::new();

        tokio::spawn(watch_disconnect(
            frames.clone(),
            connection.clone(),
            finished.clone(),
        ));

        let mut response = Response::new(Body::from_stream(ReceiverStream::new(receiver)));
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        // nginx buffers proxied responses unless told otherwise
        headers.insert(
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        );

        let session = Self {
            frames: Some(frames),
            connection,
            finished,
            state: SessionState::Active,
        };
        Ok((session, response))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Fires when the client disconnects or the session breaks.
    pub fn cancellation(&self) -> CancellationToken {
        self.connection.clone()
    }

    /// Writes one event. Once the session is closed or broken every call is
    /// a no-op returning [`Emit::Suppressed`].
    pub async fn emit(&mut self, event: StreamEvent) -> Result<Emit, FrameError> {
        if self.state != SessionState::Active {
            return Ok(Emit::Suppressed);
        }
        if self.connection.is_cancelled() {
            self.mark_broken();
            return Ok(Emit::Suppressed);
        }
        let Some(frames) = self.frames.as_ref() else {
            return Ok(Emit::Suppressed);
        };

        let terminal = event.is_terminal();
        let frame = encode_frame(&event)?;

        let sent = tokio::select! {
            biased;
            _ = self.connection.cancelled() => false,
            result = frames.send(Ok(frame)) => result.is_ok(),
        };

        if !sent {
            self.mark_broken();
            return Ok(Emit::Suppressed);
        }
        if terminal {
            self.close();
        }
        Ok(Emit::Delivered)
    }

    fn close(&mut self) {
        self.state = SessionState::Closed;
        self.frames = None;
        self.finished.cancel();
    }

    fn mark_broken(&mut self) {
        tracing::debug!("client disconnected, suppressing further events");
        self.state = SessionState::Broken;
        self.frames = None;
        self.connection.cancel();
        self.finished.cancel();
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if self.state == SessionState::Active {
            tracing::warn!("event stream torn down without a terminal event");
        }
        self.finished.cancel();
    }
}

async fn watch_disconnect(
    frames: FrameSender,
    connection: CancellationToken,
    finished: CancellationToken,
) {
    tokio::select! {
        biased;
        _ = finished.cancelled() => {}
        _ = frames.closed() => connection.cancel(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::FrameDecoder;
    use std::time::Duration;

    const ENABLED: SessionOptions = SessionOptions {
        streaming_enabled: true,
    };

    async fn body_events(response: Response) -> Vec<StreamEvent> {
        let bytes = tokio::time::timeout(
            Duration::from_secs(5),
            axum::body::to_bytes(response.into_body(), usize::MAX),
        )
        .await
        .expect("body did not finish")
        .unwrap();
        FrameDecoder::new().push(&bytes)
    }

    #[tokio::test]
    async fn open_fails_when_streaming_is_disabled() {
        let result = StreamSession::open(SessionOptions {
            streaming_enabled: false,
        });
        assert!(matches!(result, Err(GatewayError::StreamUnsupported)));
    }

    #[tokio::test]
    async fn open_sets_event_stream_headers() {
        let (_session, response) = StreamSession::open(ENABLED).unwrap();
        let headers = response.headers();

        assert_eq!(headers[CONTENT_TYPE], "text/event-stream");
        assert_eq!(headers[CACHE_CONTROL], "no-cache");
        assert_eq!(headers[CONNECTION], "keep-alive");
        assert_eq!(headers["x-accel-buffering"], "no");
    }

    #[tokio::test]
    async fn terminal_event_closes_the_body() {
        let (mut session, response) = StreamSession::open(ENABLED).unwrap();

        let start = StreamEvent::Start {
            prompt: "hello".to_string(),
        };
        let done = StreamEvent::Done {
            final_answer: "bye".to_string(),
        };
        assert_eq!(session.emit(start.clone()).await.unwrap(), Emit::Delivered);
        assert_eq!(session.emit(done.clone()).await.unwrap(), Emit::Delivered);
        assert_eq!(session.state(), SessionState::Closed);

        let late = StreamEvent::Token {
            text: "late".to_string(),
        };
        assert_eq!(session.emit(late).await.unwrap(), Emit::Suppressed);

        assert_eq!(body_events(response).await, vec![start, done]);
    }

    #[tokio::test]
    async fn dropped_body_cancels_and_silences_the_session() {
        let (mut session, response) = StreamSession::open(ENABLED).unwrap();
        let cancellation = session.cancellation();

        drop(response);
        tokio::time::timeout(Duration::from_secs(5), cancellation.cancelled())
            .await
            .expect("disconnect was not observed");

        let token = StreamEvent::Token {
            text: "x".to_string(),
        };
        assert_eq!(session.emit(token).await.unwrap(), Emit::Suppressed);
        assert_eq!(session.state(), SessionState::Broken);
    }

    fn token(n: usize) -> StreamEvent {
        StreamEvent::Token {
            text: n.to_string(),
        }
    }

    /// Fills the frame buffer of an unread body, then parks one more emit.
    async fn blocked_emit(
        mut session: StreamSession,
    ) -> tokio::task::JoinHandle<(StreamSession, Result<Emit, FrameError>)> {
        for n in 0..FRAME_BUFFER {
            assert_eq!(session.emit(token(n)).await.unwrap(), Emit::Delivered);
        }
        let pending = tokio::spawn(async move {
            let result = session.emit(token(FRAME_BUFFER)).await;
            (session, result)
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished(), "emit should wait for buffer space");
        pending
    }

    #[tokio::test]
    async fn blocked_emit_aborts_when_the_body_is_dropped() {
        let (session, response) = StreamSession::open(ENABLED).unwrap();
        let pending = blocked_emit(session).await;

        drop(response);
        let (session, result) = tokio::time::timeout(Duration::from_secs(5), pending)
            .await
            .expect("emit did not abort")
            .unwrap();

        assert_eq!(result.unwrap(), Emit::Suppressed);
        assert_eq!(session.state(), SessionState::Broken);
    }

    #[tokio::test]
    async fn blocked_emit_aborts_on_cancellation() {
        let (session, _response) = StreamSession::open(ENABLED).unwrap();
        let cancellation = session.cancellation();
        let pending = blocked_emit(session).await;

        cancellation.cancel();
        let (session, result) = tokio::time::timeout(Duration::from_secs(5), pending)
            .await
            .expect("emit did not abort")
            .unwrap();

        assert_eq!(result.unwrap(), Emit::Suppressed);
        assert_eq!(session.state(), SessionState::Broken);
    }

    #[tokio::test]
    async fn dropping_an_active_session_ends_the_body() {
        let (mut session, response) = StreamSession::open(ENABLED).unwrap();
        let start = StreamEvent::Start {
            prompt: "hello".to_string(),
        };
        session.emit(start.clone()).await.unwrap();
        drop(session);

        assert_eq!(body_events(response).await, vec![start]);
    }
}
