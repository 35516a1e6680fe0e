//! WebSocket connection abstraction
//!
//! [`Connector`] opens connections; [`Connection`] yields text frames and
//! accepts outbound text. The production implementation uses
//! tokio-tungstenite.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use log::debug;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::RealtimeError;

/// What a connection produced next
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    /// Server closed the connection, with its close code if it sent one
    Closed(Option<u16>),
    Error(String),
}

#[async_trait]
pub trait Connection: Send {
    /// Next inbound frame. Must be cancel-safe.
    async fn next_frame(&mut self) -> Frame;

    async fn send_text(&mut self, text: String) -> Result<(), RealtimeError>;

    /// Client-initiated close
    async fn close(&mut self);
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, RealtimeError>;
}

/// tokio-tungstenite connector that authenticates with the API token
pub struct WsConnector {
    token: Option<String>,
}

impl WsConnector {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, RealtimeError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| RealtimeError::InvalidUrl(e.to_string()))?;

        if let Some(ref token) = self.token {
            let value = HeaderValue::from_str(&format!("Token {}", token))
                .map_err(|e| RealtimeError::Connect(e.to_string()))?;
            request.headers_mut().insert("Authorization", value);
        }

        let (stream, response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RealtimeError::Connect(e.to_string()))?;
        debug!("WebSocket handshake complete: {}", response.status());

        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WsConnection {
    async fn next_frame(&mut self) -> Frame {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Frame::Text(text.to_string()),
                Some(Ok(Message::Close(frame))) => {
                    return Frame::Closed(frame.map(|f| u16::from(f.code)));
                }
                // Pings are answered by tungstenite; binary frames are not part of the protocol
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Frame::Error(e.to_string()),
                None => return Frame::Closed(None),
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), RealtimeError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| RealtimeError::Transport(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("Error while closing WebSocket: {}", e);
        }
    }
}

#[cfg(test)]
pub mod scripted {
    //! Scripted connector for channel tests

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use tokio::sync::mpsc;
    use tokio::time::Instant;

    use super::*;

    /// One connection attempt's outcome
    pub enum Session {
        /// Connection attempt fails
        Refuse,
        /// Connection opens and yields these frames. Without a trailing
        /// close it then stays open.
        Frames(Vec<Frame>),
        /// Connection opens and yields whatever the test pushes
        Live(mpsc::UnboundedReceiver<Frame>),
    }

    #[derive(Default)]
    pub struct ScriptedConnector {
        sessions: Mutex<VecDeque<Session>>,
        attempts: Mutex<Vec<Instant>>,
        sent: Arc<Mutex<Vec<String>>>,
        closed_by_client: Arc<Mutex<usize>>,
    }

    impl ScriptedConnector {
        pub fn new(sessions: Vec<Session>) -> Self {
            Self {
                sessions: Mutex::new(sessions.into()),
                ..Default::default()
            }
        }

        pub fn attempts(&self) -> Vec<Instant> {
            self.attempts.lock().map(|a| a.clone()).unwrap_or_default()
        }

        pub fn sent(&self) -> Vec<String> {
            self.sent.lock().map(|s| s.clone()).unwrap_or_default()
        }

        pub fn client_closes(&self) -> usize {
            self.closed_by_client.lock().map(|c| *c).unwrap_or(0)
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self, _url: &str) -> Result<Box<dyn Connection>, RealtimeError> {
            if let Ok(mut attempts) = self.attempts.lock() {
                attempts.push(Instant::now());
            }
            let session = self
                .sessions
                .lock()
                .ok()
                .and_then(|mut s| s.pop_front())
                .unwrap_or(Session::Refuse);

            let source = match session {
                Session::Refuse => {
                    return Err(RealtimeError::Connect("connection refused".to_string()));
                }
                Session::Frames(frames) => Source::Frames(frames.into()),
                Session::Live(rx) => Source::Live(rx),
            };
            Ok(Box::new(ScriptedConnection {
                source,
                sent: self.sent.clone(),
                closed_by_client: self.closed_by_client.clone(),
            }))
        }
    }

    enum Source {
        Frames(VecDeque<Frame>),
        Live(mpsc::UnboundedReceiver<Frame>),
    }

    struct ScriptedConnection {
        source: Source,
        sent: Arc<Mutex<Vec<String>>>,
        closed_by_client: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl Connection for ScriptedConnection {
        async fn next_frame(&mut self) -> Frame {
            match self.source {
                Source::Frames(ref mut frames) => match frames.pop_front() {
                    Some(frame) => frame,
                    None => futures::future::pending().await,
                },
                Source::Live(ref mut rx) => match rx.recv().await {
                    Some(frame) => frame,
                    None => futures::future::pending().await,
                },
            }
        }

        async fn send_text(&mut self, text: String) -> Result<(), RealtimeError> {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(text);
            }
            Ok(())
        }

        async fn close(&mut self) {
            if let Ok(mut closes) = self.closed_by_client.lock() {
                *closes += 1;
            }
        }
    }
}
