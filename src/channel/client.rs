use anyhow::{Context, Result};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use super::{ChannelConnector, ChannelEvent, ChannelSink, OutboundFrame};

type WsWrite = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Websocket implementation of the channel connector.
pub struct WsConnector;

#[async_trait::async_trait]
impl ChannelConnector for WsConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn ChannelSink>, mpsc::Receiver<ChannelEvent>)> {
        info!(url, "Connecting to transcription channel");

        let (stream, _) = connect_async(url)
            .await
            .with_context(|| format!("failed to connect to {url}"))?;

        let (write, mut read) = stream.split();
        let (event_tx, event_rx) = mpsc::channel(64);

        tokio::spawn(async move {
            loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if event_tx
                            .send(ChannelEvent::Message(text.to_string()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(frame) => (u16::from(frame.code), frame.reason.to_string()),
                            // 1005: no status code present
                            None => (1005, String::new()),
                        };
                        debug!(code, reason, "Channel closed");
                        let _ = event_tx.send(ChannelEvent::Closed { code, reason }).await;
                        break;
                    }
                    // Ping/pong are handled by tungstenite; server binary
                    // frames are not part of the protocol.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let _ = event_tx.send(ChannelEvent::Error(e.to_string())).await;
                        break;
                    }
                    None => {
                        // Connection dropped without a close handshake.
                        let _ = event_tx
                            .send(ChannelEvent::Closed {
                                code: 1006,
                                reason: String::new(),
                            })
                            .await;
                        break;
                    }
                }
            }
        });

        Ok((Box::new(WsSink { write }), event_rx))
    }
}

struct WsSink {
    write: WsWrite,
}

#[async_trait::async_trait]
impl ChannelSink for WsSink {
    async fn send(&mut self, frame: OutboundFrame) -> Result<()> {
        let message = match frame {
            OutboundFrame::Text(text) => Message::Text(text.into()),
            OutboundFrame::Binary(bytes) => Message::Binary(bytes.into()),
        };
        self.write
            .send(message)
            .await
            .context("failed to send channel frame")
    }

    async fn close(&mut self) {
        let _ = self.write.close().await;
    }
}
