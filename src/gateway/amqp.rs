//! AMQP gateway
//!
//! Connects to a RabbitMQ-compatible broker and runs the setup protocol in
//! order: connection, channel, non-durable fanout exchange `messages`,
//! exclusive server-named queue, empty-key binding, auto-ack consumer. Any
//! failing step aborts setup with a `GatewayError`.
//!
//! After setup two background tasks run:
//! - the publisher drains an unbounded queue and hands each body to the
//!   exchange in call order, without waiting for broker confirmation;
//! - the consumer feeds every delivery to the receive handler.
//!
//! There is no reconnection. When the connection reports an error or the
//! consumer stream ends, the gateway flags itself lost (see
//! [`AmqpGateway::wait_lost`]) and the owner is expected to shut down.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{EXCHANGE_NAME, Gateway, HandlerSlot, ReceiveHandler};
use crate::config::AmqpSettings;
use crate::relay::message::Message;
use crate::utils::error::GatewayError;

pub struct AmqpGateway {
    connection: Connection,
    queue: String,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    handler: HandlerSlot,
    lost: watch::Receiver<bool>,
}

fn step(step: &'static str) -> impl FnOnce(lapin::Error) -> GatewayError {
    move |source| GatewayError::Channel { step, source }
}

impl AmqpGateway {
    /// Run the setup protocol against `settings.uri`, bounded by
    /// `settings.connect_timeout_secs` when set.
    pub async fn connect(settings: &AmqpSettings) -> Result<Self, GatewayError> {
        match settings.connect_timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), Self::setup(&settings.uri))
                .await
                .map_err(|_| GatewayError::SetupTimeout(secs))?,
            None => Self::setup(&settings.uri).await,
        }
    }

    async fn setup(address: &str) -> Result<Self, GatewayError> {
        let connection = Connection::connect(address, ConnectionProperties::default())
            .await
            .map_err(|source| GatewayError::TransportConnect {
                address: address.to_string(),
                source,
            })?;

        let channel = connection
            .create_channel()
            .await
            .map_err(step("opening a channel"))?;

        channel
            .exchange_declare(
                EXCHANGE_NAME,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions {
                    durable: false,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(step("declaring the exchange"))?;

        let queue = channel
            .queue_declare(
                "",
                QueueDeclareOptions {
                    exclusive: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(step("declaring the queue"))?;
        let queue = queue.name().as_str().to_string();

        channel
            .queue_bind(
                &queue,
                EXCHANGE_NAME,
                "",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(step("binding the queue"))?;

        let consumer = channel
            .basic_consume(
                &queue,
                &format!("relaychat-{}", Uuid::new_v4()),
                BasicConsumeOptions {
                    no_ack: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(step("starting the consumer"))?;

        info!(exchange = EXCHANGE_NAME, queue = %queue, "Broker gateway ready");

        let (lost_tx, lost) = watch::channel(false);
        let lost_tx = Arc::new(lost_tx);
        {
            let lost_tx = Arc::clone(&lost_tx);
            connection.on_error(move |e| {
                error!(error = %e, "Broker connection error");
                lost_tx.send_replace(true);
            });
        }

        let handler = HandlerSlot::new();
        let deliveries = consumer.map(|delivery| delivery.map(|delivery| delivery.data));
        tokio::spawn(consume(deliveries, handler.clone(), lost_tx));

        let (outbound, rx) = mpsc::unbounded_channel();
        tokio::spawn(publish_loop(channel, rx));

        Ok(Self {
            connection,
            queue,
            outbound,
            handler,
            lost,
        })
    }

    /// Resolves once the broker connection is gone.
    pub async fn wait_lost(&self) {
        lost_signal(self.lost.clone()).await;
    }

    /// Close the connection; the exclusive queue is deleted by the broker.
    pub async fn close(&self) {
        if let Err(e) = self.connection.close(200, "shutting down").await {
            debug!(error = %e, "Broker connection already closed");
        }
    }
}

impl Gateway for AmqpGateway {
    fn publish(&self, message: &Message) {
        let body = match message.to_bytes() {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Dropping message that failed to encode");
                return;
            }
        };
        if self.outbound.send(body).is_err() {
            warn!("Broker publisher stopped, dropping message");
        }
    }

    fn set_receive_handler(&self, handler: ReceiveHandler) {
        self.handler.replace(handler);
    }
}

impl std::fmt::Debug for AmqpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpGateway")
            .field("queue", &self.queue)
            .field("lost", &*self.lost.borrow())
            .finish()
    }
}

async fn publish_loop(channel: Channel, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(body) = rx.recv().await {
        // Fire-and-forget: the returned confirmation is not awaited.
        if let Err(e) = channel
            .basic_publish(
                EXCHANGE_NAME,
                "",
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default(),
            )
            .await
        {
            let e = GatewayError::Publish(e);
            warn!(error = %e, "Message not published");
        }
    }
    debug!("Broker publisher stopped");
}

/// Resolves once `lost` flips to true or its sender is gone.
pub(super) async fn lost_signal(mut lost: watch::Receiver<bool>) {
    // Err means every sender is gone, which counts as lost too.
    let _ = lost.wait_for(|lost| *lost).await;
}

/// Feed delivery bodies to `handler` until the stream fails or ends, then
/// flag the connection lost.
pub(super) async fn consume<S, E>(
    mut deliveries: S,
    handler: HandlerSlot,
    lost: Arc<watch::Sender<bool>>,
) where
    S: Stream<Item = Result<Vec<u8>, E>> + Unpin,
    E: std::fmt::Display,
{
    while let Some(delivery) = deliveries.next().await {
        match delivery {
            Ok(body) => {
                handler.deliver(&body);
            }
            Err(e) => {
                error!(error = %e, "Broker consumer failed");
                break;
            }
        }
    }
    warn!("Broker consumer stopped");
    lost.send_replace(true);
}
