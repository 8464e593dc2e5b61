//! Server startup and shutdown.
//!
//! The broker gateway must be fully set up before the listener is bound, so
//! no client can send a message that would be published into nothing. A
//! setup failure is returned to the caller as fatal.

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Settings;
use crate::gateway::{AmqpGateway, Gateway};
use crate::registry::ConnectionRegistry;
use crate::relay::RelayController;
use crate::transport;
use crate::utils::error::{AppError, GatewayError};

/// Run the relay until Ctrl-C or until the broker connection is lost.
pub async fn run(settings: Settings) -> Result<(), AppError> {
    info!(broker = %settings.amqp.uri, "Connecting to broker");
    let gateway = Arc::new(AmqpGateway::connect(&settings.amqp).await?);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = transport::bind(&addr).await?;

    let outcome = serve_until(
        listener,
        gateway.clone(),
        gateway.wait_lost(),
        tokio::signal::ctrl_c(),
    )
    .await;

    gateway.close().await;
    outcome
}

/// Relay clients on `listener` through `gateway` until `lost` or `shutdown`
/// resolves. A lost broker is an error; a shutdown is not.
pub async fn serve_until<L, S>(
    listener: TcpListener,
    gateway: Arc<dyn Gateway>,
    lost: L,
    shutdown: S,
) -> Result<(), AppError>
where
    L: Future<Output = ()>,
    S: Future,
{
    let registry = Arc::new(ConnectionRegistry::new());
    let relay = Arc::new(RelayController::new(gateway, registry));

    tokio::select! {
        _ = transport::serve(listener, relay) => Ok(()),
        _ = lost => {
            error!("Broker connection lost, shutting down");
            Err(GatewayError::ConnectionLost.into())
        }
        _ = shutdown => {
            info!("Shutdown signal received. Exiting gracefully.");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::oneshot;
    use tokio::time::timeout;
    use tokio_tungstenite::connect_async;

    use super::{run, serve_until};
    use crate::config::Settings;
    use crate::gateway::MemoryExchange;
    use crate::transport;
    use crate::utils::error::{AppError, GatewayError};

    #[tokio::test]
    async fn test_unreachable_broker_is_fatal_before_listening() {
        let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let broker_port = reserved.local_addr().unwrap().port();
        drop(reserved);
        let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let server_port = reserved.local_addr().unwrap().port();
        drop(reserved);

        let mut settings = Settings::default();
        settings.amqp.uri = format!("amqp://127.0.0.1:{broker_port}");
        settings.amqp.connect_timeout_secs = Some(10);
        settings.server.port = server_port;

        let result = run(settings).await;
        assert!(matches!(
            result,
            Err(AppError::Gateway(GatewayError::TransportConnect { .. }))
        ));

        // Nothing was bound on the server port.
        assert!(std::net::TcpStream::connect(("127.0.0.1", server_port)).is_err());
    }

    #[tokio::test]
    async fn test_lost_broker_stops_server_with_error() {
        let exchange = MemoryExchange::new();
        let listener = transport::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (lose_broker, broker_lost) = oneshot::channel::<()>();

        let server = tokio::spawn(serve_until(
            listener,
            Arc::new(exchange.bind()),
            async move {
                let _ = broker_lost.await;
            },
            std::future::pending::<()>(),
        ));

        // Serving normally until the broker goes away.
        let (client, _) = connect_async(url.as_str()).await.expect("client connect");
        assert!(!server.is_finished());

        lose_broker.send(()).unwrap();
        let result = timeout(Duration::from_secs(2), server)
            .await
            .expect("server kept running after broker loss")
            .unwrap();
        assert!(matches!(
            result,
            Err(AppError::Gateway(GatewayError::ConnectionLost))
        ));
        drop(client);
    }

    #[tokio::test]
    async fn test_shutdown_stops_server_cleanly() {
        let exchange = MemoryExchange::new();
        let listener = transport::bind("127.0.0.1:0").await.unwrap();

        let result = timeout(
            Duration::from_secs(2),
            serve_until(
                listener,
                Arc::new(exchange.bind()),
                std::future::pending::<()>(),
                async {},
            ),
        )
        .await
        .expect("server ignored shutdown");
        assert!(result.is_ok());
    }
}
