use serde::Deserialize;

/// Top-level configuration settings for the relay.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server: ServerSettings,
    pub amqp: AmqpSettings,
    pub log: LogSettings,
}

/// Where the WebSocket server listens.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// How to reach the broker.
///
/// `connect_timeout_secs` bounds the whole setup protocol; `None` waits
/// indefinitely.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AmqpSettings {
    pub uri: String,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub amqp: Option<PartialAmqpSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialAmqpSettings {
    pub uri: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            amqp: AmqpSettings {
                uri: "amqp://localhost".to_string(),
                connect_timeout_secs: None,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Overlay the values that were provided on top of `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let server = self.server.unwrap_or(PartialServerSettings {
            host: None,
            port: None,
        });
        let amqp = self.amqp.unwrap_or(PartialAmqpSettings {
            uri: None,
            connect_timeout_secs: None,
        });
        let log = self.log.unwrap_or(PartialLogSettings { level: None });

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(default.server.host),
                port: server.port.unwrap_or(default.server.port),
            },
            amqp: AmqpSettings {
                uri: amqp.uri.unwrap_or(default.amqp.uri),
                connect_timeout_secs: amqp
                    .connect_timeout_secs
                    .or(default.amqp.connect_timeout_secs),
            },
            log: LogSettings {
                level: log.level.unwrap_or(default.log.level),
            },
        }
    }
}
