//! Tipos de dados para notificações de alerta do APNs.
//!
//! [`AlertNotification`] descreve o que enviar; [`ApnsPayload`] é o corpo
//! JSON no formato esperado pelo endpoint `/3/device/{token}`.

use serde::{Deserialize, Serialize};

use crate::localize::LocalizedBody;

/// Ambiente do APNs ao qual o cliente se conecta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApnsEnvironment {
    #[default]
    Production,
    Sandbox,
}

impl ApnsEnvironment {
    pub fn host(self) -> &'static str {
        match self {
            ApnsEnvironment::Production => "https://api.push.apple.com",
            ApnsEnvironment::Sandbox => "https://api.sandbox.push.apple.com",
        }
    }
}

/// Política de expiração (`apns-expiration`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// Uma única tentativa de entrega; o APNs não armazena a notificação.
    Immediately,
    /// Válida até o instante dado, em segundos desde a época Unix.
    At(i64),
}

impl Expiration {
    pub fn header_value(self) -> String {
        match self {
            Expiration::Immediately => "0".to_string(),
            Expiration::At(ts) => ts.to_string(),
        }
    }
}

/// Prioridade de entrega (`apns-priority`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Entrega imediata (10).
    Immediately,
    /// Entrega respeitando a energia do dispositivo (5).
    ConsideringDevicePower,
}

impl Priority {
    pub fn header_value(self) -> &'static str {
        match self {
            Priority::Immediately => "10",
            Priority::ConsideringDevicePower => "5",
        }
    }
}

/// Uma notificação de alerta pronta para um dispositivo.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertNotification {
    pub title: String,
    /// Corpo localizado; `None` envia apenas o título.
    pub body: Option<LocalizedBody>,
    pub expiration: Expiration,
    pub priority: Priority,
    pub topic: String,
    pub badge: Option<u32>,
    /// Nome do som; `"default"` usa o som padrão do sistema.
    pub sound: Option<String>,
    /// Dados opacos do app, mesclados no nível superior do payload.
    pub custom: serde_json::Map<String, serde_json::Value>,
}

impl AlertNotification {
    pub fn payload(&self) -> ApnsPayload {
        let (loc_key, loc_args) = match &self.body {
            Some(body) => (Some(body.key.to_string()), body.args.clone()),
            None => (None, Vec::new()),
        };
        ApnsPayload {
            aps: Aps {
                alert: Alert {
                    title: self.title.clone(),
                    loc_key,
                    loc_args,
                },
                badge: self.badge,
                sound: self.sound.clone(),
            },
            custom: self.custom.clone(),
        }
    }
}

/// Corpo JSON enviado ao APNs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApnsPayload {
    pub aps: Aps,
    #[serde(flatten)]
    pub custom: serde_json::Map<String, serde_json::Value>,
}

/// Dicionário `aps` reservado pela Apple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aps {
    pub alert: Alert,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
}

/// Conteúdo visível do alerta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    #[serde(rename = "loc-key", skip_serializing_if = "Option::is_none")]
    pub loc_key: Option<String>,
    #[serde(rename = "loc-args", default, skip_serializing_if = "Vec::is_empty")]
    pub loc_args: Vec<String>,
}

/// Corpo de erro devolvido pelo APNs.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub reason: String,
}
