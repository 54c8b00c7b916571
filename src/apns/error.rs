//! Tipos de erro para o cliente APNs.
//!
//! Define [`ApnsError`] com variantes para rejeições do APNs, falhas de
//! rede e problemas com a chave de assinatura. Usa `thiserror` para derivar
//! `Display` e `Error` a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer ao entregar uma notificação pelo APNs.
///
/// - [`Rejected`](ApnsError::Rejected): o APNs respondeu com status diferente de 2xx
/// - [`Network`](ApnsError::Network): falha na camada de rede
/// - [`InvalidKey`](ApnsError::InvalidKey) / [`Signing`](ApnsError::Signing): problema com a chave `.p8`
#[derive(Debug, Error)]
pub enum ApnsError {
    /// O APNs recusou a notificação. `reason` vem do corpo JSON da resposta
    /// (ex.: `BadDeviceToken`, `Unregistered`, `TooManyRequests`).
    #[error("APNs rejected notification (status {status}): {reason}")]
    Rejected { status: u16, reason: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A chave privada não é uma chave EC PKCS#8 válida.
    #[error("invalid APNs signing key: {0}")]
    InvalidKey(jsonwebtoken::errors::Error),

    /// Falha ao assinar o token de provedor.
    #[error("failed to sign provider token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}
