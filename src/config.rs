//! Configuração do dispatcher carregada a partir de `dispatcher.toml`.
//!
//! A struct [`DispatcherConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! Variáveis de ambiente têm precedência sobre o arquivo, e os segredos
//! (`TOKEN_LIST_PWD`, `APNS_PRIVATE_KEY`, `APNS_KEY_ID`, `APNS_TEAM_ID`)
//! normalmente vêm apenas do ambiente.

use serde::Deserialize;
use std::path::Path;

use crate::apns::{ApnsCredentials, ApnsEnvironment};
use crate::error::{DispatcherError, Result};

/// Caminho padrão do arquivo de configuração, relativo ao diretório atual.
pub const DEFAULT_CONFIG_PATH: &str = "dispatcher.toml";

/// Configuração de nível superior carregada de `dispatcher.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherConfig {
    /// URL base do serviço de registro (watermark e lista de tokens).
    #[serde(default = "default_registry_url")]
    pub registry_url: String,

    /// URL do feed de notícias, ordenado da mais recente para a mais antiga.
    #[serde(default)]
    pub news_url: String,

    /// Máximo de envios executando ao mesmo tempo.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Tentativas por requisição ao registro/feed antes de abortar.
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,

    /// Watermarks abaixo deste valor são tratados como corrompidos.
    #[serde(default = "default_min_watermark")]
    pub min_watermark: f64,

    /// Timeout total de cada requisição HTTP, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Senha usada para decifrar os tokens de dispositivo.
    #[serde(default)]
    pub token_secret: String,

    /// Parâmetros de entrega via APNs.
    #[serde(default)]
    pub apns: ApnsSettings,
}

/// Seção `[apns]` do arquivo de configuração.
#[derive(Debug, Clone, Deserialize)]
pub struct ApnsSettings {
    /// Bundle id do app que recebe as notificações.
    #[serde(default = "default_topic")]
    pub topic: String,

    /// `production` ou `sandbox`.
    #[serde(default)]
    pub environment: ApnsEnvironment,

    #[serde(default)]
    pub key_id: String,

    #[serde(default)]
    pub team_id: String,

    /// Chave privada `.p8` em formato PEM.
    #[serde(default)]
    pub private_key: String,
}

fn default_registry_url() -> String {
    "https://api.push.greatdori.memz.top".to_string()
}

// Valor padrão de concorrência: 30 envios simultâneos.
fn default_concurrency() -> usize {
    30
}

fn default_fetch_attempts() -> u32 {
    10
}

fn default_min_watermark() -> f64 {
    100.0
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_topic() -> String {
    "com.memz233.Greatdori".to_string()
}

impl Default for ApnsSettings {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            environment: ApnsEnvironment::default(),
            key_id: String::new(),
            team_id: String::new(),
            private_key: String::new(),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            registry_url: default_registry_url(),
            news_url: String::new(),
            concurrency: default_concurrency(),
            fetch_attempts: default_fetch_attempts(),
            min_watermark: default_min_watermark(),
            request_timeout_secs: default_request_timeout_secs(),
            token_secret: String::new(),
            apns: ApnsSettings::default(),
        }
    }
}

impl DispatcherConfig {
    /// Carrega a configuração e aplica as variáveis de ambiente.
    ///
    /// Sem `path`, lê `dispatcher.toml` do diretório atual e usa os valores
    /// padrão se o arquivo não existir. Um `path` explícito precisa existir.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str::<DispatcherConfig>(&contents)?)
    }

    /// Sobrescreve campos com valores do ambiente. Valores vazios são ignorados.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |key: &str| var(key).filter(|v| !v.is_empty());

        if let Some(url) = var("DISPATCHER_REGISTRY_URL") {
            self.registry_url = url;
        }
        if let Some(url) = var("DISPATCHER_NEWS_URL") {
            self.news_url = url;
        }
        if let Some(raw) = var("DISPATCHER_CONCURRENCY") {
            self.concurrency = raw.parse().map_err(|_| {
                DispatcherError::Config(format!("DISPATCHER_CONCURRENCY must be a valid usize, got {raw:?}"))
            })?;
        }
        if let Some(secret) = var("TOKEN_LIST_PWD") {
            self.token_secret = secret;
        }
        if let Some(key) = var("APNS_PRIVATE_KEY") {
            self.apns.private_key = key;
        }
        if let Some(id) = var("APNS_KEY_ID") {
            self.apns.key_id = id;
        }
        if let Some(id) = var("APNS_TEAM_ID") {
            self.apns.team_id = id;
        }
        Ok(())
    }

    /// Rejeita combinações que tornariam o episódio impossível.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(DispatcherError::Config("concurrency must be at least 1".into()));
        }
        if self.fetch_attempts == 0 {
            return Err(DispatcherError::Config("fetch_attempts must be at least 1".into()));
        }
        if self.registry_url.trim().is_empty() {
            return Err(DispatcherError::Config("registry_url must be set".into()));
        }
        if self.news_url.trim().is_empty() {
            return Err(DispatcherError::Config(
                "news_url must be set (or DISPATCHER_NEWS_URL)".into(),
            ));
        }
        Ok(())
    }

    pub fn require_token_secret(&self) -> Result<&str> {
        if self.token_secret.is_empty() {
            return Err(DispatcherError::MissingSecret("TOKEN_LIST_PWD"));
        }
        Ok(&self.token_secret)
    }

    /// Credenciais JWT do APNs; todas as três são obrigatórias.
    pub fn require_apns(&self) -> Result<ApnsCredentials> {
        if self.apns.private_key.is_empty() {
            return Err(DispatcherError::MissingSecret("APNS_PRIVATE_KEY"));
        }
        if self.apns.key_id.is_empty() {
            return Err(DispatcherError::MissingSecret("APNS_KEY_ID"));
        }
        if self.apns.team_id.is_empty() {
            return Err(DispatcherError::MissingSecret("APNS_TEAM_ID"));
        }
        Ok(ApnsCredentials {
            private_key_pem: self.apns.private_key.clone(),
            key_id: self.apns.key_id.clone(),
            team_id: self.apns.team_id.clone(),
        })
    }
}
