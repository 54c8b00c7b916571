//! Interface de linha de comando do dispatcher baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, status)
//! e flags globais (--config, --concurrency, --verbose, --log-json).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Envia as notícias novas para todos os dispositivos registrados via APNs.
#[derive(Debug, Parser)]
#[command(name = "apns-dispatcher", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./dispatcher.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Número máximo de envios simultâneos.
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Habilita logs de depuração.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Emite logs em JSON, uma linha por evento.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Executa um episódio de envio.
    Run {
        /// Apenas registra os alertas nos logs, sem falar com o APNs.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Mostra o watermark armazenado no registro.
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from(["apns-dispatcher", "run"]);
        assert!(matches!(cli.command, Command::Run { dry_run: false }));
    }

    #[test]
    fn cli_parses_dry_run() {
        let cli = Cli::parse_from(["apns-dispatcher", "run", "--dry-run"]);
        assert!(matches!(cli.command, Command::Run { dry_run: true }));
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "apns-dispatcher",
            "--config",
            "/etc/dispatcher.toml",
            "--concurrency",
            "5",
            "--verbose",
            "--log-json",
            "status",
        ]);
        assert!(cli.verbose);
        assert!(cli.log_json);
        assert_eq!(cli.concurrency, Some(5));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/dispatcher.toml")));
        assert!(matches!(cli.command, Command::Status));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
