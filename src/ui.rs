//! Interface de terminal do dispatcher: barra de progresso e resumo colorido.
//!
//! Usa `indicatif` para a barra de progresso dos envios e `console` para
//! estilização com cores. O [`DispatchProgress`] é compartilhado entre todas
//! as unidades de trabalho de um episódio.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::pipeline::EpisodeReport;

/// Barra de progresso dos envios de um episódio.
///
/// Clonar é barato: todas as cópias atualizam a mesma barra. Quando
/// desabilitada, a barra fica oculta e as chamadas não fazem nada visível.
#[derive(Clone)]
pub struct DispatchProgress {
    pb: ProgressBar,
}

impl DispatchProgress {
    /// Cria a barra para `total` envios.
    pub fn new(total: usize, enabled: bool) -> Self {
        if !enabled {
            return Self {
                pb: ProgressBar::hidden(),
            };
        }

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} pushes ({elapsed})")
                .expect("invalid template")
                .progress_chars("=> "),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { pb }
    }

    /// Registra um envio concluído (com sucesso ou não).
    pub fn tick(&self) {
        self.pb.inc(1);
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

/// Imprime o resumo final do episódio.
///
/// Verde quando tudo foi entregue, amarelo quando houve falhas, e cinza
/// quando não havia notícias novas.
pub fn print_report(report: &EpisodeReport) {
    let green = Style::new().green().bold();
    let yellow = Style::new().yellow().bold();
    let dim = Style::new().dim();

    if report.new_items == 0 {
        println!("  {} No new news since last run", dim.apply_to("·"));
        return;
    }

    let (mark, style) = if report.failed == 0 {
        ("✓", &green)
    } else {
        ("!", &yellow)
    };
    println!(
        "  {} {} new item(s) × {} recipient(s): {} delivered, {} failed",
        style.apply_to(mark),
        report.new_items,
        report.recipients,
        report.delivered,
        report.failed,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_progress_still_counts() {
        let progress = DispatchProgress::new(3, false);
        let clone = progress.clone();
        progress.tick();
        clone.tick();
        assert_eq!(progress.pb.position(), 2);
        progress.finish();
    }
}
