use crate::batch::UnitFailure;
use crate::pipeline::HandAnalysis;
use crate::views::ViewMatrix;
use crate::weighting::WeightBasis;
use itertools::Itertools;
use std::fmt::Write;

const SHADES: [char; 4] = ['░', '▒', '▓', '█'];
const UNDEFINED: &str = " · ";

/// Three-character heatmap cell: sign plus a shade doubled for visibility.
///
/// The scale is symmetric around zero, so the same shade means the same magnitude of
/// benefit (`+`) or harm (`-`).
pub fn glyph(value: Option<f64>, limit: f64) -> String {
    let Some(value) = value else {
        return UNDEFINED.to_string();
    };
    let ratio = (value / limit).clamp(-1.0, 1.0);
    let level = (ratio.abs() * SHADES.len() as f64).ceil() as usize;
    if level == 0 {
        return " 0 ".to_string();
    }
    let shade = SHADES[level.min(SHADES.len()) - 1];
    let sign = if ratio > 0.0 { '+' } else { '-' };
    format!("{sign}{shade}{shade}")
}

/// Renders one view as a glyph grid with `P1..Pn` column codes.
pub fn render_view(view: &ViewMatrix) -> String {
    let limit = view.color_limit();
    let label_width = view
        .row_labels
        .iter()
        .map(|label| label.chars().count())
        .max()
        .unwrap_or(0)
        .max("condition".len());

    let mut out = String::new();
    let _ = writeln!(out, "{}", view.kind.title());
    let header = (1..=view.columns.len()).map(|code| format!("{:>4}", format!("P{code}"))).join("");
    let _ = writeln!(out, "  {:<label_width$} {header}", "condition");

    for (row, label) in view.row_labels.iter().enumerate() {
        let marker = if view.highlighted_row == Some(row) { '*' } else { ' ' };
        let cells = view
            .values
            .row(row)
            .iter()
            .map(|&cell| format!(" {}", glyph(cell, limit)))
            .join("");
        let suffix = if row == view.baseline_row { "  (baseline)" } else { "" };
        let _ = writeln!(out, "{marker} {label:<label_width$} {cells}{suffix}");
    }

    let _ = writeln!(out, "  scale: ±{limit:.4} per full shade, · = not measured");
    out
}

fn basis_note(basis: WeightBasis) -> &'static str {
    match basis {
        WeightBasis::DataDriven => "data-driven responsiveness weights",
        WeightBasis::Regularized => "responsiveness weights shrunk toward uniform",
        WeightBasis::UniformFallback => "uniform weights (no parameter varied)",
    }
}

fn render_hand(out: &mut String, analysis: &HandAnalysis) {
    let hand = analysis.unit.hand;
    let _ = writeln!(out, "{hand} hand, baseline '{}'", analysis.baseline.label());
    let _ = writeln!(out, "{}", "-".repeat(72));
    let _ = writeln!(out, "Scored with {}.", basis_note(analysis.weights.basis()));
    if !analysis.dropped.is_empty() {
        let names = analysis
            .dropped
            .iter()
            .map(|d| d.reason.raw.as_str())
            .unique()
            .join(", ");
        let _ = writeln!(out, "Unrecognized parameters ignored: {names}");
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Ranking");
    let _ = writeln!(out, "  {:>4}  {:<28} {:>10} {:>9}", "rank", "condition", "DWIS", "coverage");
    for entry in analysis.ranking.entries() {
        let coverage = analysis
            .scores
            .entries()
            .iter()
            .find(|s| s.condition == entry.condition)
            .map_or(0.0, |s| s.coverage);
        let _ = writeln!(
            out,
            "  {:>4}  {:<28} {:>+10.4} {:>9.2}",
            entry.rank,
            entry.condition.label(),
            entry.score,
            coverage
        );
    }
    let _ = writeln!(out);

    out.push_str(&render_view(&analysis.views.engineering));
    let _ = writeln!(out);
    out.push_str(&render_view(&analysis.views.clinical));
    let _ = writeln!(out);

    let _ = writeln!(out, "Parameters (clinical order)");
    for (code, (parameter, weight)) in analysis
        .views
        .clinical
        .columns
        .iter()
        .zip(&analysis.views.clinical.column_weights)
        .enumerate()
    {
        let _ = writeln!(
            out,
            "  P{:<3} {:<26} weight {:.3}  ({})",
            code + 1,
            parameter.display_name(),
            weight,
            parameter.polarity().describe()
        );
    }
    let _ = writeln!(out, "  Engineering view columns use canonical order:");
    let canonical = analysis
        .views
        .engineering
        .columns
        .iter()
        .enumerate()
        .map(|(code, p)| format!("P{}={}", code + 1, p.canonical_name()))
        .join(" ");
    let _ = writeln!(out, "  {canonical}");
    let _ = writeln!(out);
}

/// The full plain-text document for one patient: one section per analyzed hand and a
/// note for every hand that could not be analyzed.
pub fn render_patient_report(
    patient_id: &str,
    analyses: &[&HandAnalysis],
    failures: &[&UnitFailure],
) -> String {
    let mut out = String::new();
    let title = format!("Kinematic improvement report, patient {patient_id}");
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "=".repeat(title.chars().count()));
    let _ = writeln!(
        out,
        "Engineering view: acquisition order. Clinical view: best setting first, most responsive parameter first."
    );
    let _ = writeln!(out, "Positive cells are improvement over baseline, * marks the best setting.");
    let _ = writeln!(out);

    for analysis in analyses {
        render_hand(&mut out, analysis);
    }
    for failure in failures {
        let _ = writeln!(out, "{} hand not analyzed: {}", failure.unit.hand, failure.error);
    }
    out
}
