use crate::types::report::MatchReport;

pub fn to_markdown(report: &MatchReport) -> String {
    let mut output = String::new();
    output.push_str("# Compatibility Results\n\n");
    if let Some(reference) = &report.reference {
        output.push_str(&format!("Reference: {}\n\n", reference));
    }

    output.push_str("## Ranking\n\n");
    if report.ranking.is_empty() {
        output.push_str("- none\n");
        return output;
    }
    for candidate in &report.ranking {
        output.push_str(&format!(
            "{}. {}: {}% ({}, confidence {:.2}){}\n",
            candidate.rank,
            candidate.label,
            candidate.percentage,
            candidate.category,
            candidate.confidence,
            if candidate.degraded { " [degraded]" } else { "" }
        ));
    }

    if report.has_degraded() {
        output.push_str(
            "\nSome photos could not be classified and were scored as portraits.\n",
        );
    }
    output
}
