use friendscan_core::FindingSet;

pub const NOTHING_FOUND: &str = "Congratulations, nobody has removed you from their contacts.";
pub const DECLINED: &str = "Fine, the list stays hidden. Whoever they are, they are not worth it.";

/// Header, one finding per line, closing rule.
pub fn render_findings(findings: &FindingSet) -> Vec<String> {
    let mut lines = Vec::with_capacity(findings.len() + 2);
    lines.push(format!(
        "{} contact(s) no longer have you as a friend:",
        findings.len()
    ));
    lines.extend(findings.iter().map(|entry| format!("  {}", entry)));
    lines.push("-".repeat(40));
    lines
}

pub fn confirmation_prompt(findings: &FindingSet) -> String {
    format!(
        "Found {} contact(s) who removed you. Show the list?",
        findings.len()
    )
}
