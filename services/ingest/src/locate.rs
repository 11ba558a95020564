use crate::logger::IngestLogger;

/// First sheet whose lowercased name contains a pattern.
///
/// Patterns are tried in priority order and, within a pattern, sheets in
/// workbook order, so `["dashboard", "2025"]` prefers "Dashboard 2025" over
/// an earlier "Budget 2025".
pub fn pick_sheet<'a, S: AsRef<str>>(
    sheet_names: &'a [S],
    patterns: &[String],
    logger: &dyn IngestLogger,
) -> Option<&'a str> {
    let lowered: Vec<String> = sheet_names
        .iter()
        .map(|name| name.as_ref().to_lowercase())
        .collect();

    for pattern in patterns {
        let pattern_lower = pattern.to_lowercase();
        if pattern_lower.is_empty() {
            continue;
        }
        if let Some(idx) = lowered.iter().position(|name| name.contains(&pattern_lower)) {
            let actual = sheet_names[idx].as_ref();
            logger.info(&format!("Found sheet '{actual}' matching pattern '{pattern}'"));
            return Some(actual);
        }
    }

    logger.warn(&format!("No sheet found matching patterns: {patterns:?}"));
    None
}
