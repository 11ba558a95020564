use std::collections::BTreeMap;

/// Lowercases and trims each label, then maps it through the alias table.
/// Labels without an alias come back lowercased and trimmed.
pub fn normalize_columns<S: AsRef<str>>(
    labels: &[S],
    aliases: &BTreeMap<String, String>,
) -> Vec<String> {
    labels
        .iter()
        .map(|label| {
            let key = label.as_ref().trim().to_lowercase();
            aliases.get(&key).cloned().unwrap_or(key)
        })
        .collect()
}
