use crate::models::FileRecord;

/// Keeps files whose name contains any of `terms`, ignoring case.
///
/// With no terms every file is kept. Order is preserved.
pub fn filter_files(files: &[FileRecord], terms: &[String]) -> Vec<FileRecord> {
    let terms: Vec<String> = terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .collect();
    if terms.is_empty() {
        return files.to_vec();
    }

    files
        .iter()
        .filter(|f| {
            let name = f.name.to_lowercase();
            terms.iter().any(|t| name.contains(t.as_str()))
        })
        .cloned()
        .collect()
}

/// Splits a comma-separated search string into terms, dropping empty ones.
pub fn parse_terms(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
