pub mod activity;
pub mod assignment;
pub mod driver;
pub mod order;

/// Folds a stored status label to a comparable key: lowercase, no accents,
/// `_`/`-` as spaces, whitespace collapsed.
pub(crate) fn fold_label(raw: &str) -> String {
    let folded: String = raw
        .trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            '_' | '-' => ' ',
            other => other,
        })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
