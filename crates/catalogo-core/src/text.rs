//! Text folding shared by the fallback scan and course similarity.

/// Lowercases text and strips diacritics from Latin letters, approximating
/// the folding done by the FTS5 `unicode61` tokenizer.
///
/// Covers the Latin-1 Supplement and Latin Extended-A letters with a plain
/// base letter. Other scripts and combining marks are left as they are,
/// where `unicode61` would still remove the marks.
///
/// # Examples
///
/// ```
/// use catalogo_core::text::fold;
///
/// assert_eq!(fold("Programación Básica"), "programacion basica");
/// ```
pub fn fold(text: &str) -> String {
    text.to_lowercase().chars().map(fold_accent).collect()
}

/// Folds text and splits it into alphanumeric tokens, the way `unicode61`
/// separates tokens.
///
/// # Examples
///
/// ```
/// use catalogo_core::text::fold_tokens;
///
/// assert_eq!(fold_tokens("Diseño UX/UI, 2da edición"), ["diseno", "ux", "ui", "2da", "edicion"]);
/// ```
pub fn fold_tokens(text: &str) -> Vec<String> {
    fold(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether `needle` occurs in `haystack` as a contiguous run of tokens.
/// An empty needle never matches.
pub fn contains_tokens(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle)
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
        'ď' => 'd',
        'é' | 'è' | 'ë' | 'ê' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => 'g',
        'ĥ' => 'h',
        'í' | 'ì' | 'ï' | 'î' | 'ĩ' | 'ī' | 'ĭ' | 'į' => 'i',
        'ĵ' => 'j',
        'ķ' => 'k',
        'ĺ' | 'ļ' | 'ľ' => 'l',
        'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' | 'ō' | 'ŏ' | 'ő' => 'o',
        'ŕ' | 'ŗ' | 'ř' => 'r',
        'ś' | 'ŝ' | 'ş' | 'š' => 's',
        'ţ' | 'ť' => 't',
        'ú' | 'ù' | 'ü' | 'û' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
        'ŵ' => 'w',
        'ý' | 'ÿ' | 'ŷ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        other => other,
    }
}
