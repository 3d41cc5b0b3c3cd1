//! TF-IDF cosine similarity between two course texts.
//!
//! Tokens are lowercased, stripped of Spanish accents and filtered against a
//! Spanish stop-word list. Weights use smooth IDF over the two-document
//! corpus, `ln((1 + n) / (1 + df)) + 1`, and each vector is L2-normalized.

use std::collections::{BTreeMap, HashSet};

use crate::text::fold_tokens;

/// Spanish stop words, stored without accents.
const SPANISH_STOPWORDS: &[&str] = &[
    "a", "al", "algo", "algunas", "algunos", "ante", "antes", "aquel", "aquella", "aquellas",
    "aquellos", "aqui", "asi", "aun", "aunque", "bajo", "bien", "cada", "como", "con", "contra",
    "cual", "cuales", "cuando", "de", "del", "desde", "donde", "dos", "durante", "e", "el", "ella",
    "ellas", "ello", "ellos", "en", "entre", "era", "erais", "eramos", "eran", "eres", "es", "esa",
    "esas", "ese", "eso", "esos", "esta", "estaba", "estabais", "estabamos", "estaban", "estoy",
    "estas", "este", "esto", "estos", "fin", "fue", "fueron", "fuimos", "ha", "haber", "habia",
    "habiais", "habiamos", "habian", "habra", "habran", "habria", "habrian", "han", "hasta", "hay",
    "haya", "he", "hemos", "hizo", "la", "las", "le", "les", "lo", "los", "mas", "me", "mi", "mis",
    "mucho", "muy", "nada", "ni", "no", "nos", "nosotras", "nosotros", "nuestra", "nuestras",
    "nuestro", "nuestros", "o", "os", "otra", "otras", "otro", "otros", "para", "pero", "poco",
    "por", "porque", "que", "quien", "quienes", "se", "sea", "sean", "segun", "ser", "si",
    "siempre", "sin", "sobre", "sois", "solamente", "solo", "somos", "son", "soy", "su", "sus",
    "tal", "tambien", "tampoco", "te", "ti", "tiene", "tienen", "toda", "todas", "todavia", "todo",
    "todos", "tu", "tus", "tuya", "tuyo", "un", "una", "uno", "unos", "usted", "ustedes", "va",
    "vamos", "van", "vosotras", "vosotros", "y", "ya",
];

/// Splits text into lowercase, accent-folded tokens of two or more
/// characters, dropping stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    let stopwords: HashSet<&str> = SPANISH_STOPWORDS.iter().copied().collect();
    fold_tokens(text)
        .into_iter()
        .filter(|token| token.chars().count() >= 2 && !stopwords.contains(token.as_str()))
        .collect()
}

fn term_counts(tokens: &[String]) -> BTreeMap<&str, f64> {
    let mut counts = BTreeMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0.0) += 1.0;
    }
    counts
}

/// Cosine similarity of the TF-IDF vectors of two texts, in `[0, 1]`.
///
/// Returns 0.0 if either text is blank or has no token left after
/// stop-word removal.
///
/// # Examples
///
/// ```
/// use catalogo_core::similarity::compare_texts;
///
/// let same = compare_texts("Curso de Python", "curso de python");
/// assert!((same - 1.0).abs() < 1e-9);
/// assert_eq!(compare_texts("Python", ""), 0.0);
/// ```
pub fn compare_texts(a: &str, b: &str) -> f64 {
    if a.trim().is_empty() || b.trim().is_empty() {
        return 0.0;
    }
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let counts_a = term_counts(&tokens_a);
    let counts_b = term_counts(&tokens_b);

    let idf = |term: &str| {
        let df = [&counts_a, &counts_b]
            .iter()
            .filter(|counts| counts.contains_key(term))
            .count() as f64;
        ((1.0 + 2.0) / (1.0 + df)).ln() + 1.0
    };

    let weigh = |counts: &BTreeMap<&str, f64>| -> BTreeMap<String, f64> {
        let weights: BTreeMap<String, f64> = counts
            .iter()
            .map(|(term, tf)| (term.to_string(), tf * idf(*term)))
            .collect();
        let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
        weights
            .into_iter()
            .map(|(term, w)| (term, if norm > 0.0 { w / norm } else { 0.0 }))
            .collect()
    };

    let vec_a = weigh(&counts_a);
    let vec_b = weigh(&counts_b);
    let dot: f64 = vec_a
        .iter()
        .filter_map(|(term, wa)| vec_b.get(term).map(|wb| wa * wb))
        .sum();
    dot.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_folds_accents_and_drops_stopwords() {
        let tokens = tokenize("Introducción a la Programación de Computadores");
        assert_eq!(
            tokens,
            vec!["introduccion", "programacion", "computadores"]
        );
    }

    #[test]
    fn test_identical_texts_score_one() {
        let text = "Gestión de proyectos ágiles con Scrum";
        assert!((compare_texts(text, text) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_texts_score_zero() {
        assert_eq!(compare_texts("Contabilidad financiera", "Python avanzado"), 0.0);
    }

    #[test]
    fn test_partial_overlap_is_between_zero_and_one() {
        let score = compare_texts(
            "Machine learning con Python",
            "Python para análisis de datos",
        );
        assert!(score > 0.0 && score < 1.0, "score was {score}");
    }

    #[test]
    fn test_stopword_only_text_scores_zero() {
        assert_eq!(compare_texts("de la y el", "de la y el"), 0.0);
    }

    #[test]
    fn test_blank_text_scores_zero() {
        assert_eq!(compare_texts("   ", "Python"), 0.0);
    }
}
