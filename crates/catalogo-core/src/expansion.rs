//! Query expansion: raw user term → synonym set → disjunctive match expression.
//!
//! The expander is independent of the storage layer. It reads synonyms
//! through [`SynonymSource`], which the vocabulary repository implements.

use std::fmt;
use std::future::Future;

use tracing::debug;

use crate::error::AppError;

/// Read-only access to the vocabulary for query expansion.
pub trait SynonymSource {
    /// Returns the synonyms of a normalized term in insertion order, or
    /// `None` when the term is not registered.
    fn synonyms_for(
        &self,
        term: &str,
    ) -> impl Future<Output = Result<Option<Vec<String>>, AppError>> + Send;
}

/// Normalizes a search term: trim, lowercase, collapse inner whitespace.
///
/// # Errors
///
/// Returns `AppError::InvalidQuery` when the input is empty, blank, or has no
/// alphanumeric character at all.
///
/// # Examples
///
/// ```
/// use catalogo_core::expansion::normalize_term;
///
/// assert_eq!(normalize_term("  Inteligencia   Artificial ").unwrap(), "inteligencia artificial");
/// assert!(normalize_term("   ").is_err());
/// ```
pub fn normalize_term(raw: &str) -> Result<String, AppError> {
    let normalized = collapse(raw);
    if normalized.is_empty() {
        return Err(AppError::InvalidQuery("search term is empty".to_string()));
    }
    if !normalized.chars().any(char::is_alphanumeric) {
        return Err(AppError::InvalidQuery(format!(
            "search term '{}' has no searchable characters",
            raw.trim()
        )));
    }
    Ok(normalized)
}

fn collapse(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// One user term and the synonyms it expanded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermGroup {
    term: String,
    synonyms: Vec<String>,
}

impl TermGroup {
    /// Builds a group from a normalized term and raw synonyms.
    ///
    /// Synonyms are normalized; blanks, duplicates and copies of the term
    /// itself are dropped. Order of first appearance is kept.
    pub fn new(term: impl Into<String>, synonyms: impl IntoIterator<Item = String>) -> Self {
        let term = term.into();
        let mut kept: Vec<String> = Vec::new();
        for synonym in synonyms {
            let synonym = collapse(&synonym);
            if synonym.is_empty() || synonym == term || kept.contains(&synonym) {
                continue;
            }
            kept.push(synonym);
        }
        Self {
            term,
            synonyms: kept,
        }
    }

    /// A group without expansion.
    pub fn single(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            synonyms: Vec::new(),
        }
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn synonyms(&self) -> &[String] {
        &self.synonyms
    }

    /// The term followed by its synonyms.
    pub fn alternatives(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.term.as_str()).chain(self.synonyms.iter().map(String::as_str))
    }

    pub fn is_expanded(&self) -> bool {
        !self.synonyms.is_empty()
    }
}

/// A disjunction of term groups, each group a disjunction of exact phrases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchExpression {
    groups: Vec<TermGroup>,
}

impl MatchExpression {
    pub fn new(groups: Vec<TermGroup>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[TermGroup] {
        &self.groups
    }

    /// Every distinct phrase of the expression, in expression order.
    pub fn phrases(&self) -> Vec<&str> {
        let mut phrases: Vec<&str> = Vec::new();
        for phrase in self.groups.iter().flat_map(TermGroup::alternatives) {
            if !phrases.contains(&phrase) {
                phrases.push(phrase);
            }
        }
        phrases
    }

    /// Renders the expression in FTS5 query syntax.
    ///
    /// Every alternative is an exact phrase: `("ia" OR "inteligencia
    /// artificial") OR ("python")`. Embedded double quotes are doubled.
    ///
    /// # Errors
    ///
    /// Returns `AppError::QuerySyntax` if the expression has no groups, an
    /// empty phrase, or renders to unbalanced quotes or parentheses.
    pub fn to_fts5(&self) -> Result<String, AppError> {
        if self.groups.is_empty() {
            return Err(AppError::QuerySyntax(
                "match expression has no terms".to_string(),
            ));
        }
        let mut rendered_groups = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            let mut phrases = Vec::new();
            for phrase in group.alternatives() {
                if phrase.trim().is_empty() {
                    return Err(AppError::QuerySyntax(format!(
                        "empty phrase in expansion of '{}'",
                        group.term
                    )));
                }
                phrases.push(format!("\"{}\"", phrase.replace('"', "\"\"")));
            }
            rendered_groups.push(format!("({})", phrases.join(" OR ")));
        }
        let rendered = rendered_groups.join(" OR ");
        check_balanced(&rendered)?;
        Ok(rendered)
    }
}

impl fmt::Display for MatchExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_fts5() {
            Ok(rendered) => f.write_str(&rendered),
            Err(_) => f.write_str("<invalid expression>"),
        }
    }
}

/// Checks quote and parenthesis balance of a rendered FTS5 expression.
pub fn check_balanced(expression: &str) -> Result<(), AppError> {
    let mut in_phrase = false;
    let mut depth: i32 = 0;
    for c in expression.chars() {
        match c {
            '"' => in_phrase = !in_phrase,
            '(' if !in_phrase => depth += 1,
            ')' if !in_phrase => {
                depth -= 1;
                if depth < 0 {
                    return Err(AppError::QuerySyntax(format!(
                        "unbalanced parentheses in {expression}"
                    )));
                }
            }
            _ => {}
        }
    }
    if in_phrase {
        return Err(AppError::QuerySyntax(format!(
            "unterminated phrase in {expression}"
        )));
    }
    if depth != 0 {
        return Err(AppError::QuerySyntax(format!(
            "unbalanced parentheses in {expression}"
        )));
    }
    Ok(())
}

/// Builds expanded match expressions from raw user input.
#[derive(Debug, Clone)]
pub struct QueryExpander<S> {
    source: S,
}

impl<S: SynonymSource> QueryExpander<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Expands a single raw term.
    ///
    /// An unregistered term yields the single-term expression; that is not
    /// an error.
    pub async fn expand(&self, raw: &str) -> Result<MatchExpression, AppError> {
        let group = self.expand_group(raw).await?;
        Ok(MatchExpression::new(vec![group]))
    }

    /// Expands several raw terms into one OR-combined expression.
    ///
    /// Blank entries are skipped; if nothing remains the input is invalid.
    pub async fn expand_all<'a, I>(&self, raws: I) -> Result<MatchExpression, AppError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut groups: Vec<TermGroup> = Vec::new();
        for raw in raws {
            if raw.trim().is_empty() {
                continue;
            }
            let group = self.expand_group(raw).await?;
            if !groups.iter().any(|g| g.term == group.term) {
                groups.push(group);
            }
        }
        if groups.is_empty() {
            return Err(AppError::InvalidQuery("search term is empty".to_string()));
        }
        Ok(MatchExpression::new(groups))
    }

    /// Expands a comma-separated list of interests, e.g. `"ia, python"`.
    pub async fn expand_interests(&self, list: &str) -> Result<MatchExpression, AppError> {
        self.expand_all(list.split(',')).await
    }

    async fn expand_group(&self, raw: &str) -> Result<TermGroup, AppError> {
        let term = normalize_term(raw)?;
        match self.source.synonyms_for(&term).await? {
            Some(synonyms) => {
                let group = TermGroup::new(term, synonyms);
                debug!(
                    term = group.term(),
                    synonyms = group.synonyms().len(),
                    "expanded search term"
                );
                Ok(group)
            }
            None => {
                debug!(term = %term, "term not in vocabulary, searching it unexpanded");
                Ok(TermGroup::single(term))
            }
        }
    }
}
