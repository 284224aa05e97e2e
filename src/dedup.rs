//! Duplicate detection across the merged record list.
//!
//! Two records are related when their normalized titles are near-identical
//! (word-set Jaccard ≥ 0.9) or their DOIs are equal. Groups are the connected
//! components of that relation, so near-duplicates chain transitively. The
//! most complete record of each group survives.

use crate::normalize::{doi_key, normalize_title};
use crate::record::Record;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Minimum word-set similarity for two titles to count as the same article
pub const TITLE_SIMILARITY_THRESHOLD: f64 = 0.9;

const TITLE_POINTS: u32 = 10;
const AUTHORS_POINTS: u32 = 8;
const YEAR_POINTS: u32 = 5;
const DOI_POINTS: u32 = 15;
const ABSTRACT_POINTS: u32 = 20;
const LONG_ABSTRACT_BONUS: u32 = 5;
const MEDIUM_ABSTRACT_BONUS: u32 = 3;

/// Which relations tied a removed record to its group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateReasons {
    pub similar_title: bool,
    pub same_doi: bool,
}

impl DuplicateReasons {
    pub fn is_empty(&self) -> bool {
        !self.similar_title && !self.same_doi
    }
}

impl std::fmt::Display for DuplicateReasons {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags = Vec::new();
        if self.similar_title {
            tags.push("título similar");
        }
        if self.same_doi {
            tags.push("mesmo DOI");
        }
        if tags.is_empty() {
            tags.push("critérios de duplicata");
        }
        write!(f, "{}", tags.join(", "))
    }
}

/// Audit trail for one removed record
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// Position of the removed record in the merged input
    pub index: usize,
    /// The removed record as it was
    pub record: Record,
    /// Relation on the link that joined this record to its group
    pub reasons: DuplicateReasons,
    pub removed_score: u32,
    /// Position of the surviving record
    pub kept_index: usize,
    pub kept_score: u32,
    /// Record this one was linked through; equals `kept_index` for direct matches
    pub linked_via: usize,
}

impl AuditEntry {
    /// Human readable reason, e.g. `mesmo DOI (pontuação: 33 vs 58 do artigo mantido)`
    pub fn reason(&self) -> String {
        format!(
            "{} (pontuação: {} vs {} do artigo mantido)",
            self.reasons, self.removed_score, self.kept_score
        )
    }
}

/// One group of equivalent records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub survivor: usize,
    /// All member indices in ascending order, survivor included
    pub members: Vec<usize>,
}

/// Survivors in original order plus the audit of everything removed
#[derive(Debug, Clone)]
pub struct Deduplication {
    pub records: Vec<Record>,
    pub removed: Vec<AuditEntry>,
}

#[derive(Debug, Clone)]
pub struct Deduplicator {
    title_threshold: f64,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self {
            title_threshold: TITLE_SIMILARITY_THRESHOLD,
        }
    }
}

/// Comparison keys of a record that can take part in grouping
struct Keys {
    words: HashSet<String>,
    doi: String,
}

/// Edge of the duplicate relation
struct Link {
    a: usize,
    b: usize,
    reasons: DuplicateReasons,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title_threshold(mut self, threshold: f64) -> Self {
        self.title_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Remove duplicates, keeping the highest-scoring record of each group
    pub fn deduplicate(&self, records: Vec<Record>) -> Deduplication {
        let (groups, removed) = self.resolve(&records);
        debug!(
            "Found {} duplicate groups, removing {} records",
            groups.len(),
            removed.len()
        );

        let dropped: HashSet<usize> = removed.iter().map(|entry| entry.index).collect();
        let records = records
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| !dropped.contains(idx))
            .map(|(_, record)| record)
            .collect();

        Deduplication { records, removed }
    }

    /// Duplicate groups with more than one member, ordered by first member
    pub fn find_groups(&self, records: &[Record]) -> Vec<DuplicateGroup> {
        self.resolve(records).0
    }

    fn resolve(&self, records: &[Record]) -> (Vec<DuplicateGroup>, Vec<AuditEntry>) {
        let keys: Vec<Option<Keys>> = records.iter().map(comparison_keys).collect();
        let links = self.links(&keys);

        let mut sets = DisjointSet::new(records.len());
        let mut adjacency: Vec<Vec<(usize, DuplicateReasons)>> = vec![Vec::new(); records.len()];
        for link in &links {
            sets.union(link.a, link.b);
            adjacency[link.a].push((link.b, link.reasons));
            adjacency[link.b].push((link.a, link.reasons));
        }

        let mut components: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
        for idx in 0..records.len() {
            let root = sets.find(idx);
            components[root].push(idx);
        }

        let mut groups = Vec::new();
        let mut removed = Vec::new();

        for members in components.into_iter().filter(|m| m.len() > 1) {
            let scores: Vec<u32> = members
                .iter()
                .map(|&idx| quality_score(&records[idx]))
                .collect();

            // strict comparison keeps the earliest member on ties
            let mut best = 0;
            for (pos, score) in scores.iter().enumerate() {
                if *score > scores[best] {
                    best = pos;
                }
            }
            let survivor = members[best];
            let kept_score = scores[best];

            for (idx, (via, reasons)) in link_tree(survivor, &adjacency) {
                removed.push(AuditEntry {
                    index: idx,
                    record: records[idx].clone(),
                    reasons,
                    removed_score: quality_score(&records[idx]),
                    kept_index: survivor,
                    kept_score,
                    linked_via: via,
                });
            }

            groups.push(DuplicateGroup { survivor, members });
        }

        groups.sort_by_key(|group| group.members[0]);
        removed.sort_by_key(|entry| entry.index);
        (groups, removed)
    }

    /// Phase one: every pair of comparable records, tested independently
    fn links(&self, keys: &[Option<Keys>]) -> Vec<Link> {
        let mut links = Vec::new();
        for (a, key_a) in keys.iter().enumerate() {
            let Some(key_a) = key_a else { continue };
            for (b, key_b) in keys.iter().enumerate().skip(a + 1) {
                let Some(key_b) = key_b else { continue };
                let reasons = DuplicateReasons {
                    similar_title: jaccard(&key_a.words, &key_b.words) >= self.title_threshold,
                    same_doi: key_a.doi == key_b.doi,
                };
                if !reasons.is_empty() {
                    links.push(Link { a, b, reasons });
                }
            }
        }
        links
    }
}

/// Remove duplicates with the default threshold
pub fn deduplicate(records: Vec<Record>) -> Deduplication {
    Deduplicator::default().deduplicate(records)
}

/// Completeness score used to pick the survivor of a group
pub fn quality_score(record: &Record) -> u32 {
    let mut score = 0;

    if record.title.is_some() {
        score += TITLE_POINTS;
    }
    if record.authors.is_some() {
        score += AUTHORS_POINTS;
    }
    if record.year.is_some() {
        score += YEAR_POINTS;
    }
    if record.doi.is_some() {
        score += DOI_POINTS;
    }
    if let Some(abstract_text) = &record.abstract_text {
        score += ABSTRACT_POINTS;
        let len = abstract_text.chars().count();
        if len > 500 {
            score += LONG_ABSTRACT_BONUS;
        } else if len > 200 {
            score += MEDIUM_ABSTRACT_BONUS;
        }
    }

    score
}

/// Word-set Jaccard similarity of two titles after normalization
pub fn title_similarity(a: &str, b: &str) -> f64 {
    jaccard(&word_set(&normalize_title(a)), &word_set(&normalize_title(b)))
}

/// True when two titles are near-identical
pub fn titles_similar(a: &str, b: &str) -> bool {
    title_similarity(a, b) >= TITLE_SIMILARITY_THRESHOLD
}

fn comparison_keys(record: &Record) -> Option<Keys> {
    // records missing either key are never compared
    let title = record.title.as_deref()?;
    let doi = record.doi.as_deref()?;
    Some(Keys {
        words: word_set(&normalize_title(title)),
        doi: doi_key(doi),
    })
}

fn word_set(normalized: &str) -> HashSet<String> {
    normalized.split_whitespace().map(str::to_string).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Breadth-first tree over a group rooted at the survivor; each other member
/// maps to the member it was reached from and the relation on that link
fn link_tree(
    root: usize,
    adjacency: &[Vec<(usize, DuplicateReasons)>],
) -> Vec<(usize, (usize, DuplicateReasons))> {
    let mut seen = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);
    let mut tree = Vec::new();

    while let Some(node) = queue.pop_front() {
        for &(next, reasons) in &adjacency[node] {
            if seen.insert(next) {
                tree.push((next, (node, reasons)));
                queue.push_back(next);
            }
        }
    }

    tree
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, idx: usize) -> usize {
        let mut root = idx;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = idx;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// The smaller index becomes the root
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (low, high) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[high] = low;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: Option<&str>, doi: Option<&str>) -> Record {
        Record {
            title: title.map(str::to_string),
            doi: doi.map(str::to_string),
            ..Record::default()
        }
    }

    #[test]
    fn test_same_doi_trailing_period_title() {
        let records = vec![
            record(Some("Effects of X on Y"), Some("10.1000/xyz123")),
            record(Some("Effects of X on Y."), Some("10.1000/xyz123")),
        ];

        let result = deduplicate(records);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.removed.len(), 1);

        let entry = &result.removed[0];
        assert_eq!(entry.index, 1);
        assert_eq!(entry.kept_index, 0);
        assert!(entry.reasons.same_doi);
        assert!(entry.reason().contains("mesmo DOI"));
        assert_eq!(
            entry.reason(),
            "título similar, mesmo DOI (pontuação: 25 vs 25 do artigo mantido)"
        );
    }

    #[test]
    fn test_doi_comparison_ignores_case() {
        let records = vec![
            record(Some("Completely different words here"), Some("10.1000/ABC")),
            record(Some("Another unrelated heading"), Some("10.1000/abc")),
        ];
        let result = deduplicate(records);
        assert_eq!(result.records.len(), 1);
        let reasons = result.removed[0].reasons;
        assert!(reasons.same_doi);
        assert!(!reasons.similar_title);
        assert!(result.removed[0].reason().starts_with("mesmo DOI ("));
    }

    #[test]
    fn test_missing_keys_are_never_grouped() {
        let records = vec![
            record(Some("Shared title for all"), Some("10.1000/a")),
            record(Some("Shared title for all"), None),
            record(None, Some("10.1000/a")),
            record(Some("Shared title for all"), None),
        ];
        let result = deduplicate(records.clone());
        assert_eq!(result.records, records);
        assert!(result.removed.is_empty());
    }

    #[test]
    fn test_survivor_is_most_complete() {
        let mut rich = record(Some("Sleep and memory consolidation"), Some("10.1000/s1"));
        rich.authors = Some("Lee K".to_string());
        rich.abstract_text = Some("a".repeat(250));
        let records = vec![
            record(Some("Sleep and memory consolidation."), Some("10.1000/s1")),
            rich.clone(),
        ];

        let result = deduplicate(records);
        assert_eq!(result.records, vec![rich]);
        let entry = &result.removed[0];
        assert_eq!(entry.index, 0);
        assert_eq!(entry.kept_index, 1);
        assert_eq!(entry.removed_score, 25);
        assert_eq!(entry.kept_score, 25 + 8 + 20 + 3);
    }

    #[test]
    fn test_ties_keep_first_seen() {
        let records = vec![
            record(Some("A"), Some("10.1/unique")),
            record(Some("Tie title"), Some("10.1/tie")),
            record(Some("Tie title"), Some("10.1/tie")),
            record(Some("Tie title"), Some("10.1/tie")),
        ];
        let groups = Deduplicator::new().find_groups(&records);
        assert_eq!(
            groups,
            vec![DuplicateGroup {
                survivor: 1,
                members: vec![1, 2, 3]
            }]
        );
    }

    #[test]
    fn test_transitive_chain_reports_linking_relation() {
        let base = "one two three four five six seven eight nine ten";
        let records = vec![
            record(Some(base), Some("10.1/a")),
            record(Some(&format!("{base} eleven")), Some("10.1/b")),
            record(Some(&format!("{base} eleven twelve")), Some("10.1/c")),
        ];

        // the ends of the chain are not similar to each other
        assert!(!titles_similar(
            records[0].title.as_deref().unwrap(),
            records[2].title.as_deref().unwrap()
        ));

        let result = deduplicate(records);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.removed.len(), 2);

        let far = &result.removed[1];
        assert_eq!(far.index, 2);
        assert_eq!(far.kept_index, 0);
        assert_eq!(far.linked_via, 1);
        assert!(far.reasons.similar_title);
        assert!(!far.reasons.same_doi);
    }

    #[test]
    fn test_survivors_keep_original_order() {
        let records = vec![
            record(Some("Alpha study"), Some("10.1/x")),
            record(Some("Beta study results"), Some("10.1/y")),
            record(Some("Alpha study"), Some("10.1/x")),
            record(Some("Gamma"), None),
        ];
        let result = deduplicate(records);
        let titles: Vec<_> = result
            .records
            .iter()
            .map(|r| r.title.as_deref().unwrap())
            .collect();
        assert_eq!(titles, vec!["Alpha study", "Beta study results", "Gamma"]);
    }

    #[test]
    fn test_rerun_is_stable() {
        let records = vec![
            record(Some("Alpha study"), Some("10.1/x")),
            record(Some("alpha STUDY!"), Some("10.1/z")),
            record(Some("Beta"), Some("10.1/x")),
        ];
        let first = deduplicate(records);
        let second = deduplicate(first.records.clone());
        assert_eq!(second.records, first.records);
        assert!(second.removed.is_empty());
    }

    #[test]
    fn test_quality_score() {
        assert_eq!(quality_score(&Record::default()), 0);
        let full = Record {
            title: Some("t".into()),
            authors: Some("a".into()),
            year: Some("2020".into()),
            doi: Some("10.1/x".into()),
            abstract_text: Some("x".repeat(501)),
            source_file: None,
        };
        assert_eq!(quality_score(&full), 10 + 8 + 5 + 15 + 20 + 5);
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let a = "Deep learning for image classification";
        let b = "Deep learning for image recognition";
        assert_eq!(title_similarity(a, b), title_similarity(b, a));
        assert!(!titles_similar(a, b));
        assert!(titles_similar(a, "DEEP learning, for image classification!"));
        assert_eq!(title_similarity("", a), 0.0);
    }

    #[test]
    fn test_reason_fallback_label() {
        assert_eq!(DuplicateReasons::default().to_string(), "critérios de duplicata");
    }
}
