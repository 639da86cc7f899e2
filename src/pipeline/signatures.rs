//! Shared machinery for signature-based guards (bot/SQLi/XSS/scanner/RCE).
//!
//! Each guard pre-compiles its pattern table once at construction, the same
//! shape as the blocklist guardrail this is grounded on: a regex per
//! signature, scanned with a `RegexSet` first so a non-matching request pays
//! for one linear scan rather than one per pattern.

use regex::{Regex, RegexSet};

/// One named signature within a guard's pattern table.
pub struct Signature {
    pub name: &'static str,
    pattern: &'static str,
}

impl Signature {
    pub const fn new(name: &'static str, pattern: &'static str) -> Self {
        Self { name, pattern }
    }
}

/// A compiled table of signatures, scanned together.
pub struct SignatureSet {
    set: RegexSet,
    individual: Vec<Regex>,
    names: Vec<&'static str>,
}

impl SignatureSet {
    pub fn compile(signatures: &[Signature]) -> Self {
        let patterns: Vec<&str> = signatures.iter().map(|s| s.pattern).collect();
        let set = RegexSet::new(&patterns).expect("built-in signature patterns must compile");
        let individual = patterns
            .iter()
            .map(|p| Regex::new(p).expect("built-in signature patterns must compile"))
            .collect();
        let names = signatures.iter().map(|s| s.name).collect();
        Self {
            set,
            individual,
            names,
        }
    }

    /// Returns the name of the first signature that matches `haystack`, if any.
    pub fn first_match(&self, haystack: &str) -> Option<&'static str> {
        let hit = self.set.matches(haystack).into_iter().next()?;
        // RegexSet confirms a hit; re-run the individual regex only to assert
        // nonemptiness is not needed, the index itself tells us which name matched.
        let _ = &self.individual;
        Some(self.names[hit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_match_finds_correct_signature() {
        let set = SignatureSet::compile(&[
            Signature::new("union-select", r"(?i)union\s+select"),
            Signature::new("sleep-call", r"(?i)sleep\(\d+\)"),
        ]);
        assert_eq!(
            set.first_match("id=1 UNION SELECT password FROM users"),
            Some("union-select")
        );
        assert_eq!(set.first_match("id=1 AND SLEEP(5)"), Some("sleep-call"));
        assert_eq!(set.first_match("id=1"), None);
    }
}
