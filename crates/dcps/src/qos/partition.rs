// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! PARTITION QoS policy (DDS v1.4 Sec.2.2.3.13)
//!
//! Logical namespaces within a domain. A writer and a reader communicate only
//! if they share at least one partition. Names may use `*` and `?` wildcards.
//! An empty list is the default partition (`""`).
//!
//! A partition mismatch prevents matching but is not a QoS incompatibility.

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Partition {
    pub names: Vec<String>,
}

impl Partition {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn single(name: &str) -> Self {
        Self {
            names: vec![name.to_string()],
        }
    }

    pub fn is_default(&self) -> bool {
        self.names.is_empty() || self.names.iter().all(String::is_empty)
    }

    fn effective(&self) -> Vec<&str> {
        if self.names.is_empty() {
            vec![""]
        } else {
            self.names.iter().map(String::as_str).collect()
        }
    }

    /// Whether two endpoints share at least one partition.
    pub fn intersects(&self, other: &Partition) -> bool {
        let ours = self.effective();
        let theirs = other.effective();
        ours.iter().any(|a| {
            theirs
                .iter()
                .any(|b| wildcard_match(a, b) || wildcard_match(b, a))
        })
    }
}

/// fnmatch-style matching (`*` any run, `?` one char).
pub(crate) fn wildcard_match(pattern: &str, text: &str) -> bool {
    fn matches(p: &[char], t: &[char]) -> bool {
        match (p.first(), t.first()) {
            (None, None) => true,
            (Some('*'), _) => matches(&p[1..], t) || (!t.is_empty() && matches(p, &t[1..])),
            (Some('?'), Some(_)) => matches(&p[1..], &t[1..]),
            (Some(a), Some(b)) if a == b => matches(&p[1..], &t[1..]),
            _ => false,
        }
    }
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    matches(&p, &t)
}
