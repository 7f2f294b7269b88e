//! Near-duplicate and topic-repetition checks against accepted items.

use memwindow_core::{ContextItem, TopicFingerprint};
use std::collections::HashMap;

/// Jaccard similarity of two fingerprints. Empty sets have no overlap.
pub fn jaccard(a: &TopicFingerprint, b: &TopicFingerprint) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count();
    let union = a.len() + b.len() - inter;
    inter as f64 / union as f64
}

/// Tracks accepted items' topics for one selection call.
#[derive(Debug, Clone)]
pub struct RedundancyDetector {
    threshold: f64,
    topic_limit: usize,
    topic_counts: HashMap<String, usize>,
}

impl RedundancyDetector {
    pub fn new(threshold: f64, topic_limit: usize) -> Self {
        Self {
            threshold,
            topic_limit,
            topic_counts: HashMap::new(),
        }
    }

    /// The first accepted item (in acceptance order) whose similarity to
    /// `candidate` reaches the threshold, with that similarity.
    pub fn find_redundant<'a>(
        &self,
        candidate: &ContextItem,
        accepted: &'a [ContextItem],
    ) -> Option<(&'a ContextItem, f64)> {
        if candidate.fingerprint.is_empty() {
            return None;
        }
        accepted.iter().find_map(|prior| {
            let similarity = if prior.signature == candidate.signature {
                1.0
            } else {
                jaccard(&candidate.fingerprint, &prior.fingerprint)
            };
            (similarity >= self.threshold).then_some((prior, similarity))
        })
    }

    /// The first of `fingerprint`'s topics (in token order) that already
    /// has `topic_limit` accepted items, with its count.
    pub fn saturated_topic<'f>(&self, fingerprint: &'f TopicFingerprint) -> Option<(&'f str, usize)> {
        fingerprint.iter().find_map(|topic| {
            let count = self.topic_count(topic);
            (count >= self.topic_limit).then_some((topic.as_str(), count))
        })
    }

    /// Count an accepted item's topics.
    pub fn record(&mut self, fingerprint: &TopicFingerprint) {
        for topic in fingerprint {
            *self.topic_counts.entry(topic.clone()).or_insert(0) += 1;
        }
    }

    pub fn topic_count(&self, topic: &str) -> usize {
        self.topic_counts.get(topic).copied().unwrap_or(0)
    }

    pub fn topic_limit(&self) -> usize {
        self.topic_limit
    }
}
