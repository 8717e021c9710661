//! Cross-chunk merge state for one streamed chat exchange.
//!
//! Two levels cooperate while a stream is consumed. [`combine`] builds the
//! cumulative view handed to per-chunk callbacks: text grows by
//! concatenation and the end flag is sticky. [`MergeState`] independently
//! folds every raw partial exactly once, summing token usage and unioning
//! search results, so exchange totals stay correct even when a later
//! partial is a drop-in replacement rather than a true increment.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::types::chat::{ChatResponse, SearchInfo, SearchItem, Sentence};
use crate::types::common::Usage;

/// Lock-free running total of token usage across the partials of one
/// exchange. Safe under concurrent contribution from whatever context the
/// transport delivers chunks on.
#[derive(Debug, Default)]
pub struct UsageTally {
    prompt: AtomicU64,
    completion: AtomicU64,
    total: AtomicU64,
}

impl UsageTally {
    /// Creates a zeroed tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically adds `delta` and returns the new running total.
    pub fn add(&self, delta: &Usage) -> Usage {
        Usage {
            prompt_tokens: add_saturating(&self.prompt, delta.prompt_tokens),
            completion_tokens: add_saturating(&self.completion, delta.completion_tokens),
            total_tokens: add_saturating(&self.total, delta.total_tokens),
        }
    }

    /// Reads the running total without mutating it.
    pub fn current(&self) -> Usage {
        Usage {
            prompt_tokens: self.prompt.load(Ordering::Acquire),
            completion_tokens: self.completion.load(Ordering::Acquire),
            total_tokens: self.total.load(Ordering::Acquire),
        }
    }
}

// Totals saturate instead of wrapping, so the candidate sum is computed
// from a snapshot and swapped in only if the snapshot still holds.
fn add_saturating(counter: &AtomicU64, delta: u64) -> u64 {
    let mut current = counter.load(Ordering::Relaxed);
    loop {
        let candidate = current.saturating_add(delta);
        match counter.compare_exchange_weak(current, candidate, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => return candidate,
            Err(observed) => current = observed,
        }
    }
}

/// Deduplicating union of the search results contributed by any partial.
#[derive(Debug, Default)]
pub struct SearchItemSet {
    items: RwLock<HashSet<SearchItem>>,
}

impl SearchItemSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts all items; duplicates (by value) collapse to one.
    pub fn extend<I: IntoIterator<Item = SearchItem>>(&self, items: I) {
        self.items.write().extend(items);
    }

    /// Returns the current membership, ordered by citation index and URL
    /// so repeated snapshots of the same membership agree.
    pub fn snapshot(&self) -> Vec<SearchItem> {
        let mut items: Vec<SearchItem> = self.items.read().iter().cloned().collect();
        items.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.url.cmp(&b.url)));
        items
    }
}

/// Admit-once set of merge keys, guarding the aggregate against duplicate
/// deliveries of the same partial.
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: RwLock<HashSet<String>>,
}

impl DedupSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `key`, returning true only the first time it is seen. The
    /// write lock makes the test-and-insert atomic: two concurrent calls
    /// with the same key cannot both win.
    pub fn insert(&self, key: &str) -> bool {
        self.seen.write().insert(key.to_string())
    }
}

/// Accumulation state for one exchange, exclusively owned by the streaming
/// call that created it and discarded when that call resolves.
#[derive(Debug, Default)]
pub struct MergeState {
    usage: UsageTally,
    search: SearchItemSet,
    seen: DedupSet,
}

impl MergeState {
    /// Creates a fresh state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a partial into the running state. Returns false when this
    /// partial was already merged (duplicate delivery); nothing is counted
    /// in that case.
    pub fn merge(&self, response: &ChatResponse) -> bool {
        if !self.seen.insert(&response.merge_key()) {
            return false;
        }

        if let Some(usage) = &response.usage {
            self.usage.add(usage);
        }

        if let Some(info) = &response.search_info {
            if !info.is_empty() {
                self.search.extend(info.search_results.iter().cloned());
            }
        }

        true
    }

    /// The summed token usage over all merged partials.
    pub fn usage(&self) -> Usage {
        self.usage.current()
    }

    /// The unioned search results over all merged partials.
    pub fn search(&self) -> SearchInfo {
        SearchInfo {
            search_results: self.search.snapshot(),
        }
    }
}

/// Combines two consecutive partials of one exchange into the cumulative
/// view. Identity fields (`id`, `object`, `created`) and the fragment index
/// are fixed by the first partial; the text grows by concatenation; the end
/// flag is sticky once set; a function call, once emitted, is not
/// overwritten by later partials. Usage and search results are latest-wins
/// at this level — exchange totals come from [`MergeState`], which sees
/// every raw partial.
pub fn combine(left: Option<ChatResponse>, right: Option<ChatResponse>) -> Option<ChatResponse> {
    match (left, right) {
        (left, None) => left,
        (None, right) => right,
        (Some(left), Some(right)) => {
            if left == right {
                return Some(left);
            }
            Some(ChatResponse {
                id: left.id,
                object: left.object,
                created: left.created,
                usage: right.usage,
                sentence: Sentence {
                    index: left.sentence.index,
                    is_end: left.sentence.is_end || right.sentence.is_end,
                    content: format!("{}{}", left.sentence.content, right.sentence.content),
                },
                function_call: left.function_call.or(right.function_call),
                search_info: right.search_info,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::functions::FunctionCall;
    use pretty_assertions::assert_eq;

    fn partial(id: &str, index: i64, content: &str) -> ChatResponse {
        ChatResponse {
            id: id.to_string(),
            object: "chat.completion".to_string(),
            created: 1700000000,
            usage: None,
            sentence: Sentence {
                index,
                is_end: false,
                content: content.to_string(),
            },
            function_call: None,
            search_info: None,
        }
    }

    fn item(index: i64, url: &str) -> SearchItem {
        SearchItem {
            index,
            url: url.to_string(),
            title: format!("title {}", index),
        }
    }

    #[test]
    fn test_tally_adds_and_returns_running_total() {
        let tally = UsageTally::new();

        let after_first = tally.add(&Usage::new(10, 0));
        assert_eq!(after_first.total_tokens, 10);

        let after_second = tally.add(&Usage::new(0, 5));
        assert_eq!(after_second.prompt_tokens, 10);
        assert_eq!(after_second.completion_tokens, 5);
        assert_eq!(after_second.total_tokens, 15);

        assert_eq!(tally.current(), after_second);
    }

    #[test]
    fn test_tally_saturates_instead_of_wrapping() {
        let tally = UsageTally::new();
        tally.add(&Usage {
            prompt_tokens: u64::MAX - 1,
            completion_tokens: 0,
            total_tokens: 0,
        });
        let total = tally.add(&Usage {
            prompt_tokens: 10,
            completion_tokens: 0,
            total_tokens: 0,
        });
        assert_eq!(total.prompt_tokens, u64::MAX);
    }

    #[test]
    fn test_tally_is_safe_under_concurrent_adds() {
        let tally = std::sync::Arc::new(UsageTally::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tally = tally.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        tally.add(&Usage::new(1, 1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let total = tally.current();
        assert_eq!(total.prompt_tokens, 8000);
        assert_eq!(total.completion_tokens, 8000);
        assert_eq!(total.total_tokens, 16000);
    }

    #[test]
    fn test_search_set_unions_by_value() {
        let set = SearchItemSet::new();
        set.extend(vec![item(1, "https://a"), item(2, "https://b")]);
        set.extend(vec![item(2, "https://b"), item(3, "https://c")]);

        let snapshot = set.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].url, "https://a");
        assert_eq!(snapshot[2].url, "https://c");
    }

    #[test]
    fn test_dedup_set_admits_once() {
        let set = DedupSet::new();
        assert!(set.insert("as-1#0"));
        assert!(!set.insert("as-1#0"));
        assert!(set.insert("as-1#1"));
    }

    #[test]
    fn test_merge_counts_each_partial_once() {
        let state = MergeState::new();

        let mut first = partial("as-1", 0, "Hello");
        first.usage = Some(Usage::new(10, 0));
        first.search_info = Some(SearchInfo {
            search_results: vec![item(1, "https://a")],
        });

        assert!(state.merge(&first));
        // A retry-delivered duplicate of the same partial changes nothing.
        assert!(!state.merge(&first));

        let mut second = partial("as-1", 1, " world");
        second.usage = Some(Usage::new(0, 5));
        second.search_info = Some(SearchInfo {
            search_results: vec![item(1, "https://a"), item(2, "https://b")],
        });
        assert!(state.merge(&second));

        assert_eq!(state.usage(), Usage::new(10, 5));
        assert_eq!(state.search().search_results.len(), 2);
    }

    #[test]
    fn test_combine_concatenates_in_arrival_order() {
        let folded = combine(
            combine(Some(partial("as-1", 0, "a")), Some(partial("as-1", 1, "b"))),
            Some(partial("as-1", 2, "c")),
        )
        .unwrap();

        assert_eq!(folded.content(), "abc");
        assert_eq!(folded.sentence.index, 0);
        assert_eq!(folded.id, "as-1");
    }

    #[test]
    fn test_combine_absent_sides() {
        assert_eq!(combine(None, None), None);

        let only = partial("as-1", 0, "a");
        assert_eq!(combine(Some(only.clone()), None), Some(only.clone()));
        assert_eq!(combine(None, Some(only.clone())), Some(only));
    }

    #[test]
    fn test_combine_identical_right_returns_left() {
        let left = partial("as-1", 0, "a");
        let folded = combine(Some(left.clone()), Some(left.clone())).unwrap();
        assert_eq!(folded, left);
    }

    #[test]
    fn test_combine_end_flag_is_sticky() {
        let mut last = partial("as-1", 1, "!");
        last.sentence.is_end = true;
        let folded = combine(Some(partial("as-1", 0, "hi")), Some(last)).unwrap();
        assert!(folded.sentence.is_end);

        let folded = combine(
            Some(folded),
            Some(partial("as-1", 2, "")),
        )
        .unwrap();
        assert!(folded.sentence.is_end, "end flag must not regress");
    }

    #[test]
    fn test_combine_no_end_flag_stays_unset() {
        let folded = combine(Some(partial("as-1", 0, "a")), Some(partial("as-1", 1, "b"))).unwrap();
        assert!(!folded.sentence.is_end);
    }

    #[test]
    fn test_combine_keeps_function_call_once_emitted() {
        let call = FunctionCall {
            name: "query_score".to_string(),
            arguments: "{}".to_string(),
            thoughts: None,
        };

        let mut with_call = partial("as-1", 0, "");
        with_call.function_call = Some(call.clone());

        let mut late_call = partial("as-1", 1, "");
        late_call.function_call = Some(FunctionCall {
            name: "other".to_string(),
            arguments: "{}".to_string(),
            thoughts: None,
        });

        let folded = combine(Some(with_call), Some(late_call)).unwrap();
        assert_eq!(folded.function_call, Some(call));
    }

    #[test]
    fn test_combine_usage_and_search_are_latest_wins() {
        let mut left = partial("as-1", 0, "a");
        left.usage = Some(Usage::new(10, 0));
        left.search_info = Some(SearchInfo {
            search_results: vec![item(1, "https://a")],
        });

        let mut right = partial("as-1", 1, "b");
        right.usage = Some(Usage::new(0, 5));
        right.search_info = Some(SearchInfo {
            search_results: vec![item(2, "https://b")],
        });

        let folded = combine(Some(left), Some(right)).unwrap();
        assert_eq!(folded.usage, Some(Usage::new(0, 5)));
        assert_eq!(
            folded.search_info.unwrap().search_results[0].url,
            "https://b"
        );
    }
}
