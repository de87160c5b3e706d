//! Promotion scenarios over the public API: ranked corpora, shortcut caps
//! and the invariants every promoted list must satisfy.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use qsb_suggest::{
    Corpus, CorpusRanker, CorpusRegistry, CorpusResult, DefaultCorpusRanker, Promoter,
    ShortcutCursor, ShortcutRepository, SourceId, SuggestConfig, SuggestionRow, Suggestions,
};

struct Scores(HashMap<String, i64>);

impl ShortcutRepository for Scores {
    fn shortcuts_for_query(&self, query: &str, _allowed: &[Arc<Corpus>]) -> ShortcutCursor {
        ShortcutCursor::new(query, Vec::new())
    }

    fn corpus_scores(&self) -> HashMap<String, i64> {
        self.0.clone()
    }

    fn report_click(&self, _suggestions: &Suggestions, _position: usize) {}

    fn has_history(&self) -> bool {
        !self.0.is_empty()
    }

    fn clear_history(&self) {}
}

fn rows(corpus: &Corpus, texts: &[&str]) -> CorpusResult {
    let rows = texts
        .iter()
        .map(|t| SuggestionRow::new(SourceId::new(corpus.name.clone()), *t))
        .collect();
    CorpusResult::new(Arc::new(clone_corpus(corpus)), "te", rows, Duration::ZERO)
}

fn clone_corpus(corpus: &Corpus) -> Corpus {
    let mut c = Corpus::new(corpus.name.clone(), vec![]);
    if corpus.default_enabled {
        c = c.default_enabled();
    }
    c
}

fn shortcut(source: SourceId, text: &str, id: &str) -> SuggestionRow {
    SuggestionRow::new(source, text).with_shortcut_id(id)
}

fn texts(rows: &[SuggestionRow]) -> Vec<&str> {
    rows.iter().map(|r| r.text1.as_str()).collect()
}

#[test]
fn default_corpora_outrank_higher_scored_other_corpus() {
    let registry = Arc::new(CorpusRegistry::new());
    let a = Corpus::new("A", vec![]).default_enabled();
    let b = Corpus::new("B", vec![]).default_enabled();
    let c = Corpus::new("C", vec![]);
    for corpus in [&a, &b, &c] {
        registry.add_corpus(Arc::new(clone_corpus(corpus)));
        registry.set_enabled(&corpus.name, true).expect("registered");
    }
    let scores = Scores(HashMap::from([
        ("A".to_owned(), 5),
        ("B".to_owned(), 2),
        ("C".to_owned(), 10),
    ]));
    let ranker = DefaultCorpusRanker::new(registry, Arc::new(scores));
    let order: Vec<_> = ranker
        .ranked_corpora()
        .iter()
        .map(|c| c.name.clone())
        .collect();
    assert_eq!(order, vec!["A", "B", "C"]);

    let results = vec![
        rows(&a, &["a1", "a2"]),
        rows(&b, &["b1", "b2"]),
        rows(&c, &["c1", "c2", "c3"]),
    ];
    let config = SuggestConfig::default();
    let promoted = Promoter::all_corpora(&config).promote(&[], &results, 4);
    assert_eq!(texts(&promoted), vec!["a1", "a2", "b1", "b2"]);

    let promoted = Promoter::all_corpora(&config).promote(&[], &results, 6);
    assert_eq!(texts(&promoted), vec!["a1", "a2", "b1", "b2", "c1", "c2"]);
}

#[test]
fn shortcut_limit_drops_second_shortcut_from_same_source() {
    let x = SourceId::new("X");
    let y = SourceId::new("Y");
    let shortcuts = vec![
        shortcut(x.clone(), "S1", "s1"),
        shortcut(x, "S2", "s2"),
        shortcut(y, "S3", "s3"),
    ];
    let config = SuggestConfig {
        max_shortcuts_per_non_web_source: 1,
        ..Default::default()
    };
    let promoted = Promoter::all_corpora(&config).promote(&shortcuts, &[], 8);
    assert_eq!(texts(&promoted), vec!["S1", "S3"]);
}

#[test]
fn web_shortcuts_use_the_larger_cap() {
    let web = SourceId::web("google");
    let shortcuts: Vec<_> = (0..10)
        .map(|i| shortcut(web.clone(), &format!("w{i}"), &format!("w{i}")))
        .collect();
    let promoted =
        Promoter::all_corpora(&SuggestConfig::default()).promote(&shortcuts, &[], 20);
    assert_eq!(promoted.len(), 8);
}

#[test]
fn promoted_lists_respect_budget_and_dedup() {
    let a = Corpus::new("a", vec![]).default_enabled();
    let b = Corpus::new("b", vec![]);
    let shared = SourceId::new("shared");
    let shortcuts = vec![
        shortcut(shared.clone(), "dup", "id-1"),
        shortcut(shared.clone(), "other", "id-1"),
        shortcut(shared, "a1", "id-2"),
    ];
    let results = vec![
        rows(&a, &["a1", "a2", "a3", "a4", "a5"]),
        rows(&b, &["b1", "b2", "b3", "a2"]),
    ];
    let config = SuggestConfig::default();

    for promoter in [
        Promoter::Concat,
        Promoter::RoundRobin,
        Promoter::single_corpus(),
        Promoter::all_corpora(&config),
    ] {
        for max in 0..=12 {
            let promoted = promoter.promote(&shortcuts, &results, max);
            assert!(promoted.len() <= max, "{promoter:?} exceeded {max}");

            let ids: Vec<_> = promoted.iter().filter_map(|r| r.shortcut_id.clone()).collect();
            let unique: HashSet<_> = ids.iter().collect();
            assert_eq!(ids.len(), unique.len(), "{promoter:?} repeated a shortcut id");

            let intents: HashSet<_> = promoted.iter().map(SuggestionRow::intent_key).collect();
            assert_eq!(intents.len(), promoted.len(), "{promoter:?} repeated a destination");

            assert_eq!(promoted, promoter.promote(&shortcuts, &results, max));
        }
    }
}

#[test]
fn suggestions_promoted_is_idempotent() {
    let a = Corpus::new("a", vec![]).default_enabled();
    let s = Suggestions::new(
        "te",
        vec![Arc::new(clone_corpus(&a))],
        Promoter::all_corpora(&SuggestConfig::default()),
        3,
    );
    s.add_corpus_results(vec![rows(&a, &["a1", "a2", "a3", "a4"])])
        .expect("add");
    let first = s.promoted();
    assert_eq!(first.len(), 3);
    assert_eq!(&*first, &*s.promoted());
    s.close().expect("close");
}

#[test]
fn arrival_order_does_not_change_promoted_list() {
    let a = Corpus::new("A", vec![]).default_enabled();
    let b = Corpus::new("B", vec![]).default_enabled();
    let c = Corpus::new("C", vec![]);
    let config = SuggestConfig::default();
    let session = || {
        Suggestions::new(
            "te",
            [&a, &b, &c].map(|x| Arc::new(clone_corpus(x))).to_vec(),
            Promoter::all_corpora(&config),
            4,
        )
    };

    let in_rank_order = session();
    for corpus in [&a, &b, &c] {
        let name = corpus.name.to_lowercase();
        let texts = [format!("{name}1"), format!("{name}2")];
        in_rank_order
            .add_corpus_results(vec![rows(corpus, &[&texts[0], &texts[1]])])
            .expect("add");
    }

    let reversed = session();
    for corpus in [&c, &b, &a] {
        let name = corpus.name.to_lowercase();
        let texts = [format!("{name}1"), format!("{name}2")];
        reversed
            .add_corpus_results(vec![rows(corpus, &[&texts[0], &texts[1]])])
            .expect("add");
    }

    assert_eq!(texts(&in_rank_order.promoted()), vec!["a1", "a2", "b1", "b2"]);
    assert_eq!(&*in_rank_order.promoted(), &*reversed.promoted());
    in_rank_order.close().expect("close");
    reversed.close().expect("close");
}
