//! The set of known corpora and which of them are enabled.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use crate::corpus::Corpus;
use crate::error::{Result, SuggestError};
use crate::observer::{Observer, ObserverList};
use crate::source::Source;
use crate::types::SourceId;

#[derive(Default)]
struct RegistryState {
    corpora: Vec<Arc<Corpus>>,
    enabled: HashSet<String>,
}

/// Holds every registered corpus and the enabled subset.
///
/// Observers are notified whenever the corpus list or the enabled set
/// changes; rankers use this to drop their cached order.
#[derive(Default)]
pub struct CorpusRegistry {
    state: RwLock<RegistryState>,
    observers: ObserverList,
}

impl CorpusRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a corpus, replacing any corpus with the same name.
    ///
    /// The corpus starts enabled if it is enabled by default.
    pub fn add_corpus(&self, corpus: Arc<Corpus>) {
        {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            state.corpora.retain(|c| c.name != corpus.name);
            if corpus.default_enabled {
                state.enabled.insert(corpus.name.clone());
            } else {
                state.enabled.remove(&corpus.name);
            }
            tracing::debug!(corpus = %corpus.name, "corpus registered");
            state.corpora.push(corpus);
        }
        self.observers.notify_changed();
    }

    /// Every registered corpus, in registration order.
    pub fn all_corpora(&self) -> Vec<Arc<Corpus>> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .corpora
            .clone()
    }

    /// The enabled corpora, in registration order.
    pub fn enabled_corpora(&self) -> Vec<Arc<Corpus>> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .corpora
            .iter()
            .filter(|c| state.enabled.contains(&c.name))
            .cloned()
            .collect()
    }

    /// Looks up a corpus by name.
    pub fn corpus(&self, name: &str) -> Option<Arc<Corpus>> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .corpora
            .iter()
            .find(|c| c.name == name)
            .cloned()
    }

    /// Whether the named corpus is enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .enabled
            .contains(name)
    }

    /// Enables or disables a corpus.
    ///
    /// # Errors
    ///
    /// Returns [`SuggestError::UnknownCorpus`] if no corpus has that name.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let changed = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            if !state.corpora.iter().any(|c| c.name == name) {
                return Err(SuggestError::UnknownCorpus(name.to_owned()));
            }
            if enabled {
                state.enabled.insert(name.to_owned())
            } else {
                state.enabled.remove(name)
            }
        };
        if changed {
            tracing::debug!(corpus = name, enabled, "corpus enabled state changed");
            self.observers.notify_changed();
        }
        Ok(())
    }

    /// Finds a source backing any registered corpus.
    pub fn source(&self, id: &SourceId) -> Option<Arc<dyn Source>> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .corpora
            .iter()
            .flat_map(|c| c.sources().iter())
            .find(|s| s.id() == id)
            .cloned()
    }

    /// Registers an observer for corpus set changes.
    pub fn register_observer(&self, observer: Arc<dyn Observer>) {
        self.observers.register(observer);
    }

    /// Unregisters a corpus set observer.
    pub fn unregister_observer(&self, observer: &Arc<dyn Observer>) {
        self.observers.unregister(observer);
    }

    pub(crate) fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry_with_counter() -> (CorpusRegistry, Arc<AtomicUsize>) {
        let registry = CorpusRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        registry.register_observer(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        (registry, count)
    }

    #[test]
    fn default_enabled_corpora_start_enabled() {
        let registry = CorpusRegistry::new();
        registry.add_corpus(Arc::new(Corpus::new("web", vec![]).web().default_enabled()));
        registry.add_corpus(Arc::new(Corpus::new("music", vec![])));

        assert!(registry.is_enabled("web"));
        assert!(!registry.is_enabled("music"));
        assert_eq!(registry.all_corpora().len(), 2);
        let enabled: Vec<_> = registry
            .enabled_corpora()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(enabled, vec!["web"]);
    }

    #[test]
    fn set_enabled_notifies_only_on_change() {
        let (registry, count) = registry_with_counter();
        registry.add_corpus(Arc::new(Corpus::new("music", vec![])));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        registry.set_enabled("music", true).expect("known corpus");
        assert_eq!(count.load(Ordering::SeqCst), 2);
        registry.set_enabled("music", true).expect("known corpus");
        assert_eq!(count.load(Ordering::SeqCst), 2);
        registry.set_enabled("music", false).expect("known corpus");
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn unknown_corpus_rejected() {
        let registry = CorpusRegistry::new();
        let err = registry.set_enabled("nope", true).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn re_adding_replaces_by_name() {
        let registry = CorpusRegistry::new();
        registry.add_corpus(Arc::new(Corpus::new("apps", vec![])));
        registry.add_corpus(Arc::new(
            Corpus::new("apps", vec![]).with_label("Applications"),
        ));
        assert_eq!(registry.all_corpora().len(), 1);
        let apps = registry.corpus("apps").expect("registered");
        assert_eq!(apps.label, "Applications");
        assert!(registry.corpus("web").is_none());
    }
}
