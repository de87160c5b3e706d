//! UI-side adapter that swaps in a new [`Suggestions`] only once it is
//! worth showing.
//!
//! While the user types, every keystroke produces a fresh session that is
//! empty at first. Replacing the shown list with an empty one would make the
//! list flicker, so a new session stays pending until it is done or its
//! view has rows. The session shown before it stays on screen meanwhile.
//!
//! The presenter claims every session it is given, so it alone releases
//! them once they are superseded or the presenter closes.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use qsb_suggest::{Corpus, Observer, Suggestions};

/// Called with the shown session every time it is swapped in or changes.
pub type UpdateFn = Arc<dyn Fn(&Suggestions) + Send + Sync>;

struct Held {
    suggestions: Suggestions,
    observer: Arc<dyn Observer>,
}

impl Held {
    fn detach(&self) {
        self.suggestions.unregister_observer(&self.observer);
    }

    fn release(self) {
        self.detach();
        self.suggestions.release();
    }
}

#[derive(Default)]
struct PresenterState {
    current: Option<Held>,
    pending: Option<Held>,
    corpus_filter: Option<Arc<Corpus>>,
}

#[derive(Clone, Copy)]
enum Slot {
    Current,
    Pending,
}

struct Shared {
    state: Mutex<PresenterState>,
    on_update: UpdateFn,
}

/// Holds the shown session and at most one pending one.
pub struct DelayingPresenter {
    shared: Arc<Shared>,
}

fn worth_showing(suggestions: &Suggestions) -> bool {
    suggestions.is_done() || !suggestions.visible_rows().is_empty()
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, PresenterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn observer(self: &Arc<Self>, session: u64, slot: Slot) -> Arc<dyn Observer> {
        let shared: Weak<Self> = Arc::downgrade(self);
        Arc::new(move || {
            if let Some(shared) = shared.upgrade() {
                shared.on_changed(session, slot);
            }
        })
    }

    fn on_changed(self: &Arc<Self>, session: u64, slot: Slot) {
        let held = {
            let state = self.state();
            let held = match slot {
                Slot::Current => state.current.as_ref(),
                Slot::Pending => state.pending.as_ref(),
            };
            held.filter(|h| h.suggestions.id() == session)
                .map(|h| h.suggestions.clone())
        };
        let Some(suggestions) = held else {
            return;
        };
        match slot {
            Slot::Current => (self.on_update)(&suggestions),
            Slot::Pending => {
                if worth_showing(&suggestions) {
                    self.show(suggestions);
                }
            }
        }
    }

    fn show(self: &Arc<Self>, suggestions: Suggestions) {
        let observer = self.observer(suggestions.id(), Slot::Current);
        if suggestions.register_observer(Arc::clone(&observer)).is_err() {
            return;
        }
        let superseded = {
            let mut state = self.state();
            let mut superseded = Vec::new();
            let previous = [
                state.pending.take(),
                state.current.replace(Held {
                    suggestions: suggestions.clone(),
                    observer,
                }),
            ];
            for held in previous.into_iter().flatten() {
                if held.suggestions.ptr_eq(&suggestions) {
                    held.detach();
                } else {
                    superseded.push(held);
                }
            }
            superseded
        };
        for held in superseded {
            held.release();
        }
        tracing::debug!(
            session = suggestions.id(),
            done = suggestions.is_done(),
            "suggestions shown"
        );
        (self.on_update)(&suggestions);
    }
}

impl DelayingPresenter {
    /// Creates a presenter that reports shown sessions to `on_update`.
    pub fn new(on_update: UpdateFn) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PresenterState::default()),
                on_update,
            }),
        }
    }

    /// Offers a new session. It is shown now if it is done or its view has
    /// rows, otherwise it waits until it qualifies. A session still
    /// pending from before is released.
    pub fn set_suggestions(&self, suggestions: Suggestions) {
        suggestions.claim();
        let filter = self.shared.state().corpus_filter.clone();
        suggestions.filter_by_corpus(filter);

        if worth_showing(&suggestions) {
            self.shared.show(suggestions);
            return;
        }

        let session = suggestions.id();
        let observer = self.shared.observer(session, Slot::Pending);
        if suggestions.register_observer(Arc::clone(&observer)).is_err() {
            return;
        }
        let superseded = self.shared.state().pending.replace(Held {
            suggestions: suggestions.clone(),
            observer,
        });
        if let Some(held) = superseded {
            held.release();
        }
        tracing::trace!(session, "suggestions pending");

        // The session may have qualified before the observer was attached.
        self.shared.on_changed(session, Slot::Pending);
    }

    /// Restricts the view to one corpus, or back to the promoted list.
    /// Applies to the shown and pending sessions and to later ones.
    pub fn set_corpus_filter(&self, corpus: Option<Arc<Corpus>>) {
        let sessions: Vec<Suggestions> = {
            let mut state = self.shared.state();
            state.corpus_filter = corpus.clone();
            [state.current.as_ref(), state.pending.as_ref()]
                .into_iter()
                .flatten()
                .map(|h| h.suggestions.clone())
                .collect()
        };
        for suggestions in sessions {
            suggestions.filter_by_corpus(corpus.clone());
        }
    }

    /// The corpus the view is restricted to.
    pub fn corpus_filter(&self) -> Option<Arc<Corpus>> {
        self.shared.state().corpus_filter.clone()
    }

    /// The shown session.
    pub fn current(&self) -> Option<Suggestions> {
        self.shared
            .state()
            .current
            .as_ref()
            .map(|h| h.suggestions.clone())
    }

    /// The session waiting to be shown.
    pub fn pending(&self) -> Option<Suggestions> {
        self.shared
            .state()
            .pending
            .as_ref()
            .map(|h| h.suggestions.clone())
    }

    /// Releases the shown and pending sessions.
    pub fn close(&self) {
        let held = {
            let mut state = self.shared.state();
            [state.current.take(), state.pending.take()]
        };
        for held in held.into_iter().flatten() {
            held.release();
        }
    }
}

impl Drop for DelayingPresenter {
    fn drop(&mut self) {
        self.close();
    }
}
