//! Lazily initialised, shared searcher owned by the host application.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{info, warn};

use super::searcher::Searcher;

/// Holds at most one active [`Searcher`].
///
/// The first caller of [`SearcherHandle::get_or_init`] builds or loads the
/// searcher; concurrent first callers wait on the same lock instead of
/// building duplicates. A failed load publishes nothing.
#[derive(Debug, Default)]
pub struct SearcherHandle {
    current: RwLock<Option<Arc<Searcher>>>,
    init: Mutex<()>,
}

impl SearcherHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that starts out with a searcher already published.
    pub fn with_searcher(searcher: Searcher) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(searcher))),
            init: Mutex::new(()),
        }
    }

    /// The active searcher, if one has been published.
    pub fn current(&self) -> Option<Arc<Searcher>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Return the active searcher, running `load` first if there is none.
    ///
    /// `load` runs at most once across all threads unless it fails, in
    /// which case the next caller tries again.
    pub fn get_or_init<F, E>(&self, load: F) -> Result<Arc<Searcher>, E>
    where
        F: FnOnce() -> Result<Searcher, E>,
    {
        if let Some(searcher) = self.current() {
            return Ok(searcher);
        }

        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(searcher) = self.current() {
            return Ok(searcher);
        }

        let searcher = Arc::new(load()?);
        info!("Published searcher with {} boxes", searcher.size());
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&searcher));
        Ok(searcher)
    }

    /// Replace the active searcher with a freshly loaded one.
    ///
    /// On error the previous searcher stays active and the error is
    /// returned to the caller.
    pub fn reload<F, E>(&self, load: F) -> Result<Arc<Searcher>, E>
    where
        F: FnOnce() -> Result<Searcher, E>,
    {
        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        let searcher = match load() {
            Ok(searcher) => Arc::new(searcher),
            Err(err) => {
                warn!("Reload failed; keeping the active searcher");
                return Err(err);
            }
        };
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&searcher));
        info!("Reloaded searcher with {} boxes", searcher.size());
        Ok(searcher)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;
    use crate::error::DecodeError;
    use crate::models::{Match, Region};
    use crate::pip::finder::Finder;
    use crate::pip::geometry::tests::square;
    use crate::pip::store::RegionStore;
    use geo::Point;

    fn searcher(id: u32) -> Searcher {
        let region = Region::new(id, "Test", "Test County", "CA", square(0.0, 0.0, 10.0)).unwrap();
        let mut finder = Finder::new();
        finder.add(id, region.polygon().clone()).unwrap();
        Searcher::freeze(finder, &RegionStore::build(vec![region]).unwrap())
    }

    #[test]
    fn test_loader_runs_once_under_contention() {
        let handle = Arc::new(SearcherHandle::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let handle = Arc::clone(&handle);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    handle
                        .get_or_init(|| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok::<_, DecodeError>(searcher(1))
                        })
                        .unwrap()
                })
            })
            .collect();

        let searchers: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for s in &searchers {
            assert!(Arc::ptr_eq(s, &searchers[0]));
        }
    }

    #[test]
    fn test_failed_init_publishes_nothing() {
        let handle = SearcherHandle::new();
        let result = handle.get_or_init(|| Err::<Searcher, _>("corrupt cache"));
        assert_eq!(result.unwrap_err(), "corrupt cache");
        assert!(handle.current().is_none());
    }

    #[test]
    fn test_failed_reload_keeps_previous() {
        let handle = SearcherHandle::with_searcher(searcher(1));
        let result = handle.reload(|| Err::<Searcher, _>("truncated"));
        assert!(result.is_err());

        let active = handle.current().unwrap();
        assert_eq!(
            active.resolve(Point::new(5.0, 5.0)).unwrap(),
            Some(Match::contained(1))
        );
    }

    #[test]
    fn test_reload_replaces_searcher() {
        let handle = SearcherHandle::with_searcher(searcher(1));
        handle.reload(|| Ok::<_, DecodeError>(searcher(2))).unwrap();
        let active = handle.current().unwrap();
        assert_eq!(
            active.resolve(Point::new(5.0, 5.0)).unwrap(),
            Some(Match::contained(2))
        );
    }
}
