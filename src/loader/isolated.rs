//! Per-root loading: one fresh context per root, each candidate resolved once.

#![allow(missing_docs)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::errors::Result;
use crate::loader::context::{ContextProvider, LoadingContext};
use crate::loader::outcome::LoadOutcome;
use crate::scanner::candidate::Candidate;

/// Outcome of one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadResult {
    pub candidate: Candidate,
    pub outcome: LoadOutcome,
}

/// Loads the candidates of one root through a context nobody else shares.
#[derive(Debug)]
pub struct IsolatedLoader<P> {
    provider: P,
    extension: String,
}

impl<P: ContextProvider> IsolatedLoader<P> {
    pub fn new(provider: P, extension: impl Into<String>) -> Self {
        Self {
            provider,
            extension: extension.into(),
        }
    }

    /// Resolve every path of `root` in sorted order, through a context opened
    /// for this call only. The first infrastructure error aborts the root.
    pub fn load_root(&self, root: &Path, paths: &BTreeSet<PathBuf>) -> Result<Vec<LoadResult>> {
        let mut context = self.provider.open(root)?;
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            let candidate = Candidate::derive(root, path, &self.extension)?;
            let outcome = context.resolve(&candidate.logical_name)?;
            results.push(LoadResult { candidate, outcome });
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use super::*;
    use crate::core::errors::VciError;

    /// Provider whose contexts answer from a fixed table and record what they saw.
    #[derive(Default)]
    struct Scripted {
        answers: HashMap<String, LoadOutcome>,
        opened: Rc<RefCell<Vec<PathBuf>>>,
        asked: Rc<RefCell<Vec<String>>>,
    }

    struct ScriptedContext {
        answers: HashMap<String, LoadOutcome>,
        asked: Rc<RefCell<Vec<String>>>,
    }

    impl ContextProvider for Scripted {
        type Context = ScriptedContext;

        fn open(&self, root: &Path) -> Result<ScriptedContext> {
            self.opened.borrow_mut().push(root.to_path_buf());
            Ok(ScriptedContext {
                answers: self.answers.clone(),
                asked: Rc::clone(&self.asked),
            })
        }
    }

    impl LoadingContext for ScriptedContext {
        fn resolve(&mut self, name: &str) -> Result<LoadOutcome> {
            self.asked.borrow_mut().push(name.to_owned());
            self.answers
                .get(name)
                .cloned()
                .ok_or_else(|| VciError::load_infrastructure(name, "unscripted"))
        }
    }

    fn paths(root: &str, names: &[&str]) -> BTreeSet<PathBuf> {
        names.iter().map(|n| Path::new(root).join(n)).collect()
    }

    #[test]
    fn resolves_each_candidate_once_in_sorted_order() {
        let mut provider = Scripted::default();
        provider
            .answers
            .insert("a.Foo".to_string(), LoadOutcome::Loaded);
        provider
            .answers
            .insert("Top".to_string(), LoadOutcome::corrupt("bad magic"));
        let asked = Rc::clone(&provider.asked);
        let opened = Rc::clone(&provider.opened);

        let loader = IsolatedLoader::new(provider, "class");
        let results = loader
            .load_root(Path::new("/out"), &paths("/out", &["a/Foo.class", "Top.class"]))
            .unwrap();

        assert_eq!(*asked.borrow(), vec!["Top", "a.Foo"]);
        assert_eq!(*opened.borrow(), vec![PathBuf::from("/out")]);
        assert_eq!(results[0].candidate.logical_name, "Top");
        assert!(results[0].outcome.is_corrupt());
        assert_eq!(results[1].outcome, LoadOutcome::Loaded);
    }

    #[test]
    fn every_call_opens_a_new_context() {
        let provider = Scripted::default();
        let opened = Rc::clone(&provider.opened);
        let loader = IsolatedLoader::new(&provider, "class");
        loader.load_root(Path::new("/a"), &BTreeSet::new()).unwrap();
        loader.load_root(Path::new("/b"), &BTreeSet::new()).unwrap();
        assert_eq!(
            *opened.borrow(),
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
    }

    #[test]
    fn infrastructure_error_aborts_the_root() {
        let provider = Scripted::default();
        let asked = Rc::clone(&provider.asked);
        let loader = IsolatedLoader::new(provider, "class");
        let err = loader
            .load_root(Path::new("/out"), &paths("/out", &["A.class", "B.class"]))
            .unwrap_err();
        assert_eq!(err.code(), "VCI-3001");
        assert_eq!(*asked.borrow(), vec!["A"]);
    }
}
