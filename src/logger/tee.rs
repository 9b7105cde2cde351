//! Fan-out sink: forwards every event to several sinks in registration order.

#![allow(missing_docs)]

use crate::logger::{ReportSink, ScanEvent};

/// Writes each event to all inner sinks (console + JSONL, typically).
#[derive(Default)]
pub struct TeeSink {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl TeeSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn ReportSink>) {
        self.sinks.push(sink);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ReportSink for TeeSink {
    fn emit(&mut self, event: &ScanEvent) {
        for sink in &mut self.sinks {
            sink.emit(event);
        }
    }

    fn flush(&mut self) {
        for sink in &mut self.sinks {
            sink.flush();
        }
    }
}

impl std::fmt::Debug for TeeSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeeSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::logger::Level;

    #[derive(Clone, Default)]
    struct Shared(Rc<RefCell<Vec<String>>>);

    impl ReportSink for Shared {
        fn emit(&mut self, event: &ScanEvent) {
            self.0.borrow_mut().push(event.message());
        }
    }

    #[test]
    fn forwards_to_every_sink_in_order() {
        let first = Shared::default();
        let second = Shared::default();
        let mut tee = TeeSink::new().with(first.clone()).with(second.clone());
        assert_eq!(tee.len(), 2);

        tee.emit(&ScanEvent::Broken {
            name: "a.Bar".to_string(),
        });
        tee.emit(&ScanEvent::diagnostic(Level::Fine, "done"));
        tee.flush();

        assert_eq!(*first.0.borrow(), vec!["Broken a.Bar", "done"]);
        assert_eq!(*first.0.borrow(), *second.0.borrow());
    }

    #[test]
    fn empty_tee_is_a_no_op() {
        let mut tee = TeeSink::new();
        assert!(tee.is_empty());
        tee.emit(&ScanEvent::ScanStarted { roots: Vec::new() });
    }
}
