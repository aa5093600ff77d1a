//! Observability hooks.
//!
//! An [`Observer`] is a side channel: every callback is infallible and has a
//! no-op default, so a broken or slow exporter can never fail a retrieval.
//! Exporting spans to a tracing backend is left to the subscriber installed
//! by the application; [`TracingObserver`] forwards callbacks as `tracing`
//! events for exactly that purpose.

use crate::model::{Query, RetrievalResult};
use crate::Error;

/// Receives retrieval events.
pub trait Observer: Send + Sync {
    /// A hybrid retrieval is starting.
    fn on_retrieve_start(&self, _query: &Query) {}

    /// A hybrid retrieval finished, successfully or not.
    fn on_retrieve_end(&self, _query: &Query, _outcome: Result<&RetrievalResult, &Error>) {}

    fn on_vector_search(&self, _backend: &str, _top_k: usize, _result_count: usize, _latency_ms: u64) {}

    fn on_graph_traverse(&self, _backend: &str, _depth: usize, _node_count: usize, _latency_ms: u64) {}

    fn on_rerank(&self, _model: &str, _input_count: usize, _output_count: usize, _latency_ms: u64) {}
}

/// Emits each event as a `tracing` INFO event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_retrieve_start(&self, query: &Query) {
        tracing::info!(
            target: "hybrid_retrieve::observe",
            query = %query.text, top_k = query.top_k,
            "retrieve.start"
        );
    }

    fn on_retrieve_end(&self, query: &Query, outcome: Result<&RetrievalResult, &Error>) {
        match outcome {
            Ok(res) => tracing::info!(
                target: "hybrid_retrieve::observe",
                query = %query.text, items = res.items.len(), latency_ms = res.metadata.latency_ms,
                "retrieve.end"
            ),
            Err(e) => tracing::warn!(
                target: "hybrid_retrieve::observe",
                query = %query.text, error = %e,
                "retrieve.end"
            ),
        }
    }

    fn on_vector_search(&self, backend: &str, top_k: usize, result_count: usize, latency_ms: u64) {
        tracing::info!(
            target: "hybrid_retrieve::observe",
            backend, top_k, result_count, latency_ms,
            "retrieve.vector.search"
        );
    }

    fn on_graph_traverse(&self, backend: &str, depth: usize, node_count: usize, latency_ms: u64) {
        tracing::info!(
            target: "hybrid_retrieve::observe",
            backend, depth, node_count, latency_ms,
            "retrieve.graph.traverse"
        );
    }

    fn on_rerank(&self, model: &str, input_count: usize, output_count: usize, latency_ms: u64) {
        tracing::info!(
            target: "hybrid_retrieve::observe",
            model, input_count, output_count, latency_ms,
            "retrieve.rerank"
        );
    }
}

/// Milliseconds elapsed since `start`, saturating.
pub(crate) fn elapsed_ms(start: std::time::Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;
    use crate::model::{Query, RetrievalResult};
    use crate::Error;
    use super::Observer;

    /// Records `(event, backend, count)` triples.
    #[derive(Default)]
    pub struct RecordingObserver {
        pub events: Mutex<Vec<(&'static str, String, usize)>>,
    }

    impl Observer for RecordingObserver {
        fn on_retrieve_start(&self, query: &Query) {
            self.events.lock().push(("start", query.text.clone(), 0));
        }

        fn on_retrieve_end(&self, _query: &Query, outcome: Result<&RetrievalResult, &Error>) {
            let event = match outcome {
                Ok(res) => ("end", "ok".to_string(), res.items.len()),
                Err(e) => ("end", e.to_string(), 0),
            };
            self.events.lock().push(event);
        }

        fn on_vector_search(&self, backend: &str, _top_k: usize, result_count: usize, _latency_ms: u64) {
            self.events.lock().push(("vector", backend.to_string(), result_count));
        }

        fn on_graph_traverse(&self, backend: &str, _depth: usize, node_count: usize, _latency_ms: u64) {
            self.events.lock().push(("graph", backend.to_string(), node_count));
        }

        fn on_rerank(&self, model: &str, _input_count: usize, output_count: usize, _latency_ms: u64) {
            self.events.lock().push(("rerank", model.to_string(), output_count));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;
    impl Observer for Silent {}

    #[test]
    fn test_default_callbacks_are_noops() {
        let o = Silent;
        let q = Query::new("q");
        o.on_retrieve_start(&q);
        o.on_retrieve_end(&q, Ok(&RetrievalResult::empty(q.clone(), crate::model::Mode::Hybrid)));
        o.on_vector_search("idx", 10, 3, 1);
        o.on_graph_traverse("kg", 2, 5, 1);
        o.on_rerank("m", 5, 3, 1);
    }

    #[test]
    fn test_tracing_observer_without_subscriber() {
        let o = TracingObserver;
        let q = Query::new("q");
        o.on_retrieve_start(&q);
        o.on_retrieve_end(&q, Err(&Error::Storage("down".into())));
        o.on_vector_search("idx", 10, 3, 1);
        o.on_graph_traverse("kg", 2, 5, 1);
        o.on_rerank("m", 5, 3, 1);
    }
}
