//! Progress-callback trait for per-diagram conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline renders each Mermaid diagram. Diagram rendering is
//! the only slow stage (each one waits on a headless browser), so it is the
//! only stage that reports progress.
//!
//! # Example
//!
//! ```rust
//! use md2pdf_mermaid::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     rendered: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_diagram_complete(&self, index: usize, total: usize, width: u32, height: u32) {
//!         self.rendered.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Diagram {}/{} done ({}x{} px)", index, total, width, height);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     rendered: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion pipeline as it renders each diagram.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Diagrams are rendered one at a time in document
/// order, but the conversion itself may run on a blocking worker thread, so
/// implementations must be `Send + Sync`.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after parsing, before any diagram is rendered.
    ///
    /// # Arguments
    /// * `total_diagrams`: number of `mermaid` blocks in the document
    fn on_conversion_start(&self, total_diagrams: usize) {
        let _ = total_diagrams;
    }

    /// Called just before a diagram is handed to the browser.
    ///
    /// # Arguments
    /// * `index`: 1-indexed diagram ordinal
    /// * `total`: total diagrams in the document
    fn on_diagram_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when a diagram was captured successfully.
    ///
    /// `width` and `height` are the raster dimensions in physical pixels.
    fn on_diagram_complete(&self, index: usize, total: usize, width: u32, height: u32) {
        let _ = (index, total, width, height);
    }

    /// Called when a diagram falls back to a code listing.
    fn on_diagram_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every diagram has been attempted.
    ///
    /// # Arguments
    /// * `total_diagrams`: diagrams found
    /// * `rendered`:       diagrams that became images
    fn on_conversion_complete(&self, total_diagrams: usize, rendered: usize) {
        let _ = (total_diagrams, rendered);
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        started_total: AtomicUsize,
        rendered_total: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_conversion_start(&self, total_diagrams: usize) {
            self.started_total.store(total_diagrams, Ordering::SeqCst);
        }

        fn on_diagram_start(&self, _index: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_diagram_complete(&self, _index: usize, _total: usize, _w: u32, _h: u32) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_diagram_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_conversion_complete(&self, _total: usize, rendered: usize) {
            self.rendered_total.store(rendered, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(2);
        cb.on_diagram_start(1, 2);
        cb.on_diagram_complete(1, 2, 800, 600);
        cb.on_diagram_error(2, 2, "timed out");
        cb.on_conversion_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_conversion_start(3);
        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 3);

        tracker.on_diagram_start(1, 3);
        tracker.on_diagram_complete(1, 3, 400, 300);
        tracker.on_diagram_start(2, 3);
        tracker.on_diagram_complete(2, 3, 400, 300);
        tracker.on_diagram_start(3, 3);
        tracker.on_diagram_error(3, 3, "Parse error on line 2");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);

        tracker.on_conversion_complete(3, 2);
        assert_eq!(tracker.rendered_total.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_conversion_start(1);
        cb.on_diagram_start(1, 1);
        cb.on_diagram_complete(1, 1, 10, 10);
    }
}
