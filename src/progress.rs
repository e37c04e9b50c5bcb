//! Progress-callback trait for per-section digest events.
//!
//! Inject an `Arc<dyn DigestProgressCallback>` via
//! [`crate::config::DigestConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline works through the sections.
//!
//! The callback approach is the least-invasive integration point: a
//! job-management layer can forward events to a channel, a WebSocket, a
//! database record, or a terminal progress bar without the library knowing
//! how the host application communicates. The trait is `Send + Sync` because
//! sections are processed concurrently.

/// Called by the digest pipeline as it processes each section.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// `on_section_start`, `on_section_complete`, and `on_section_error` may be
/// called concurrently from different tasks. Implementations must protect
/// shared mutable state with appropriate synchronisation primitives.
pub trait DigestProgressCallback: Send + Sync {
    /// Called once after segmentation, before any generation call.
    fn on_digest_start(&self, total_sections: usize) {
        let _ = total_sections;
    }

    /// Called just before a section's generation call is issued.
    fn on_section_start(&self, label: &str, total_sections: usize) {
        let _ = (label, total_sections);
    }

    /// Called when a section finished (accepted or `not reported`).
    fn on_section_complete(&self, label: &str, total_sections: usize, summary_len: usize) {
        let _ = (label, total_sections, summary_len);
    }

    /// Called when a section's generation call failed or timed out.
    fn on_section_error(&self, label: &str, total_sections: usize, error: &str) {
        let _ = (label, total_sections, error);
    }

    /// Called when the synthesis step begins (all sections settled).
    fn on_synthesis_start(&self) {}

    /// Called once when the digest is complete.
    fn on_digest_complete(&self, total_sections: usize, summarized: usize) {
        let _ = (total_sections, summarized);
    }
}
