//! Per-request staging flags.

use bitflags::bitflags;

bitflags! {
    /// Staging bits recording which stages of a request have run.
    ///
    /// The engine only ever sets these; a handler re-entered after an
    /// asynchronous callback resumes at the first stage whose bit is unset.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RequestState: u32 {
        /// The probe stage ran (or was found unnecessary).
        const STAGED_PROBE = 1 << 0;
        /// The approval round-trip was submitted.
        const STAGED_APPROVE = 1 << 1;
        /// The authorization stage ran (or was found unnecessary).
        const STAGED_AUTHORIZE = 1 << 2;
    }
}
