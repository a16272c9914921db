//! Transcript bookkeeping: the last-processed marker and the interrupt flag.

/// Why an in-flight cycle was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    SleepCommand,
    EndCommand,
    Tap,
    BusyTap,
}

/// What the controller last treated as handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    /// A real transcript that was acted on (or submitted).
    Processed(String),
    /// A cycle was interrupted; nothing from it is reprocessed.
    Interrupted(Interruption),
    /// Listening ended with a tap but nothing had been heard.
    EmptyTap,
}

/// The last-processed marker plus the transcript captured by a tap.
#[derive(Debug, Default)]
pub struct TranscriptRecord {
    marker: Option<Marker>,
    pending_final: String,
}

impl TranscriptRecord {
    pub fn marker(&self) -> Option<&Marker> {
        self.marker.as_ref()
    }

    pub fn set_marker(&mut self, marker: Marker) {
        self.marker = Some(marker);
    }

    /// Forget the marker and any pending final text.
    pub fn reset(&mut self) {
        self.marker = None;
        self.pending_final.clear();
    }

    /// Record an interruption and drop any pending final text.
    pub fn interrupt(&mut self, why: Interruption) {
        self.marker = Some(Marker::Interrupted(why));
        self.pending_final.clear();
    }

    /// Whether `text` has already been handled.
    pub fn is_processed(&self, text: &str) -> bool {
        matches!(&self.marker, Some(Marker::Processed(t)) if t == text)
    }

    /// The marker records an abandoned cycle rather than a handled transcript.
    pub fn is_interruption(&self) -> bool {
        matches!(
            self.marker,
            Some(Marker::Interrupted(_)) | Some(Marker::EmptyTap)
        )
    }

    pub fn pending_final(&self) -> &str {
        &self.pending_final
    }

    pub fn set_pending_final(&mut self, text: &str) {
        self.pending_final = text.to_string();
    }
}

/// Raised when whatever is (about to be) spoken must be discarded.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InterruptFlag(bool);

impl InterruptFlag {
    pub fn raise(&mut self) {
        self.0 = true;
    }

    pub fn clear(&mut self) {
        self.0 = false;
    }

    pub fn is_raised(&self) -> bool {
        self.0
    }
}
