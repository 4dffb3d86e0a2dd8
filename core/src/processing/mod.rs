pub mod dedisperse;
pub mod detector;
pub mod gate;
pub mod ledger;
pub mod vectorizer;

pub use dedisperse::Dedisperser;
pub use detector::{Detector, DetectorState};
pub use gate::EventGate;
pub use ledger::EventLedger;
pub use vectorizer::Vectorizer;
