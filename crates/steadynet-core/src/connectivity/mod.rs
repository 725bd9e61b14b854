//! Connectivity estimation and the online/offline signal bus.
//!
//! The estimator is a pure classification of host-reported link
//! characteristics; the signal is the single shared, explicitly constructed
//! owner of the online flag and its subscribers. Both are consumed by the
//! retry executor and by UI collaborators.

mod quality;
mod signal;

pub use quality::{estimate, ConnectivityQuality, EffectiveType, LinkSnapshot, ParseLabelError};
pub use signal::{ConnectivitySignal, Subscription};
