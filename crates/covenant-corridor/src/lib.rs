//! Covenant Corridor - impact limits for ecological corridors.
//!
//! Each corridor has a fixed capacity and a running `consumed` total.
//! High-severity impacts are reserved first and committed only if they fit;
//! low-severity impacts never block and at most raise an advisory flag.
//! `consumed` never exceeds `capacity`.
//!
//! A high-severity impact is also refused outright unless the corridor's
//! FPIC status is `Granted`.

#![deny(unsafe_code)]

mod error;
mod fpic;
mod gate;
mod neurorights;

pub use error::CorridorError;
pub use fpic::FpicStatus;
pub use gate::{Admission, CorridorGate, CorridorSnapshot, CorridorSpec, CorridorVerdict, Reservation};
pub use neurorights::NeurorightsFlag;
