#![cfg_attr(not(test), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

//! Interrupt driven driver for the Semtech SX1272 and SX1276 transceivers.
//!
//! Operations on [`sx127x::Sx127x`] configure the chip and return right away. Completion is
//! reported by feeding DIO line edges and timer expiries to [`sx127x::Sx127x::handle_irq`],
//! usually from interrupt handlers sharing the driver through [`shared::SharedRadio`].
//!
//! ## Feature flags
#![doc = document_features::document_features!(feature_label = r#"<span class="stab portability"><code>{feature}</code></span>"#)]

mod fmt;

/// The read/write interface between an embedded framework/MCU combination and a LoRa chip
pub(crate) mod interface;
/// InterfaceVariant implementations using `embedded-hal`.
pub mod iv;
/// Parameters used across the crate to support various use cases
pub mod mod_params;
/// Traits implemented externally to support control of the chip
pub mod mod_traits;
/// Sharing a driver between thread mode and interrupt handlers
pub mod shared;
/// Specific implementation to support Semtech Sx127x chips
pub mod sx127x;

pub use embedded_hal::delay::DelayNs;
