#![cfg_attr(not(test), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Regional channel plans for LoRaWAN end devices.
//!
//! A [`Configuration`] built from a [`Region`] answers the questions the MAC layer has about the
//! regional parameters: which channel the next uplink may use under the duty-cycle rules, how a
//! LinkADRReq or NewChannelReq changes the channel plan, where and how long the receive windows
//! open, and how the radio is set up for each transmission and reception. Time is never read from
//! a clock, the caller passes milliseconds.
//!
//! ## Feature flags
#![doc = document_features::document_features!(feature_label = r#"<span class="stab portability"><code>{feature}</code></span>"#)]

mod fmt;

pub mod maccommands;
pub mod radio;

pub mod region;
pub use region::{Configuration, Region, RegionHandler, DR};

pub mod types;

pub use rand_core::RngCore;
mod rng;
pub use rng::Prng;
