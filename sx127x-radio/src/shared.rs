//! Access to a driver from both thread mode and interrupt handlers.
//!
//! Interrupt handlers forward DIO edges and timer expiries to [`Sx127x::handle_irq`] while
//! application code issues commands. [`SharedRadio`] owns the driver inside a
//! `critical_section::Mutex`, so the two never interleave register accesses.
//!
//! ```ignore
//! static RADIO: SharedRadio<MyRadio> = SharedRadio::new();
//!
//! #[interrupt]
//! fn EXTI0() {
//!     let event = RADIO.lock(|radio| radio.handle_irq(IrqSource::Dio0));
//! }
//! ```
//!
//! [`Sx127x::handle_irq`]: crate::sx127x::Sx127x::handle_irq

use core::cell::RefCell;

use critical_section::Mutex;

/// Interrupt safe slot holding a radio driver
pub struct SharedRadio<R> {
    inner: Mutex<RefCell<Option<R>>>,
}

impl<R> SharedRadio<R> {
    /// Empty slot, usable in a `static`
    pub const fn new() -> Self {
        Self { inner: Mutex::new(RefCell::new(None)) }
    }

    /// Place `radio` in the slot, returning the driver it replaces
    pub fn install(&self, radio: R) -> Option<R> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).replace(radio))
    }

    /// Remove the driver from the slot
    pub fn take(&self) -> Option<R> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).take())
    }

    /// Run `f` on the driver inside a critical section. Returns `None` when the slot is empty.
    pub fn lock<T>(&self, f: impl FnOnce(&mut R) -> T) -> Option<T> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).as_mut().map(f))
    }
}

impl<R> Default for SharedRadio<R> {
    fn default() -> Self {
        Self::new()
    }
}
