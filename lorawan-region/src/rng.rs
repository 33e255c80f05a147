use rand_core::{impls, Error, RngCore};

/// A pseudo-random number generator for channel selection and back-off jitter, backed by
/// `fastrand`. Seed it from a true entropy source (for example `Sx127x::get_random_number`) on
/// every boot.
#[derive(Clone)]
pub struct Prng(fastrand::Rng);

impl Prng {
    pub fn new(seed: u64) -> Self {
        Self(fastrand::Rng::with_seed(seed))
    }
}

impl RngCore for Prng {
    fn next_u32(&mut self) -> u32 {
        self.0.u32(..)
    }

    fn next_u64(&mut self) -> u64 {
        self.0.u64(..)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        impls::fill_bytes_via_next(self, dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = Prng::new(0x5eed);
        let mut b = Prng::new(0x5eed);
        for _ in 0..16 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
        let mut buf = [0u8; 7];
        a.fill_bytes(&mut buf);
        let mut other = [0u8; 7];
        b.fill_bytes(&mut other);
        assert_eq!(buf, other);
    }
}
