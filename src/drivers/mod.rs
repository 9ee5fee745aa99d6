//! Hardware drivers built on `embedded-hal` traits.

pub mod role_leds;
