pub mod iq;

pub use iq::SyntheticIq;
