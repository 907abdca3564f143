//! A sink-and-mixing engine in the style of PulseAudio's `pa_sink`/
//! `pa_sink_input` core: a control thread owns sink lifecycle, volume and
//! routing; a render thread pulls, mixes and volumes samples from attached
//! inputs on every device period. The two communicate exclusively through
//! the mailbox in [`mailbox`].

#![warn(
    anonymous_parameters,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_qualifications,
    variant_size_differences
)]

pub mod error;
pub mod hooks;
pub mod input;
pub mod mailbox;
pub mod memblock;
pub mod message;
pub mod mix;
pub mod monitor;
pub mod props;
pub mod registry;
pub mod roster;
pub mod sample;
pub mod sink;
pub mod state;
pub mod volume;

pub use error::SinkError;
pub use sink::{Core, Driver, Sink, SinkFlags, SinkNewData};
pub use state::SinkState;
