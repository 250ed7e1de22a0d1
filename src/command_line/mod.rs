//! Command line interface of the `satpm` binary.

pub(crate) mod cli;
