//! Network and decoder settings generated from stream.toml by build.rs

include!(concat!(env!("OUT_DIR"), "/stream_config.rs"));
