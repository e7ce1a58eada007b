//! Fuzz target for selection argument parsing.
//!
//! Internet specs are only parsed when their host is a literal address,
//! since host names go to the system resolver.

#![no_main]

use std::net::IpAddr;

use libfuzzer_sys::fuzz_target;
use lsx_core::select::{FdSelector, InetSpec, Selector};

fn literal_host(spec: &str) -> bool {
    match spec.split_once('@') {
        None => true,
        Some((_, rest)) if rest.starts_with('[') => true,
        Some((_, rest)) => {
            let host = rest.split(':').next().unwrap_or(rest);
            host.parse::<IpAddr>().is_ok()
        }
    }
}

fuzz_target!(|data: &str| {
    let _ = FdSelector::parse(data);
    let _ = Selector::protocol_state(data);
    let _ = Selector::command_regex(data);
    if literal_host(data) {
        if let Ok(spec) = InetSpec::parse(data) {
            assert_eq!(spec.as_str(), data);
        }
    }
});
