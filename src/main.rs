#![forbid(unsafe_code)]

//! fgm — Fleet Gap Monitor CLI entry point.

fn main() {
    std::process::exit(fleet_gap_monitor::cli::run());
}
