// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The main lofar_maps binary.

use clap::Parser;

use lofar_maps::{LofarMaps, MapsError};

fn main() {
    // We don't return Result from main because it prints the debug
    // representation of the error; print the display form instead.
    if let Err(e) = try_main() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), MapsError> {
    LofarMaps::parse().run()
}
