//! Prints the processor topology of the current system.

use cpu_topology::{PlatformCapabilities, TopologySnapshot};

fn main() {
    let capabilities = PlatformCapabilities::detect();
    println!(
        "Query: {:?}, efficiency classes reported: {}",
        capabilities.query(),
        capabilities.efficiency_reporting()
    );

    let topology = match TopologySnapshot::current() {
        Ok(topology) => topology,
        Err(e) => {
            println!("Processor topology is not available: {e}");
            return;
        }
    };

    println!("{topology}");
    println!();

    for processor in topology.logical_processors() {
        println!("{processor}");
    }

    println!();

    for core in topology.physical_cores() {
        println!("{core}");
    }
}
