//! Loopback tests for the dual CDC-ACM to UART bridge.
//!
//! Flash the firmware and cross-wire the UARTs (UART1 TX to UART2 RX and
//! UART2 TX to UART1 RX). Bytes written to one virtual COM port must then
//! come back out of the other.

mod device;

use clap::Parser;
use colored::Colorize;

use device::{resolve_port_pair, BridgePort};
use tests::{print_results, run_all_tests};

#[derive(Parser)]
#[command(name = "integration-tests")]
#[command(about = "Loopback tests for the dual CDC-ACM to UART bridge")]
struct Args {
    /// First virtual COM port (use "auto" to auto-detect both)
    #[arg(short = 'a', long, default_value = "auto")]
    port_a: String,

    /// Second virtual COM port (use "auto" to auto-detect both)
    #[arg(short = 'b', long, default_value = "auto")]
    port_b: String,

    /// Baud rate used for the pass-through tests
    #[arg(long, default_value = "115200")]
    baud: u32,

    /// Second baud rate for the line coding test
    #[arg(long, default_value = "9600")]
    alt_baud: u32,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let (port_a, port_b) = resolve_port_pair(&args.port_a, &args.port_b)?;

    println!("{}", "Dual CDC Bridge Integration Tests".bold());
    println!("Port A: {}", port_a);
    println!("Port B: {}", port_b);
    println!("Baud: {} (alt {})", args.baud, args.alt_baud);
    println!();

    println!("Opening ports...");
    let mut a = BridgePort::open(&port_a, args.baud)?;
    let mut b = BridgePort::open(&port_b, args.baud)?;

    // Let the UARTs settle after reconfiguration, then discard line noise
    std::thread::sleep(std::time::Duration::from_millis(200));
    a.drain()?;
    b.drain()?;
    a.clear_buffer()?;
    b.clear_buffer()?;
    println!("{}", "Ready!".green());

    println!("\nRunning tests...\n");

    let results = run_all_tests(&mut a, &mut b, args.baud, args.alt_baud);
    print_results(&results);

    // Exit with error code if any tests failed
    let failed = results.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
