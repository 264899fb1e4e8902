//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - remote job execution and polling",
        style("Pollux").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  pollux-hal      Work units, job handles and the backend trait");
    println!("  pollux-engine   Polling engine and result stores");
    println!("  pollux-cli      Command-line interface");
    println!();
    println!("License:    {}", style("Apache-2.0").dim());
}
