use colored::Colorize;

pub fn print_banner(root: &str) {
    println!(
        "{}",
        format!("venvcleaner v{}", env!("CARGO_PKG_VERSION"))
            .bold()
            .cyan()
    );
    println!("{} {}", "Searching".bold(), root);
    println!();
}

pub fn print_venv(path: &str, size: &str, modified: &str) {
    println!("  {}  {}  {}", path, size.yellow(), modified.dimmed());
}

pub fn print_separator() {
    println!("  {}", "─".repeat(45).dimmed());
}

pub fn print_summary(count: usize, total: &str) {
    println!(
        "  {} {}",
        format!("Found {count} venvs. Total size:").bold(),
        total.green().bold()
    );
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "Error:".red().bold(), msg.red());
}
