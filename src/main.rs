use colored::Colorize;

fn main() {
    if let Err(e) = specgraph::run() {
        eprintln!("{} {}", "Error:".bright_red().bold(), e);
        std::process::exit(e.exit_code());
    }
}
