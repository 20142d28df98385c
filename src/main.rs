use latchwork::ui::output;

fn main() {
    if let Err(err) = latchwork::cli::run() {
        output::error(format!("{:#}", err));
        std::process::exit(1);
    }
}
