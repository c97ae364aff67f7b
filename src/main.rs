fn main() {
    if let Err(code) = elephant_cli::cli::run() {
        std::process::exit(code.as_i32());
    }
}
