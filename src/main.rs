fn main() {
    if let Err(err) = chartops::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
