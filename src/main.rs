fn main() {
    if let Err(err) = stockscan_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
