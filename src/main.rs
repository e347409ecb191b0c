fn main() {
    if let Err(err) = hubcommit::cli::run() {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
