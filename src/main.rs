fn main() {
    if let Err(err) = tile_label_placer::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
