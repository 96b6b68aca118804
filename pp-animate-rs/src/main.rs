fn main() {
    pp_animate::cli::run();
}
