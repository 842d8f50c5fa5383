fn main() {
    if let Err(err) = ev_charge_co2::app::run_inspect() {
        eprintln!("inspection failed: {err}");
        std::process::exit(1);
    }
}
