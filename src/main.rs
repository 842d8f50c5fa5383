fn main() {
    if let Err(err) = ev_charge_co2::app::run() {
        eprintln!("batch run failed: {err}");
        std::process::exit(1);
    }
}
