#[cfg(not(feature = "coverage"))]
fn app_main() {
    marketplace_client::run();
}

#[cfg(feature = "coverage")]
fn app_main() {}

fn main() {
    app_main();
}
