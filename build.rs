fn main() {
    // ESP-IDF environment propagation is only needed for device builds;
    // host builds (tests, simulation binary) have nothing to emit.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
