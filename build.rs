fn main() {
    // ESP-IDF environment (linker args, cfg flags) is only emitted for
    // firmware builds; host builds compile the simulation adapters.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
