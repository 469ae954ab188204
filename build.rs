fn main() {
    println!("cargo:rerun-if-changed=link.json");

    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
