const SECTIONS: &[&str] = &["search", "cube", "nbest", "options", "weights"];

fn main() {
    println!("cargo:rerun-if-changed=src/default_settings.toml");
    // The embedded defaults must parse and carry every settings section.
    let path = "src/default_settings.toml";
    let value = match include_str!("src/default_settings.toml").parse::<toml::Table>() {
        Ok(value) => value,
        Err(e) => panic!("{path} contains invalid TOML: {e}"),
    };
    for section in SECTIONS {
        if !value.get(*section).is_some_and(toml::Value::is_table) {
            panic!("{path} is missing the [{section}] table");
        }
    }
}
