use pretty_assertions::assert_eq;

use super::*;

fn lookup_from(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
    move |key| {
        pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| (*v).to_owned())
    }
}

#[test]
fn empty_environment_gives_defaults() {
    let config = ElabConfig::from_lookup(lookup_from(&[]));
    assert_eq!(config, ElabConfig::default());
    assert!(config.generalize);
}

#[test]
fn no_generalize_flag() {
    let config = ElabConfig::from_lookup(lookup_from(&[("URD_NO_GENERALIZE", "1")]));
    assert!(!config.generalize);
}

#[test]
fn instance_depth_override() {
    let config = ElabConfig::from_lookup(lookup_from(&[("URD_MAX_INSTANCE_DEPTH", " 4 ")]));
    assert_eq!(config.max_instance_depth, 4);
}

#[test]
fn invalid_depth_is_ignored() {
    let config = ElabConfig::from_lookup(lookup_from(&[("URD_MAX_INSTANCE_DEPTH", "deep")]));
    assert_eq!(
        config.max_instance_depth,
        ElabConfig::default().max_instance_depth
    );
}
