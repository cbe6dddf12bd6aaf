use super::*;

#[test]
fn builtin_names() {
    assert_eq!(Idx::INT.builtin_name(), Some("int"));
    assert_eq!(Idx::UNIT_TYPE.builtin_name(), Some("$[]"));
    assert_eq!(Idx::from_raw(Idx::PREINTERNED).builtin_name(), None);
}

#[test]
fn debug_formats() {
    assert_eq!(format!("{:?}", Idx::BOOL), "Idx(bool)");
    assert_eq!(format!("{:?}", Idx::from_raw(42)), "Idx(42)");
    assert_eq!(format!("{:?}", MetaId::from_raw(3)), "?3");
    assert_eq!(format!("{:?}", ModId::from_raw(1)), "mod#1");
}

#[test]
fn error_detection() {
    assert!(Idx::ERROR.is_error());
    assert!(!Idx::INT.is_error());
}
