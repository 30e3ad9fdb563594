//! Registry semantics: append/lookup, first-match binding, and the
//! bind-once discipline for host function tokens.

use rcuda_shim::registry::Registry;

#[test]
fn lookup_misses_before_binding() {
    let reg = Registry::new();
    reg.append("k".to_string(), 0x100, vec![4, 8]);
    assert_eq!(reg.len(), 1);
    assert!(reg.lookup_by_host(0x1).is_none());
}

#[test]
fn bind_then_lookup_by_host() {
    let reg = Registry::new();
    reg.append("k".to_string(), 0x100, vec![4, 8]);
    reg.bind_host("k", 0x1);

    let record = reg.lookup_by_host(0x1).expect("bound record");
    assert_eq!(record.device_name(), "k");
    assert_eq!(record.fat_binary(), 0x100);
    assert_eq!(record.arg_widths(), &[4, 8]);
    assert_eq!(record.host_fn(), Some(0x1));
}

#[test]
fn record_binds_once() {
    let reg = Registry::new();
    reg.append("k".to_string(), 0x100, vec![4]);
    reg.bind_host("k", 0x1);
    reg.bind_host("k", 0x2);

    let record = reg.lookup_by_host(0x1).expect("first binding intact");
    assert_eq!(record.host_fn(), Some(0x1));
    assert!(reg.lookup_by_host(0x2).is_none());
}

#[test]
fn rebinding_a_token_to_another_name_keeps_the_existing_entry() {
    let reg = Registry::new();
    reg.append("k".to_string(), 0x100, vec![4]);
    reg.append("j".to_string(), 0x100, vec![8]);
    reg.bind_host("k", 0x1);
    reg.bind_host("j", 0x1);

    let record = reg.lookup_by_host(0x1).expect("token still bound");
    assert_eq!(record.device_name(), "k");
}

#[test]
fn unknown_name_is_silently_dropped() {
    let reg = Registry::new();
    reg.append("k".to_string(), 0x100, vec![4]);
    reg.bind_host("ghost", 0x5);
    assert!(reg.lookup_by_host(0x5).is_none());
    assert_eq!(reg.len(), 1);
}

#[test]
fn first_record_with_matching_name_wins() {
    let reg = Registry::new();
    reg.append("dup".to_string(), 0x100, vec![4]);
    reg.append("dup".to_string(), 0x200, vec![8]);
    reg.bind_host("dup", 0x9);

    let record = reg.lookup_by_host(0x9).expect("bound record");
    assert_eq!(record.fat_binary(), 0x100);
}

#[test]
fn records_keep_registration_order() {
    let reg = Registry::new();
    reg.append("a".to_string(), 1, vec![]);
    reg.append("b".to_string(), 1, vec![]);
    reg.append("c".to_string(), 2, vec![]);

    let names: Vec<_> = reg
        .records()
        .iter()
        .map(|r| r.device_name().to_string())
        .collect();
    assert_eq!(names, ["a", "b", "c"]);
}
